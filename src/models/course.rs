use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Pointer to a file held by the external asset store. The store itself
/// is out of scope; we only keep its identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AssetRef {
    #[validate(length(min = 1, message = "Asset public ID is required"))]
    pub public_id: String,
    #[validate(length(min = 1, message = "Asset URL is required"))]
    pub url: String,
}

impl AssetRef {
    pub fn is_well_formed(&self) -> bool {
        !self.public_id.trim().is_empty() && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecture {
    pub id: String,
    pub title: String,
    pub video_url: String,
    pub pdf_notes: Vec<AssetRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub title: String,
    /// Display position. Distinct within a course but independent of the
    /// storage order that drives sequential unlocking.
    pub module_number: u32,
    pub lectures: Vec<Lecture>,
}

/// A course document. Modules and lectures live inside it; the whole tree
/// is persisted as a single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub thumbnail: AssetRef,
    pub modules: Vec<Module>,
    pub created_at: String,
    pub updated_at: String,
}

impl Course {
    /// Builds a new course from a validated request. Module numbers in the
    /// payload are normalized so they come out distinct and positive; `None`
    /// when normalization runs out of numbers.
    pub fn new(req: NewCourseRequest) -> Option<Course> {
        let now = chrono::Utc::now().to_rfc3339();
        Some(Course {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            description: req.description,
            price: req.price,
            thumbnail: req.thumbnail,
            modules: modules_from_drafts(req.modules)?,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    pub fn module_mut(&mut self, module_id: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id == module_id)
    }

    pub fn max_module_number(&self) -> u32 {
        self.modules.iter().map(|m| m.module_number).max().unwrap_or(0)
    }

    pub fn total_lectures(&self) -> usize {
        self.modules.iter().map(|m| m.lectures.len()).sum()
    }

    /// Lecture IDs in storage order: module array order, then lecture array
    /// order within each module. This is the order completion is unlocked in.
    pub fn lecture_sequence(&self) -> Vec<&str> {
        self.modules
            .iter()
            .flat_map(|m| m.lectures.iter().map(|l| l.id.as_str()))
            .collect()
    }
}

impl Module {
    pub fn from_draft(draft: ModuleDraft, module_number: u32) -> Module {
        Module {
            id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: draft.title,
            module_number,
            lectures: draft.lectures.into_iter().map(Lecture::from_draft).collect(),
        }
    }

    pub fn lecture(&self, lecture_id: &str) -> Option<&Lecture> {
        self.lectures.iter().find(|l| l.id == lecture_id)
    }

    pub fn lecture_mut(&mut self, lecture_id: &str) -> Option<&mut Lecture> {
        self.lectures.iter_mut().find(|l| l.id == lecture_id)
    }
}

impl Lecture {
    pub fn from_draft(draft: LectureDraft) -> Lecture {
        Lecture {
            id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: draft.title,
            video_url: draft.video_url,
            pdf_notes: draft.pdf_notes,
        }
    }
}

/// Incoming module payload. Drafts that carry an `id` keep it, so partial
/// course updates do not reissue identifiers for surviving entries.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ModuleDraft {
    pub id: Option<String>,
    #[validate(length(min = 1, message = "Module title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(range(max = 1_000_000, message = "Module number is too large"))]
    pub module_number: u32,
    #[serde(default)]
    #[validate(nested)]
    pub lectures: Vec<LectureDraft>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LectureDraft {
    pub id: Option<String>,
    #[validate(length(min = 1, message = "Lecture title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Lecture video URL is required"))]
    pub video_url: String,
    #[serde(default)]
    #[validate(nested)]
    pub pdf_notes: Vec<AssetRef>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCourseRequest {
    #[validate(length(min = 1, message = "Course title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Course description is required"))]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[validate(nested)]
    pub thumbnail: AssetRef,
    #[serde(default)]
    #[validate(nested)]
    pub modules: Vec<ModuleDraft>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, message = "Course title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Course description is required"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    #[validate(nested)]
    pub thumbnail: Option<AssetRef>,
    #[validate(nested)]
    pub modules: Option<Vec<ModuleDraft>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewModuleRequest {
    #[validate(length(min = 1, message = "Module title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(range(max = 1_000_000, message = "Module number is too large"))]
    pub module_number: u32,
    #[serde(default)]
    #[validate(nested)]
    pub lectures: Vec<LectureDraft>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, message = "Module title is required"))]
    pub title: Option<String>,
    #[validate(range(max = 1_000_000, message = "Module number is too large"))]
    pub module_number: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLectureRequest {
    #[validate(length(min = 1, message = "Lecture title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Lecture video URL is required"))]
    pub video_url: String,
    #[serde(default)]
    #[validate(nested)]
    pub pdf_notes: Vec<AssetRef>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLectureRequest {
    #[validate(length(min = 1, message = "Lecture title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Lecture video URL is required"))]
    pub video_url: Option<String>,
    #[validate(nested)]
    pub pdf_notes: Option<Vec<AssetRef>>,
}

/// Optional filters for lecture search. All present filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LectureFilter {
    pub course_id: Option<String>,
    pub module_id: Option<String>,
    pub title_contains: Option<String>,
}

/// A lecture search hit with enough context to locate it in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct LectureHit {
    pub course_id: String,
    pub course_title: String,
    pub module_id: String,
    pub module_title: String,
    pub lecture: Lecture,
}

/// Assigns a number to a module inserted into an existing course. Requests
/// that are zero or do not clear the current maximum get the next free
/// number instead of being rejected. `None` when the numbering is exhausted.
pub fn resolve_module_number(requested: u32, current_max: u32) -> Option<u32> {
    if requested == 0 || requested <= current_max {
        current_max.checked_add(1)
    } else {
        Some(requested)
    }
}

/// Materializes a full module list from drafts. Numbers are kept where they
/// are positive and unique within the batch; zeroes and duplicates get the
/// next number past the batch maximum. `None` when that bump would leave
/// the numeric range.
pub fn modules_from_drafts(drafts: Vec<ModuleDraft>) -> Option<Vec<Module>> {
    let mut modules: Vec<Module> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let taken: Vec<u32> = modules.iter().map(|m| m.module_number).collect();
        let number = if draft.module_number == 0 || taken.contains(&draft.module_number) {
            taken.iter().max().copied().unwrap_or(0).checked_add(1)?
        } else {
            draft.module_number
        };
        modules.push(Module::from_draft(draft, number));
    }
    Some(modules)
}

/// Attaches uploaded PDF notes to lectures by positional key. Keys are
/// `"<module index>-<lecture index>"` into the draft tree, values index into
/// `uploads`. Existing malformed refs are dropped along the way.
pub fn attach_pdf_notes(
    modules: &mut [ModuleDraft],
    uploads: &[AssetRef],
    indices: &HashMap<String, usize>,
) {
    for (m_idx, module) in modules.iter_mut().enumerate() {
        for (l_idx, lecture) in module.lectures.iter_mut().enumerate() {
            lecture.pdf_notes.retain(AssetRef::is_well_formed);
            let key = format!("{m_idx}-{l_idx}");
            if let Some(&upload_idx) = indices.get(&key) {
                if let Some(asset) = uploads.get(upload_idx) {
                    if asset.is_well_formed() {
                        lecture.pdf_notes.push(asset.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, number: u32) -> ModuleDraft {
        ModuleDraft {
            id: None,
            title: title.to_string(),
            module_number: number,
            lectures: vec![],
        }
    }

    #[test]
    fn insert_number_at_or_below_max_gets_bumped() {
        assert_eq!(resolve_module_number(0, 0), Some(1));
        assert_eq!(resolve_module_number(0, 3), Some(4));
        assert_eq!(resolve_module_number(2, 3), Some(4));
        assert_eq!(resolve_module_number(3, 3), Some(4));
        assert_eq!(resolve_module_number(7, 3), Some(7));
    }

    #[test]
    fn bump_at_the_top_of_the_range_is_refused() {
        assert_eq!(resolve_module_number(1, u32::MAX), None);
        assert_eq!(resolve_module_number(0, u32::MAX), None);

        let saturated = modules_from_drafts(vec![draft("a", u32::MAX), draft("b", u32::MAX)]);
        assert!(saturated.is_none());
    }

    #[test]
    fn batch_numbers_stay_distinct() {
        let modules =
            modules_from_drafts(vec![draft("a", 2), draft("b", 2), draft("c", 0)]).unwrap();
        let numbers: Vec<u32> = modules.iter().map(|m| m.module_number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
    }

    #[test]
    fn batch_keeps_distinct_numbers_as_requested() {
        let modules =
            modules_from_drafts(vec![draft("a", 3), draft("b", 1), draft("c", 2)]).unwrap();
        let numbers: Vec<u32> = modules.iter().map(|m| m.module_number).collect();
        assert_eq!(numbers, vec![3, 1, 2]);
    }

    #[test]
    fn drafts_keep_supplied_ids() {
        let mut d = draft("kept", 1);
        d.id = Some("module-1".to_string());
        let modules = modules_from_drafts(vec![d, draft("minted", 2)]).unwrap();
        assert_eq!(modules[0].id, "module-1");
        assert!(!modules[1].id.is_empty());
        assert_ne!(modules[1].id, modules[0].id);
    }

    #[test]
    fn pdf_notes_attach_by_positional_key() {
        let mut modules = vec![ModuleDraft {
            id: None,
            title: "m".to_string(),
            module_number: 1,
            lectures: vec![
                LectureDraft {
                    id: None,
                    title: "l1".to_string(),
                    video_url: "v1".to_string(),
                    pdf_notes: vec![AssetRef {
                        public_id: " ".to_string(),
                        url: "stale".to_string(),
                    }],
                },
                LectureDraft {
                    id: None,
                    title: "l2".to_string(),
                    video_url: "v2".to_string(),
                    pdf_notes: vec![],
                },
            ],
        }];
        let uploads = vec![AssetRef {
            public_id: "pdf-1".to_string(),
            url: "https://cdn/pdf-1".to_string(),
        }];
        // "0-0" points past the uploads slice and must be ignored.
        let indices = HashMap::from([("0-1".to_string(), 0), ("0-0".to_string(), 7)]);

        attach_pdf_notes(&mut modules, &uploads, &indices);

        assert!(modules[0].lectures[0].pdf_notes.is_empty());
        assert_eq!(modules[0].lectures[1].pdf_notes.len(), 1);
        assert_eq!(modules[0].lectures[1].pdf_notes[0].public_id, "pdf-1");
    }

    #[test]
    fn lecture_sequence_follows_storage_order() {
        let course = Course::new(NewCourseRequest {
            title: "t".to_string(),
            description: "d".to_string(),
            price: 0.0,
            thumbnail: AssetRef {
                public_id: "thumb".to_string(),
                url: "https://cdn/thumb".to_string(),
            },
            modules: vec![
                ModuleDraft {
                    id: None,
                    title: "late by number, first by position".to_string(),
                    module_number: 9,
                    lectures: vec![LectureDraft {
                        id: Some("l-a".to_string()),
                        title: "a".to_string(),
                        video_url: "v".to_string(),
                        pdf_notes: vec![],
                    }],
                },
                ModuleDraft {
                    id: None,
                    title: "second".to_string(),
                    module_number: 1,
                    lectures: vec![LectureDraft {
                        id: Some("l-b".to_string()),
                        title: "b".to_string(),
                        video_url: "v".to_string(),
                        pdf_notes: vec![],
                    }],
                },
            ],
        })
        .unwrap();

        assert_eq!(course.lecture_sequence(), vec!["l-a", "l-b"]);
        assert_eq!(course.total_lectures(), 2);
    }
}
