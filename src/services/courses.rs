use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::db::{catalog, identity};
use crate::error::AppError;
use crate::models::course::{modules_from_drafts, resolve_module_number};
use crate::models::{
    Course, Lecture, LectureFilter, LectureHit, Module, ModuleDraft, NewCourseRequest,
    NewLectureRequest, NewModuleRequest, UpdateCourseRequest, UpdateLectureRequest,
    UpdateModuleRequest,
};

/// Catalog operations. Deletions also prune completion references from the
/// identity store inside the same transaction, so no user ever points at a
/// lecture the catalog no longer has.
pub struct CourseService {
    db: SqlitePool,
}

impl CourseService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_course(&self, req: NewCourseRequest) -> Result<Course, AppError> {
        req.validate()?;

        let course = Course::new(req).ok_or_else(numbers_exhausted)?;

        let mut conn = self.db.acquire().await?;
        catalog::insert_course(&mut conn, &course).await?;

        info!("Created course {} ({})", course.title, course.id);
        Ok(course)
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let mut conn = self.db.acquire().await?;
        catalog::fetch_courses(&mut conn).await
    }

    pub async fn get_course(&self, id: &str) -> Result<Course, AppError> {
        let mut conn = self.db.acquire().await?;
        catalog::find_course_by_id(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound("Course"))
    }

    pub async fn update_course(
        &self,
        id: &str,
        req: UpdateCourseRequest,
    ) -> Result<Course, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;

        if let Some(title) = req.title {
            course.title = title;
        }
        if let Some(description) = req.description {
            course.description = description;
        }
        if let Some(price) = req.price {
            course.price = price;
        }
        if let Some(thumbnail) = req.thumbnail {
            course.thumbnail = thumbnail;
        }
        if let Some(drafts) = req.modules {
            // Whole-tree replacement. Entries carrying ids keep them.
            course.modules = modules_from_drafts(drafts).ok_or_else(numbers_exhausted)?;
        }

        catalog::save_course(&mut tx, &mut course).await?;
        tx.commit().await?;

        info!("Updated course {}", course.id);
        Ok(course)
    }

    pub async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        if !catalog::delete_course(&mut tx, id).await? {
            return Err(AppError::NotFound("Course"));
        }
        let users_updated = identity::remove_course_enrollments(&mut tx, id).await?;

        tx.commit().await?;

        info!("Deleted course {}: enrollment removed for {} users", id, users_updated);
        Ok(())
    }

    pub async fn add_module(
        &self,
        course_id: &str,
        req: NewModuleRequest,
    ) -> Result<Module, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;

        let number = resolve_module_number(req.module_number, course.max_module_number())
            .ok_or_else(numbers_exhausted)?;
        let module = Module::from_draft(
            ModuleDraft {
                id: None,
                title: req.title,
                module_number: number,
                lectures: req.lectures,
            },
            number,
        );
        course.modules.push(module.clone());

        catalog::save_course(&mut tx, &mut course).await?;
        tx.commit().await?;

        info!("Added module {} ({}) to course {}", module.title, module.id, course_id);
        Ok(module)
    }

    pub async fn update_module(
        &self,
        course_id: &str,
        module_id: &str,
        req: UpdateModuleRequest,
    ) -> Result<Module, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;

        let Some(position) = course.modules.iter().position(|m| m.id == module_id) else {
            return Err(AppError::NotFound("Module"));
        };

        // A requested number colliding with a sibling gets bumped past the
        // course maximum; zero is never valid.
        let new_number = match req.module_number {
            Some(requested) => {
                let collides = requested == 0
                    || course
                        .modules
                        .iter()
                        .any(|m| m.id != module_id && m.module_number == requested);
                if collides {
                    let bumped = course
                        .max_module_number()
                        .checked_add(1)
                        .ok_or_else(numbers_exhausted)?;
                    Some(bumped)
                } else {
                    Some(requested)
                }
            }
            None => None,
        };

        let module = &mut course.modules[position];
        if let Some(title) = req.title {
            module.title = title;
        }
        if let Some(number) = new_number {
            module.module_number = number;
        }
        let updated = module.clone();

        catalog::save_course(&mut tx, &mut course).await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn delete_module(&self, course_id: &str, module_id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;

        let Some(idx) = course.modules.iter().position(|m| m.id == module_id) else {
            return Err(AppError::NotFound("Module"));
        };
        let removed = course.modules.remove(idx);
        let lecture_ids: Vec<String> = removed.lectures.into_iter().map(|l| l.id).collect();

        catalog::save_course(&mut tx, &mut course).await?;
        let (users_updated, refs_removed) =
            identity::prune_completed_lectures(&mut tx, &lecture_ids).await?;

        tx.commit().await?;

        info!(
            "Deleted module {} from course {}: pruned {} completion refs across {} users",
            module_id, course_id, refs_removed, users_updated
        );
        Ok(())
    }

    pub async fn add_lecture(
        &self,
        course_id: &str,
        module_id: &str,
        req: NewLectureRequest,
    ) -> Result<Lecture, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;
        let Some(module) = course.module_mut(module_id) else {
            return Err(AppError::NotFound("Module"));
        };

        let lecture = Lecture {
            id: uuid::Uuid::new_v4().to_string(),
            title: req.title,
            video_url: req.video_url,
            pdf_notes: req.pdf_notes,
        };
        module.lectures.push(lecture.clone());

        catalog::save_course(&mut tx, &mut course).await?;
        tx.commit().await?;

        info!("Added lecture {} ({}) to module {}", lecture.title, lecture.id, module_id);
        Ok(lecture)
    }

    pub async fn update_lecture(
        &self,
        course_id: &str,
        module_id: &str,
        lecture_id: &str,
        req: UpdateLectureRequest,
    ) -> Result<Lecture, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;
        let Some(module) = course.module_mut(module_id) else {
            return Err(AppError::NotFound("Module"));
        };
        let Some(lecture) = module.lecture_mut(lecture_id) else {
            return Err(AppError::NotFound("Lecture"));
        };

        if let Some(title) = req.title {
            lecture.title = title;
        }
        if let Some(video_url) = req.video_url {
            lecture.video_url = video_url;
        }
        if let Some(pdf_notes) = req.pdf_notes {
            lecture.pdf_notes = pdf_notes;
        }
        let updated = lecture.clone();

        catalog::save_course(&mut tx, &mut course).await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn delete_lecture(
        &self,
        course_id: &str,
        module_id: &str,
        lecture_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let mut course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;
        let Some(module) = course.module_mut(module_id) else {
            return Err(AppError::NotFound("Module"));
        };
        let Some(idx) = module.lectures.iter().position(|l| l.id == lecture_id) else {
            return Err(AppError::NotFound("Lecture"));
        };
        module.lectures.remove(idx);

        catalog::save_course(&mut tx, &mut course).await?;
        let (users_updated, _) =
            identity::prune_completed_lectures(&mut tx, &[lecture_id.to_string()]).await?;

        tx.commit().await?;

        info!(
            "Deleted lecture {} from course {}: pruned completion refs for {} users",
            lecture_id, course_id, users_updated
        );
        Ok(())
    }

    pub async fn find_lectures(&self, filter: LectureFilter) -> Result<Vec<LectureHit>, AppError> {
        let mut conn = self.db.acquire().await?;

        let courses = match &filter.course_id {
            Some(id) => match catalog::find_course_by_id(&mut conn, id).await? {
                Some(course) => vec![course],
                None => return Err(AppError::NotFound("Course")),
            },
            None => catalog::fetch_courses(&mut conn).await?,
        };

        let needle = filter.title_contains.as_deref().map(str::to_lowercase);

        let mut hits = Vec::new();
        for course in &courses {
            for module in &course.modules {
                if let Some(module_id) = &filter.module_id {
                    if &module.id != module_id {
                        continue;
                    }
                }
                for lecture in &module.lectures {
                    if let Some(needle) = &needle {
                        if !lecture.title.to_lowercase().contains(needle) {
                            continue;
                        }
                    }
                    hits.push(LectureHit {
                        course_id: course.id.clone(),
                        course_title: course.title.clone(),
                        module_id: module.id.clone(),
                        module_title: module.title.clone(),
                        lecture: lecture.clone(),
                    });
                }
            }
        }

        Ok(hits)
    }
}

fn numbers_exhausted() -> AppError {
    AppError::Validation("Module numbers are exhausted".to_string())
}
