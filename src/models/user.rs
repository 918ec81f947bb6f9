use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::course::AssetRef;

pub const DEFAULT_AVATAR_URL: &str =
    "https://uxwing.com/wp-content/themes/uxwing/download/peoples-avatars/man-user-circle-icon.png";

/// Avatar assigned at registration until the user uploads their own.
pub fn default_avatar() -> AssetRef {
    AssetRef {
        public_id: String::new(),
        url: DEFAULT_AVATAR_URL.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// One course a user is signed up for, with their completion state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: String,
    pub completed_lectures: Vec<String>,
    /// Percentage in [0, 100]. Recomputed whenever a lecture is marked
    /// complete, never in between.
    pub progress: f64,
}

impl Enrollment {
    pub fn new(course_id: String) -> Enrollment {
        Enrollment {
            course_id,
            completed_lectures: Vec::new(),
            progress: 0.0,
        }
    }
}

/// An account document. The credential hash is deliberately not a field
/// here; it stays in the storage layer and never reaches serialized output.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_pic: AssetRef,
    pub enrollments: Vec<Enrollment>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(name: String, email: String, role: Role, profile_pic: Option<AssetRef>) -> User {
        let now = chrono::Utc::now().to_rfc3339();
        User {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            role,
            profile_pic: profile_pic.unwrap_or_else(default_avatar),
            enrollments: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn enrollment(&self, course_id: &str) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| e.course_id == course_id)
    }

    pub fn enrollment_mut(&mut self, course_id: &str) -> Option<&mut Enrollment> {
        self.enrollments.iter_mut().find(|e| e.course_id == course_id)
    }

    pub fn is_enrolled(&self, course_id: &str) -> bool {
        self.enrollment(course_id).is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<Role>,
    #[validate(nested)]
    pub profile_pic: Option<AssetRef>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn serialized_user_has_no_credential_material() {
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Role::default(),
            None,
        );
        let json = serde_json::to_value(&user).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.contains("password")));
        assert_eq!(json["role"], "user");
        assert_eq!(json["profile_pic"]["url"], DEFAULT_AVATAR_URL);
    }

    #[test]
    fn fresh_enrollment_starts_at_zero() {
        let e = Enrollment::new("course-1".to_string());
        assert!(e.completed_lectures.is_empty());
        assert_eq!(e.progress, 0.0);
    }
}
