use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error")]
    Internal,
}

/// Stable classification the boundary maps onto its transport (HTTP status,
/// RPC code, ...). Storage and serialization failures collapse into
/// `Internal` so driver details never reach a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unauthorized,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Database(_) | AppError::Serde(_) | AppError::Internal => {
                ErrorKind::Internal
            }
        }
    }

    /// Message safe to hand to an end user. Internal failures are logged
    /// here and replaced with a generic line.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                error!("database error: {}", e);
                "A storage error occurred".to_string()
            }
            AppError::Serde(e) => {
                error!("document error: {}", e);
                "A storage error occurred".to_string()
            }
            AppError::Internal => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            error: err.kind(),
            message: err.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_not_leaked() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "A storage error occurred");
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = AppError::NotFound("Course");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Course not found");
    }

    #[test]
    fn responses_bundle_kind_and_public_message() {
        let response = ErrorResponse::from(&AppError::NotFound("Course"));
        assert_eq!(response.error, ErrorKind::NotFound);
        assert_eq!(response.message, "Course not found");

        let response = ErrorResponse::from(&AppError::Database(sqlx::Error::RowNotFound));
        assert_eq!(response.error, ErrorKind::Internal);
        assert_eq!(response.message, "A storage error occurred");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "internal");
        assert_eq!(json["message"], "A storage error occurred");
    }

    #[test]
    fn validation_errors_keep_field_messages() {
        use validator::Validate;

        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1, message = "Title is required"))]
            title: String,
        }

        let err: AppError = Payload { title: String::new() }
            .validate()
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Title is required"));
    }
}
