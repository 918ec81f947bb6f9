pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use credentials::{CredentialHasher, PlainTextCredentials};
pub use error::{AppError, ErrorKind, ErrorResponse};
pub use services::{CourseService, EnrollmentService, UserService};
