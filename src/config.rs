use std::env;

use crate::error::AppError;

/// Runtime settings, read once at startup. `.env` loading is the binary's
/// job (`dotenvy`); the library only looks at the process environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Seed a small demo catalog after migrating (development aid).
    pub seed_demo: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://lms.db".to_string());

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                AppError::Validation("DATABASE_MAX_CONNECTIONS must be a positive integer".to_string())
            })?,
            Err(_) => 5,
        };
        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be a positive integer".to_string(),
            ));
        }

        let seed_demo = env::var("LMS_SEED_DEMO")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            max_connections,
            seed_demo,
        })
    }
}
