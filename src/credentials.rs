use async_trait::async_trait;

use crate::error::AppError;

/// Seam for password hashing. Deployments plug in a real KDF behind this
/// trait; the plain-text stand-in below is for local runs and tests.
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AppError>;

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError>;
}

/// Stores passwords verbatim. Never use outside development databases.
pub struct PlainTextCredentials;

#[async_trait]
impl CredentialHasher for PlainTextCredentials {
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        Ok(password.to_string())
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        Ok(password == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_round_trip() {
        let hasher = PlainTextCredentials;
        let hash = hasher.hash_password("secret1").await.unwrap();
        assert!(hasher.verify_password("secret1", &hash).await.unwrap());
        assert!(!hasher.verify_password("secret2", &hash).await.unwrap());
    }
}
