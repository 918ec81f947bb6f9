use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::credentials::CredentialHasher;
use crate::db::identity;
use crate::error::AppError;
use crate::models::{
    AssetRef, ChangePasswordRequest, RegisterRequest, UpdateProfileRequest, User,
};

/// Account management. All hashing goes through the collaborator; stored
/// hashes never travel on `User` records.
pub struct UserService {
    db: SqlitePool,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserService {
    pub fn new(db: SqlitePool, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { db, hasher }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        if identity::find_user_by_email(&mut tx, &req.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let hash = self.hasher.hash_password(&req.password).await?;
        let user = User::new(
            req.name,
            req.email,
            req.role.unwrap_or_default(),
            req.profile_pic,
        );
        identity::insert_user(&mut tx, &user, &hash).await?;

        tx.commit().await?;

        info!("Registered user {} ({})", user.name, user.id);
        Ok(user)
    }

    /// Unknown email and wrong password come back indistinguishable.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let mut conn = self.db.acquire().await?;

        let Some((user, hash)) = identity::find_credentials_by_email(&mut conn, email).await?
        else {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        };

        if !self.hasher.verify_password(password, &hash).await? {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        info!("User {} authenticated", user.id);
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let Some(current_hash) = identity::password_hash(&mut tx, user_id).await? else {
            return Err(AppError::NotFound("User"));
        };
        if !self
            .hasher
            .verify_password(&req.current_password, &current_hash)
            .await?
        {
            return Err(AppError::Unauthorized(
                "Old password is incorrect".to_string(),
            ));
        }

        let new_hash = self.hasher.hash_password(&req.new_password).await?;
        identity::set_password(&mut tx, user_id, &new_hash).await?;

        tx.commit().await?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    pub async fn profile(&self, user_id: &str) -> Result<User, AppError> {
        let mut conn = self.db.acquire().await?;
        identity::find_user_by_id(&mut conn, user_id)
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        req.validate()?;

        let mut tx = self.db.begin().await?;

        let mut user = identity::find_user_by_id(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if let Some(email) = req.email {
            if email != user.email {
                if identity::find_user_by_email(&mut tx, &email)
                    .await?
                    .is_some()
                {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }
                user.email = email;
            }
        }
        if let Some(name) = req.name {
            user.name = name;
        }

        identity::save_user(&mut tx, &mut user).await?;
        tx.commit().await?;

        Ok(user)
    }

    pub async fn set_profile_picture(
        &self,
        user_id: &str,
        picture: AssetRef,
    ) -> Result<User, AppError> {
        picture.validate()?;

        let mut tx = self.db.begin().await?;

        let mut user = identity::find_user_by_id(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        user.profile_pic = picture;

        identity::save_user(&mut tx, &mut user).await?;
        tx.commit().await?;

        Ok(user)
    }
}
