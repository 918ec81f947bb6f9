use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};

use crate::error::AppError;
use crate::models::user::Role;
use crate::models::{Enrollment, User};

/// Raw user row without the credential column. Everything that reaches
/// callers goes through this shape, so the hash cannot leak by accident.
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    profile_pic: String,
    enrollments: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<User, AppError> {
        Ok(User {
            role: Role::parse(&row.role).ok_or(AppError::Internal)?,
            id: row.id,
            name: row.name,
            email: row.email,
            profile_pic: serde_json::from_str(&row.profile_pic)?,
            enrollments: serde_json::from_str(&row.enrollments)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row shape for the login path. The only query that selects the hash.
#[derive(Debug, FromRow)]
struct CredentialRow {
    password_hash: String,
    id: String,
    name: String,
    email: String,
    role: String,
    profile_pic: String,
    enrollments: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, FromRow)]
struct EnrollmentsRow {
    id: String,
    enrollments: String,
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    user: &User,
    password_hash: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, profile_pic, enrollments, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(password_hash)
    .bind(user.role.as_str())
    .bind(serde_json::to_string(&user.profile_pic)?)
    .bind(serde_json::to_string(&user.enrollments)?)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_user_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, role, profile_pic, enrollments, created_at, updated_at FROM users WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(User::try_from).transpose()
}

pub async fn find_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, role, profile_pic, enrollments, created_at, updated_at FROM users WHERE email = ?"
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(User::try_from).transpose()
}

/// Login path. Hands the hash back out-of-band of the user document.
pub async fn find_credentials_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<(User, String)>, AppError> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT password_hash, id, name, email, role, profile_pic, enrollments, created_at, updated_at FROM users WHERE email = ?"
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let user = User {
        role: Role::parse(&row.role).ok_or(AppError::Internal)?,
        id: row.id,
        name: row.name,
        email: row.email,
        profile_pic: serde_json::from_str(&row.profile_pic)?,
        enrollments: serde_json::from_str(&row.enrollments)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };

    Ok(Some((user, row.password_hash)))
}

pub async fn password_hash(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<String>, AppError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(|(hash,)| hash))
}

pub async fn set_password(
    conn: &mut SqliteConnection,
    user_id: &str,
    password_hash: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Writes the document back and refreshes `updated_at`. The credential
/// column is left untouched; use `set_password` for that.
pub async fn save_user(conn: &mut SqliteConnection, user: &mut User) -> Result<bool, AppError> {
    user.updated_at = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE users SET name = ?, email = ?, role = ?, profile_pic = ?, enrollments = ?, updated_at = ? WHERE id = ?"
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(serde_json::to_string(&user.profile_pic)?)
    .bind(serde_json::to_string(&user.enrollments)?)
    .bind(&user.updated_at)
    .bind(&user.id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Removes the given lecture IDs from every completion list that mentions
/// them. Progress figures are left as they are. Returns how many users were
/// rewritten and how many references came out.
pub async fn prune_completed_lectures(
    conn: &mut SqliteConnection,
    lecture_ids: &[String],
) -> Result<(u64, u64), AppError> {
    if lecture_ids.is_empty() {
        return Ok((0, 0));
    }

    let rows = sqlx::query_as::<_, EnrollmentsRow>("SELECT id, enrollments FROM users")
        .fetch_all(&mut *conn)
        .await?;

    let mut users_updated = 0u64;
    let mut refs_removed = 0u64;

    for row in rows {
        let mut enrollments: Vec<Enrollment> = serde_json::from_str(&row.enrollments)?;
        let before: usize = enrollments.iter().map(|e| e.completed_lectures.len()).sum();
        for enrollment in &mut enrollments {
            enrollment
                .completed_lectures
                .retain(|id| !lecture_ids.contains(id));
        }
        let after: usize = enrollments.iter().map(|e| e.completed_lectures.len()).sum();

        if after != before {
            sqlx::query("UPDATE users SET enrollments = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(&enrollments)?)
                .bind(Utc::now().to_rfc3339())
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
            users_updated += 1;
            refs_removed += (before - after) as u64;
        }
    }

    Ok((users_updated, refs_removed))
}

/// Drops every enrollment pointing at the given course. Returns how many
/// users lost one.
pub async fn remove_course_enrollments(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<u64, AppError> {
    // Cheap prefilter; the JSON parse below decides for real.
    let rows = sqlx::query_as::<_, EnrollmentsRow>(
        "SELECT id, enrollments FROM users WHERE enrollments LIKE '%' || ? || '%'",
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut removed = 0u64;

    for row in rows {
        let mut enrollments: Vec<Enrollment> = serde_json::from_str(&row.enrollments)?;
        let before = enrollments.len();
        enrollments.retain(|e| e.course_id != course_id);

        if enrollments.len() != before {
            sqlx::query("UPDATE users SET enrollments = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(&enrollments)?)
                .bind(Utc::now().to_rfc3339())
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
            removed += 1;
        }
    }

    Ok(removed)
}
