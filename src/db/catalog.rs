use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};

use crate::error::AppError;
use crate::models::Course;

/// Raw course row. The thumbnail and the module tree are JSON columns and
/// get expanded on the way out.
#[derive(Debug, FromRow)]
struct CourseRow {
    id: String,
    title: String,
    description: String,
    price: f64,
    thumbnail: String,
    modules: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = AppError;

    fn try_from(row: CourseRow) -> Result<Course, AppError> {
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            thumbnail: serde_json::from_str(&row.thumbnail)?,
            modules: serde_json::from_str(&row.modules)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_course(conn: &mut SqliteConnection, course: &Course) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO courses (id, title, description, price, thumbnail, modules, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&course.id)
    .bind(&course.title)
    .bind(&course.description)
    .bind(course.price)
    .bind(serde_json::to_string(&course.thumbnail)?)
    .bind(serde_json::to_string(&course.modules)?)
    .bind(&course.created_at)
    .bind(&course.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_course_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Course>, AppError> {
    let row = sqlx::query_as::<_, CourseRow>(
        "SELECT id, title, description, price, thumbnail, modules, created_at, updated_at FROM courses WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Course::try_from).transpose()
}

pub async fn fetch_courses(conn: &mut SqliteConnection) -> Result<Vec<Course>, AppError> {
    let rows = sqlx::query_as::<_, CourseRow>(
        "SELECT id, title, description, price, thumbnail, modules, created_at, updated_at FROM courses ORDER BY created_at"
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Course::try_from).collect()
}

/// Writes the whole document back and refreshes `updated_at`. Returns false
/// when the course no longer exists.
pub async fn save_course(conn: &mut SqliteConnection, course: &mut Course) -> Result<bool, AppError> {
    course.updated_at = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE courses SET title = ?, description = ?, price = ?, thumbnail = ?, modules = ?, updated_at = ? WHERE id = ?"
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(course.price)
    .bind(serde_json::to_string(&course.thumbnail)?)
    .bind(serde_json::to_string(&course.modules)?)
    .bind(&course.updated_at)
    .bind(&course.id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_course(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetRef, LectureDraft, ModuleDraft, NewCourseRequest};
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn sample_course() -> Course {
        Course::new(NewCourseRequest {
            title: "Rust for Backends".to_string(),
            description: "Ownership on the server".to_string(),
            price: 49.0,
            thumbnail: AssetRef {
                public_id: "thumbs/rust".to_string(),
                url: "https://cdn.example.com/thumbs/rust.png".to_string(),
            },
            modules: vec![ModuleDraft {
                id: None,
                title: "Basics".to_string(),
                module_number: 1,
                lectures: vec![LectureDraft {
                    id: None,
                    title: "Intro".to_string(),
                    video_url: "https://cdn.example.com/v/intro.mp4".to_string(),
                    pdf_notes: vec![],
                }],
            }],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_the_module_tree() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let course = sample_course();
        insert_course(&mut conn, &course).await.unwrap();

        let found = find_course_by_id(&mut conn, &course.id)
            .await
            .unwrap()
            .expect("course should exist");

        assert_eq!(found.title, "Rust for Backends");
        assert_eq!(found.modules.len(), 1);
        assert_eq!(found.modules[0].lectures[0].title, "Intro");
        assert_eq!(found.thumbnail.public_id, "thumbs/rust");
    }

    #[tokio::test]
    async fn save_persists_tree_changes_and_reports_missing_rows() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut course = sample_course();
        insert_course(&mut conn, &course).await.unwrap();

        course.modules[0].title = "Foundations".to_string();
        assert!(save_course(&mut conn, &mut course).await.unwrap());

        let found = find_course_by_id(&mut conn, &course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.modules[0].title, "Foundations");

        let mut ghost = sample_course();
        assert!(!save_course(&mut conn, &mut ghost).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let course = sample_course();
        insert_course(&mut conn, &course).await.unwrap();

        assert!(delete_course(&mut conn, &course.id).await.unwrap());
        assert!(!delete_course(&mut conn, &course.id).await.unwrap());
        assert!(find_course_by_id(&mut conn, &course.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn listing_orders_by_creation() {
        let pool = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut first = sample_course();
        first.created_at = "2024-01-01T00:00:00+00:00".to_string();
        let mut second = sample_course();
        second.created_at = "2024-02-01T00:00:00+00:00".to_string();

        insert_course(&mut conn, &second).await.unwrap();
        insert_course(&mut conn, &first).await.unwrap();

        let all = fetch_courses(&mut conn).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }
}
