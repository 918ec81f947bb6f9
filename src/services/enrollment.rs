use sqlx::SqlitePool;
use tracing::info;

use crate::db::{catalog, identity};
use crate::error::AppError;
use crate::models::Enrollment;

/// Sign-up and lecture completion across the two stores. Every operation
/// reads and writes inside one transaction; a course deleted mid-flight can
/// never leave a fresh completion behind.
pub struct EnrollmentService {
    db: SqlitePool,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn enroll(&self, course_id: &str, user_id: &str) -> Result<Enrollment, AppError> {
        let mut tx = self.db.begin().await?;

        let course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;
        let mut user = identity::find_user_by_id(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if user.is_enrolled(&course.id) {
            return Err(AppError::Conflict(
                "User already enrolled in this course".to_string(),
            ));
        }

        let enrollment = Enrollment::new(course.id);
        user.enrollments.push(enrollment.clone());
        identity::save_user(&mut tx, &mut user).await?;

        tx.commit().await?;

        info!("Enrolled user {} in course {}", user_id, course_id);
        Ok(enrollment)
    }

    pub async fn mark_lecture_complete(
        &self,
        course_id: &str,
        module_id: &str,
        lecture_id: &str,
        user_id: &str,
    ) -> Result<Enrollment, AppError> {
        let mut tx = self.db.begin().await?;

        let course = catalog::find_course_by_id(&mut tx, course_id)
            .await?
            .ok_or(AppError::NotFound("Course"))?;
        let module = course.module(module_id).ok_or(AppError::NotFound("Module"))?;
        if module.lecture(lecture_id).is_none() {
            return Err(AppError::NotFound("Lecture"));
        }

        let mut user = identity::find_user_by_id(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        // Lecture count and unlock order come from the course document read
        // in this same transaction.
        let total = course.total_lectures();
        let sequence = course.lecture_sequence();

        let Some(enrollment) = user.enrollment_mut(course_id) else {
            return Err(AppError::Conflict(
                "User not enrolled in this course".to_string(),
            ));
        };

        if enrollment.completed_lectures.iter().any(|id| id == lecture_id) {
            return Ok(enrollment.clone());
        }

        // Sequential unlock spans the whole course, not one module.
        if let Some(prev) = predecessor_of(&sequence, lecture_id) {
            if !enrollment.completed_lectures.iter().any(|id| id == prev) {
                return Err(AppError::Conflict(
                    "Previous lecture must be completed first".to_string(),
                ));
            }
        }

        enrollment.completed_lectures.push(lecture_id.to_string());
        enrollment.progress =
            (enrollment.completed_lectures.len() as f64 / total as f64) * 100.0;
        let updated = enrollment.clone();

        identity::save_user(&mut tx, &mut user).await?;
        tx.commit().await?;

        info!(
            "User {} completed lecture {} in course {} ({:.1}%)",
            user_id, lecture_id, course_id, updated.progress
        );
        Ok(updated)
    }
}

/// ID of the lecture right before `target` in unlock order, if there is one.
fn predecessor_of<'a>(sequence: &[&'a str], target: &str) -> Option<&'a str> {
    sequence
        .iter()
        .position(|id| *id == target)
        .filter(|idx| *idx > 0)
        .map(|idx| sequence[idx - 1])
}
