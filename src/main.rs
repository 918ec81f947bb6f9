use std::sync::Arc;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lms_core::models::{AssetRef, LectureDraft, ModuleDraft, NewCourseRequest, RegisterRequest};
use lms_core::{AppConfig, AppError, CourseService, EnrollmentService, PlainTextCredentials, UserService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lms_core=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Store ready at {}", config.database_url);

    if config.seed_demo {
        seed_demo(&pool).await?;
    }

    Ok(())
}

/// Seeds a small catalog and walks it through the engine once, so a fresh
/// checkout has something to poke at. Skipped when the catalog has rows.
async fn seed_demo(pool: &SqlitePool) -> Result<(), AppError> {
    let courses = CourseService::new(pool.clone());
    let users = UserService::new(pool.clone(), Arc::new(PlainTextCredentials));
    let enrollment = EnrollmentService::new(pool.clone());

    if !courses.list_courses().await?.is_empty() {
        info!("Demo seed skipped: catalog is not empty");
        return Ok(());
    }

    let course = courses
        .create_course(NewCourseRequest {
            title: "Practical Rust".to_string(),
            description: "Ownership, lifetimes and the ecosystem, end to end".to_string(),
            price: 0.0,
            thumbnail: AssetRef {
                public_id: "demo/practical-rust".to_string(),
                url: "https://cdn.example.com/demo/practical-rust.png".to_string(),
            },
            modules: vec![
                ModuleDraft {
                    id: None,
                    title: "Getting started".to_string(),
                    module_number: 1,
                    lectures: vec![
                        LectureDraft {
                            id: None,
                            title: "Why Rust".to_string(),
                            video_url: "https://cdn.example.com/demo/why-rust.mp4".to_string(),
                            pdf_notes: vec![],
                        },
                        LectureDraft {
                            id: None,
                            title: "Tooling".to_string(),
                            video_url: "https://cdn.example.com/demo/tooling.mp4".to_string(),
                            pdf_notes: vec![],
                        },
                    ],
                },
                ModuleDraft {
                    id: None,
                    title: "Ownership".to_string(),
                    module_number: 2,
                    lectures: vec![LectureDraft {
                        id: None,
                        title: "Moves and borrows".to_string(),
                        video_url: "https://cdn.example.com/demo/moves.mp4".to_string(),
                        pdf_notes: vec![],
                    }],
                },
            ],
        })
        .await?;

    let student = users
        .register(RegisterRequest {
            name: "Demo Student".to_string(),
            email: "student@example.com".to_string(),
            password: "changeme".to_string(),
            role: None,
            profile_pic: None,
        })
        .await?;

    enrollment.enroll(&course.id, &student.id).await?;

    if let Some(module) = course.modules.first() {
        if let Some(lecture) = module.lectures.first() {
            let progress = enrollment
                .mark_lecture_complete(&course.id, &module.id, &lecture.id, &student.id)
                .await?;
            info!("Demo student at {:.1}% after the first lecture", progress.progress);
        }
    }

    info!("Seeded demo catalog: course {} and user {}", course.id, student.id);
    Ok(())
}
