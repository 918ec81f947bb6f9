pub mod courses;
pub mod enrollment;
pub mod users;

pub use courses::CourseService;
pub use enrollment::EnrollmentService;
pub use users::UserService;
