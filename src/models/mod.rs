pub mod course;
pub mod user;

pub use course::{
    AssetRef, Course, Lecture, LectureDraft, LectureFilter, LectureHit, Module, ModuleDraft,
    NewCourseRequest, NewLectureRequest, NewModuleRequest, UpdateCourseRequest,
    UpdateLectureRequest, UpdateModuleRequest,
};
pub use user::{
    ChangePasswordRequest, Enrollment, RegisterRequest, Role, UpdateProfileRequest, User,
};
