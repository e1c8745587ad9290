pub mod course;
pub mod curriculum;
pub mod enrollment;
mod identifier;
mod ids;
mod page;
pub mod progress;
pub mod review;
pub mod user;

pub use identifier::{Identifier, IdentifierError};
pub use ids::{
    CategoryId, CourseId, EnrollmentId, LectureAssetId, LectureId, ParseIdError, ReviewId, RoleId,
    SectionId, UserId,
};
pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest};

pub use course::{
    Category, CategoryRef, Course, CourseDetail, CourseError, CourseFilter, CourseSort,
    CourseStatus, CourseSummary, CourseTag, InstructorCourse, InstructorDetail, InstructorRef,
    InstructorSummary, UserRef,
};
pub use curriculum::{
    Curriculum, CurriculumError, CurriculumLecture, CurriculumSection, Lecture, LectureAsset,
    LectureDetail, LectureKind, LectureLink, PublishState, Section,
};
pub use enrollment::{
    EnrolledCourse, Enrollment, EnrollmentError, EnrollmentOutcome, EnrollmentSource,
    EnrollmentStatus,
};
pub use progress::{
    CourseProgress, LectureProgress, LectureStatus, ProgressError, ProgressSummary,
    ProgressUpdate, ResolvedProgress, completion_percent,
};
pub use review::{CourseReview, Rating, RatingSummary, ReviewListing, ReviewSubmission};
pub use user::{NewUser, PublicProfile, User, UserCredentials, UserError, UserStatus};
