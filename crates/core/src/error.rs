use thiserror::Error;

use crate::model::{
    CourseError, CurriculumError, EnrollmentError, IdentifierError, ParseIdError, ProgressError,
    UserError,
};

/// Any domain validation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
