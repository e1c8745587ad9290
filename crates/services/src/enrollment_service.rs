use std::sync::Arc;

use market_core::{
    model::{
        Course, CourseId, EnrolledCourse, Enrollment, EnrollmentId, EnrollmentOutcome,
        EnrollmentSource, Identifier, Page, PageRequest, UserId,
    },
    time::Clock,
};
use storage::repository::{CatalogRepository, EnrollmentRepository};

use crate::error::EnrollmentServiceError;

/// Grants course access and answers access checks.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            enrollments,
        }
    }

    async fn resolve(&self, identifier: &str) -> Result<Course, EnrollmentServiceError> {
        let identifier = Identifier::parse(identifier)?;
        self.catalog
            .find_course(&identifier)
            .await?
            .ok_or(EnrollmentServiceError::CourseNotFound)
    }

    /// Enroll a user through any source. An existing enrollment is kept
    /// unchanged and returned.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` on storage faults.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
        source: EnrollmentSource,
    ) -> Result<EnrollmentOutcome, EnrollmentServiceError> {
        let now = self.clock.now();
        let requested = Enrollment::new(EnrollmentId::generate(), user_id, course_id, source, now);
        let enrollment = self.enrollments.enroll(&requested).await?;
        tracing::info!(
            user_id = %user_id,
            course_id = %course_id,
            source = enrollment.source.as_str(),
            "enrollment stored"
        );
        Ok(EnrollmentOutcome {
            has_access: enrollment.has_access(now),
            enrollment,
        })
    }

    /// Self-service enrollment. Only published free courses qualify.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::CourseNotFound` for unknown or
    /// unpublished courses and `PaymentRequired` for paid ones.
    pub async fn self_enroll(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<EnrollmentOutcome, EnrollmentServiceError> {
        let course = self.resolve(identifier).await?;
        if !course.is_published() {
            return Err(EnrollmentServiceError::CourseNotFound);
        }
        if !course.is_free() {
            return Err(EnrollmentServiceError::PaymentRequired);
        }
        self.enroll(user_id, course.id, EnrollmentSource::Free).await
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` on storage faults.
    pub async fn my_courses(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<EnrolledCourse>, EnrollmentServiceError> {
        Ok(self.enrollments.enrolled_courses(user_id, page).await?)
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::CourseNotFound` if the course does
    /// not exist.
    pub async fn is_enrolled(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<bool, EnrollmentServiceError> {
        let course = self.resolve(identifier).await?;
        Ok(self
            .enrollments
            .find_enrollment(user_id, course.id)
            .await?
            .is_some())
    }

    /// Whether the user holds an active, unexpired enrollment.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` on storage faults.
    pub async fn has_access(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentServiceError> {
        let now = self.clock.now();
        Ok(self
            .enrollments
            .find_enrollment(user_id, course_id)
            .await?
            .is_some_and(|e| e.has_access(now)))
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NoAccess` without valid access.
    pub async fn require_access(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), EnrollmentServiceError> {
        if self.has_access(user_id, course_id).await? {
            Ok(())
        } else {
            Err(EnrollmentServiceError::NoAccess)
        }
    }
}
