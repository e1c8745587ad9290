use std::sync::Arc;

use market_core::{
    model::{
        Category, CategoryId, Course, CourseDetail, CourseFilter, CourseId, CourseSort,
        CourseStatus, CourseSummary, CourseTag, Curriculum, Identifier, InstructorCourse,
        InstructorDetail, InstructorSummary, LectureDetail, LectureId, MAX_PAGE_SIZE, Page,
        PageRequest, PublicProfile, User, UserId,
    },
    time::Clock,
};
use storage::repository::{
    CatalogRepository, EnrollmentRepository, ProgressRepository, UserRepository,
};

use crate::error::CatalogServiceError;

/// Read side of the marketplace: courses, categories, instructors,
/// curriculum and lectures.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    users: Arc<dyn UserRepository>,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        users: Arc<dyn UserRepository>,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            users,
            progress,
            enrollments,
        }
    }

    //
    // ─── COURSES ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` on storage faults.
    pub async fn list_courses(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<CourseSummary>, CatalogServiceError> {
        Ok(self.catalog.list_courses(filter, page).await?)
    }

    /// Look a course up by id or slug.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when nothing matches.
    pub async fn resolve_course(&self, identifier: &str) -> Result<Course, CatalogServiceError> {
        let identifier = Identifier::parse(identifier)?;
        self.catalog
            .find_course(&identifier)
            .await?
            .ok_or(CatalogServiceError::NotFound("course"))
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when nothing matches.
    pub async fn course_detail(
        &self,
        identifier: &str,
    ) -> Result<CourseDetail, CatalogServiceError> {
        let identifier = Identifier::parse(identifier)?;
        self.catalog
            .course_detail(&identifier)
            .await?
            .ok_or(CatalogServiceError::NotFound("course"))
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` on storage faults.
    pub async fn course_tags(
        &self,
        course_ids: &[CourseId],
    ) -> Result<Vec<CourseTag>, CatalogServiceError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.catalog.course_tags(course_ids).await?)
    }

    //
    // ─── CATEGORIES ────────────────────────────────────────────────────────────
    //

    /// Root categories, or the children of `parent`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` on storage faults.
    pub async fn categories(
        &self,
        parent: Option<CategoryId>,
    ) -> Result<Vec<Category>, CatalogServiceError> {
        Ok(self.catalog.categories(parent).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when nothing matches.
    pub async fn category(&self, identifier: &str) -> Result<Category, CatalogServiceError> {
        let identifier = Identifier::parse(identifier)?;
        self.catalog
            .find_category(&identifier)
            .await?
            .ok_or(CatalogServiceError::NotFound("category"))
    }

    /// Published courses of a category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the category does not exist.
    pub async fn courses_by_category(
        &self,
        identifier: &str,
        page: PageRequest,
    ) -> Result<Page<CourseSummary>, CatalogServiceError> {
        let category = self.category(identifier).await?;
        let filter = CourseFilter {
            category_id: Some(category.id),
            status: Some(CourseStatus::Published),
            sort: CourseSort::Newest,
            ..CourseFilter::default()
        };
        self.list_courses(&filter, page).await
    }

    //
    // ─── INSTRUCTORS & PROFILES ────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` on storage faults.
    pub async fn instructors(
        &self,
        page: PageRequest,
    ) -> Result<Page<InstructorSummary>, CatalogServiceError> {
        Ok(self.catalog.instructors(page).await?)
    }

    async fn resolve_user(&self, identifier: &str) -> Result<User, CatalogServiceError> {
        let identifier = Identifier::parse(identifier)?;
        self.users
            .find_user(&identifier)
            .await?
            .ok_or(CatalogServiceError::NotFound("user"))
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when no user matches.
    pub async fn public_profile(
        &self,
        identifier: &str,
    ) -> Result<PublicProfile, CatalogServiceError> {
        Ok(self.resolve_user(identifier).await?.public_profile())
    }

    /// Public profile plus the instructor's published courses.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when no user matches.
    pub async fn instructor_detail(
        &self,
        identifier: &str,
    ) -> Result<InstructorDetail, CatalogServiceError> {
        let user = self.resolve_user(identifier).await?;
        let filter = CourseFilter {
            instructor_id: Some(user.id),
            ..CourseFilter::published()
        };
        let courses = self
            .catalog
            .list_courses(&filter, PageRequest::first(MAX_PAGE_SIZE))
            .await?;
        Ok(InstructorDetail {
            profile: user.public_profile(),
            course_count: usize::try_from(courses.total).unwrap_or(usize::MAX),
            courses: courses.items,
        })
    }

    /// Every course of the instructor, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` when no user matches.
    pub async fn instructor_courses(
        &self,
        identifier: &str,
    ) -> Result<Vec<InstructorCourse>, CatalogServiceError> {
        let user = self.resolve_user(identifier).await?;
        Ok(self.catalog.instructor_courses(user.id).await?)
    }

    //
    // ─── CURRICULUM ────────────────────────────────────────────────────────────
    //

    /// Sections with their published lectures. With a viewer, each lecture
    /// carries the viewer's progress and the course snapshot is attached.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the course does not exist.
    pub async fn curriculum(
        &self,
        identifier: &str,
        viewer: Option<UserId>,
    ) -> Result<Curriculum, CatalogServiceError> {
        let course = self.resolve_course(identifier).await?;
        let sections = self.catalog.sections(course.id).await?;
        let lectures = self.catalog.lectures(course.id).await?;

        let (progress, snapshot) = match viewer {
            Some(user_id) => (
                self.progress
                    .course_lecture_progress(user_id, course.id)
                    .await?,
                self.progress.course_progress(user_id, course.id).await?,
            ),
            None => (Vec::new(), None),
        };

        Ok(Curriculum::assemble(
            course.id, sections, lectures, &progress, snapshot,
        ))
    }

    /// A lecture with its assets, withheld unless it is a preview or the
    /// viewer holds valid access to the course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown or unpublished
    /// lectures.
    pub async fn lecture_detail(
        &self,
        lecture_id: LectureId,
        viewer: Option<UserId>,
    ) -> Result<LectureDetail, CatalogServiceError> {
        let lecture = self
            .catalog
            .get_lecture(lecture_id)
            .await?
            .filter(|l| l.is_published())
            .ok_or(CatalogServiceError::NotFound("lecture"))?;
        let assets = self.catalog.lecture_assets(lecture.id).await?;

        let (has_access, progress) = match viewer {
            Some(user_id) => {
                let enrollment = self
                    .enrollments
                    .find_enrollment(user_id, lecture.course_id)
                    .await?;
                let now = self.clock.now();
                (
                    enrollment.is_some_and(|e| e.has_access(now)),
                    self.progress.lecture_progress(user_id, lecture.id).await?,
                )
            }
            None => (false, None),
        };

        let sections = self.catalog.sections(lecture.course_id).await?;
        let lectures = self.catalog.lectures(lecture.course_id).await?;
        let neighbours = Curriculum::assemble(lecture.course_id, sections, lectures, &[], None)
            .neighbours(lecture.id);

        Ok(LectureDetail::new(lecture, assets, has_access, progress).with_neighbours(neighbours))
    }

    /// The lecture regardless of viewer, for callers that only need its course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown or unpublished
    /// lectures.
    pub async fn lecture_course(&self, lecture_id: LectureId) -> Result<CourseId, CatalogServiceError> {
        self.catalog
            .get_lecture(lecture_id)
            .await?
            .filter(|l| l.is_published())
            .map(|l| l.course_id)
            .ok_or(CatalogServiceError::NotFound("lecture"))
    }
}
