use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::model::{
    Category, CategoryId, Course, CourseDetail, CourseFilter, CourseId, CourseProgress,
    CourseReview, CourseSummary, CourseTag, EnrolledCourse, Enrollment, Identifier,
    InstructorCourse, InstructorSummary, Lecture, LectureAsset, LectureId, LectureProgress,
    LectureStatus, Page, PageRequest, RatingSummary, ReviewListing, Section, User,
    UserCredentials, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Lecture progress and the per-course snapshot derived from it.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Upsert one lecture's progress, then recompute the user's course
    /// snapshot, atomically.
    ///
    /// `progress.completed_at = None` keeps any completion time already
    /// stored for the row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails; nothing is persisted then.
    async fn apply_progress(
        &self,
        progress: &LectureProgress,
    ) -> Result<CourseProgress, StorageError>;

    /// Rebuild the snapshot for `(user_id, course_id)` from lecture rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn recompute_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn lecture_progress(
        &self,
        user_id: UserId,
        lecture_id: LectureId,
    ) -> Result<Option<LectureProgress>, StorageError>;

    /// All lecture rows a user has for one course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn course_lecture_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LectureProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;
}

/// Course reviews and the rating aggregate cached on the course.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Upsert the review keyed by `(user_id, course_id)` and recompute the
    /// course rating in one transaction.
    ///
    /// On conflict only rating, title, body and `updated_at` change; the
    /// stored id and `created_at` are kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write or the recompute fails.
    async fn apply_review(&self, review: &CourseReview) -> Result<RatingSummary, StorageError>;

    /// Rebuild `rating_avg` / `rating_count` from public reviews.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn recompute_course_rating(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<RatingSummary, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn review_for(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseReview>, StorageError>;

    /// Public reviews for a course, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn list_public_reviews(
        &self,
        course_id: CourseId,
        page: PageRequest,
    ) -> Result<Page<ReviewListing>, StorageError>;

    /// The cached aggregate as stored on the course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn course_rating(&self, course_id: CourseId) -> Result<RatingSummary, StorageError>;
}

/// Courses, categories, curriculum and instructor listings.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate slug.
    async fn upsert_category(&self, category: &Category) -> Result<(), StorageError>;

    /// Insert or update a course. Derived counters are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate slug.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn upsert_section(&self, section: &Section) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn upsert_lecture(&self, lecture: &Lecture) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn insert_asset(&self, asset: &LectureAsset) -> Result<(), StorageError>;

    /// Tags are idempotent; adding an existing tag is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn add_tag(&self, course_id: CourseId, tag: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn list_courses(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<CourseSummary>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn find_course(&self, identifier: &Identifier) -> Result<Option<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn course_detail(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<CourseDetail>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn course_tags(&self, course_ids: &[CourseId]) -> Result<Vec<CourseTag>, StorageError>;

    /// Children of `parent`, or root categories when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn categories(&self, parent: Option<CategoryId>) -> Result<Vec<Category>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn find_category(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Category>, StorageError>;

    /// Users with at least one published course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn instructors(
        &self,
        page: PageRequest,
    ) -> Result<Page<InstructorSummary>, StorageError>;

    /// Every course of an instructor regardless of status, most recently
    /// updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn instructor_courses(
        &self,
        instructor_id: UserId,
    ) -> Result<Vec<InstructorCourse>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn sections(&self, course_id: CourseId) -> Result<Vec<Section>, StorageError>;

    /// All lectures of a course, any publish state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn lectures(&self, course_id: CourseId) -> Result<Vec<Lecture>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn get_lecture(&self, lecture_id: LectureId) -> Result<Option<Lecture>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn lecture_assets(&self, lecture_id: LectureId)
    -> Result<Vec<LectureAsset>, StorageError>;
}

/// User accounts and roles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and grant `role` when that role exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email is already registered.
    async fn insert_user(
        &self,
        user: &User,
        password_hash: &str,
        role: &str,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StorageError>;

    /// Look a user up by id or username.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn find_user(&self, identifier: &Identifier) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn get_user(&self, id: UserId) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn email_exists(&self, email: &str) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Role names held by the user, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn roles(&self, id: UserId) -> Result<Vec<String>, StorageError>;
}

/// Enrollments and the `student_count` cached on courses.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert the enrollment unless one exists for the same user and course,
    /// then recompute the course's `student_count`. Returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// A user's enrollments joined with course and progress, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn enrolled_courses(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<EnrolledCourse>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on storage faults.
    async fn recompute_student_count(&self, course_id: CourseId) -> Result<u32, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// In-memory progress and review storage for tests and prototyping.
///
/// Lectures and courses registered through `add_lecture` / `add_course`
/// stand in for the catalog tables the aggregates read from.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lectures: Arc<Mutex<HashMap<LectureId, Lecture>>>,
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    lecture_progress: Arc<Mutex<HashMap<(UserId, LectureId), LectureProgress>>>,
    course_progress: Arc<Mutex<HashMap<(UserId, CourseId), CourseProgress>>>,
    reviews: Arc<Mutex<HashMap<(UserId, CourseId), CourseReview>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a lecture so progress recomputes can see it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn add_lecture(&self, lecture: Lecture) -> Result<(), StorageError> {
        let mut guard = self.lectures.lock().map_err(poisoned)?;
        guard.insert(lecture.id, lecture);
        Ok(())
    }

    /// Registers a course so rating recomputes have somewhere to land.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn add_course(&self, course: Course) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course.id, course);
        Ok(())
    }

    /// Flips a review's visibility, as moderation would.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if there is no such review.
    pub fn set_review_public(
        &self,
        user_id: UserId,
        course_id: CourseId,
        is_public: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.reviews.lock().map_err(poisoned)?;
        let review = guard
            .get_mut(&(user_id, course_id))
            .ok_or(StorageError::NotFound)?;
        review.is_public = is_public;
        Ok(())
    }

    fn snapshot(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        let lectures = self.lectures.lock().map_err(poisoned)?;
        let rows = self.lecture_progress.lock().map_err(poisoned)?;

        let total = lectures
            .values()
            .filter(|l| l.course_id == course_id && l.is_published())
            .count();
        let completed = rows
            .values()
            .filter(|p| {
                p.user_id == user_id
                    && p.course_id == course_id
                    && p.status == LectureStatus::Completed
                    && lectures
                        .get(&p.lecture_id)
                        .is_some_and(|l| l.is_published() && l.course_id == course_id)
            })
            .count();
        drop(rows);
        drop(lectures);

        let snapshot = CourseProgress::from_counts(
            user_id,
            course_id,
            count_u32(completed)?,
            count_u32(total)?,
            now,
        );
        let mut cache = self.course_progress.lock().map_err(poisoned)?;
        cache.insert((user_id, course_id), snapshot.clone());
        Ok(snapshot)
    }

    fn rating(&self, course_id: CourseId, now: DateTime<Utc>) -> Result<RatingSummary, StorageError> {
        let reviews = self.reviews.lock().map_err(poisoned)?;
        let summary = RatingSummary::from_ratings(
            reviews
                .values()
                .filter(|r| r.course_id == course_id && r.is_public)
                .map(|r| r.rating),
        );
        drop(reviews);

        let mut courses = self.courses.lock().map_err(poisoned)?;
        if let Some(course) = courses.get_mut(&course_id) {
            course.rating_avg = summary.rating_avg;
            course.rating_count = summary.rating_count;
            course.updated_at = now;
        }
        Ok(summary)
    }
}

fn count_u32(n: usize) -> Result<u32, StorageError> {
    u32::try_from(n).map_err(|_| StorageError::Serialization("count overflow".into()))
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn apply_progress(
        &self,
        progress: &LectureProgress,
    ) -> Result<CourseProgress, StorageError> {
        {
            let mut rows = self.lecture_progress.lock().map_err(poisoned)?;
            let key = (progress.user_id, progress.lecture_id);
            let mut stored = progress.clone();
            if stored.completed_at.is_none() {
                stored.completed_at = rows.get(&key).and_then(|p| p.completed_at);
            }
            rows.insert(key, stored);
        }
        self.snapshot(progress.user_id, progress.course_id, progress.updated_at)
    }

    async fn recompute_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        self.snapshot(user_id, course_id, now)
    }

    async fn lecture_progress(
        &self,
        user_id: UserId,
        lecture_id: LectureId,
    ) -> Result<Option<LectureProgress>, StorageError> {
        let rows = self.lecture_progress.lock().map_err(poisoned)?;
        Ok(rows.get(&(user_id, lecture_id)).cloned())
    }

    async fn course_lecture_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LectureProgress>, StorageError> {
        let rows = self.lecture_progress.lock().map_err(poisoned)?;
        Ok(rows
            .values()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let cache = self.course_progress.lock().map_err(poisoned)?;
        Ok(cache.get(&(user_id, course_id)).cloned())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryRepository {
    async fn apply_review(&self, review: &CourseReview) -> Result<RatingSummary, StorageError> {
        {
            let mut reviews = self.reviews.lock().map_err(poisoned)?;
            reviews
                .entry((review.user_id, review.course_id))
                .and_modify(|existing| {
                    existing.rating = review.rating;
                    existing.title.clone_from(&review.title);
                    existing.body.clone_from(&review.body);
                    existing.updated_at = review.updated_at;
                })
                .or_insert_with(|| review.clone());
        }
        self.rating(review.course_id, review.updated_at)
    }

    async fn recompute_course_rating(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<RatingSummary, StorageError> {
        self.rating(course_id, now)
    }

    async fn review_for(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseReview>, StorageError> {
        let reviews = self.reviews.lock().map_err(poisoned)?;
        Ok(reviews.get(&(user_id, course_id)).cloned())
    }

    async fn list_public_reviews(
        &self,
        course_id: CourseId,
        page: PageRequest,
    ) -> Result<Page<ReviewListing>, StorageError> {
        let reviews = self.reviews.lock().map_err(poisoned)?;
        let mut public: Vec<&CourseReview> = reviews
            .values()
            .filter(|r| r.course_id == course_id && r.is_public)
            .collect();
        public.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = public.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(0);
        let items = public
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|r| ReviewListing {
                review: r.clone(),
                author: None,
            })
            .collect();
        Ok(Page::new(page, total, items))
    }

    async fn course_rating(&self, course_id: CourseId) -> Result<RatingSummary, StorageError> {
        let courses = self.courses.lock().map_err(poisoned)?;
        let course = courses.get(&course_id).ok_or(StorageError::NotFound)?;
        Ok(RatingSummary {
            rating_avg: course.rating_avg,
            rating_count: course.rating_count,
        })
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// All repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub users: Arc<dyn UserRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::model::{
        LectureKind, Rating, ReviewId, SectionId, completion_percent,
    };
    use market_core::time::fixed_now;

    fn lecture(course_id: CourseId, published: bool) -> Lecture {
        let section = Section::new(SectionId::generate(), course_id, "S", 1).unwrap();
        let mut lecture =
            Lecture::new(LectureId::generate(), &section, LectureKind::Video, "L", 1).unwrap();
        if published {
            lecture.publish(fixed_now());
        }
        lecture
    }

    fn progress(
        user_id: UserId,
        lecture: &Lecture,
        status: LectureStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> LectureProgress {
        LectureProgress {
            user_id,
            lecture_id: lecture.id,
            course_id: lecture.course_id,
            status,
            last_position_seconds: 0,
            completed_at,
            updated_at: fixed_now(),
        }
    }

    fn review(user_id: UserId, course_id: CourseId, rating: i64) -> CourseReview {
        CourseReview {
            id: ReviewId::generate(),
            course_id,
            user_id,
            rating: Rating::from_i64(rating),
            title: None,
            body: None,
            is_public: true,
            is_flagged: false,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn progress_snapshot_counts_only_published_lectures() {
        let repo = InMemoryRepository::new();
        let course = CourseId::generate();
        let user = UserId::generate();
        let live = [lecture(course, true), lecture(course, true)];
        let draft = lecture(course, false);
        for l in live.iter().chain(std::iter::once(&draft)) {
            repo.add_lecture(l.clone()).unwrap();
        }

        repo.apply_progress(&progress(user, &draft, LectureStatus::Completed, Some(fixed_now())))
            .await
            .unwrap();
        let snap = repo
            .apply_progress(&progress(user, &live[0], LectureStatus::Completed, Some(fixed_now())))
            .await
            .unwrap();

        assert_eq!(snap.total_lectures, 2);
        assert_eq!(snap.completed_lectures, 1);
        assert_eq!(snap.percent, completion_percent(1, 2));
        assert_eq!(repo.course_progress(user, course).await.unwrap(), Some(snap));
    }

    #[tokio::test]
    async fn progress_keeps_stored_completion_time() {
        let repo = InMemoryRepository::new();
        let course = CourseId::generate();
        let user = UserId::generate();
        let l = lecture(course, true);
        repo.add_lecture(l.clone()).unwrap();

        repo.apply_progress(&progress(user, &l, LectureStatus::Completed, Some(fixed_now())))
            .await
            .unwrap();
        repo.apply_progress(&progress(user, &l, LectureStatus::InProgress, None))
            .await
            .unwrap();

        let stored = repo.lecture_progress(user, l.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LectureStatus::InProgress);
        assert_eq!(stored.completed_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn review_upsert_keeps_one_row_per_user() {
        let repo = InMemoryRepository::new();
        let course = CourseId::generate();
        let user = UserId::generate();

        let first = review(user, course, 2);
        repo.apply_review(&first).await.unwrap();
        let summary = repo.apply_review(&review(user, course, 5)).await.unwrap();

        assert_eq!(summary.rating_count, 1);
        assert!((summary.rating_avg - 5.0).abs() < f64::EPSILON);
        let stored = repo.review_for(user, course).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn hidden_reviews_leave_the_average() {
        let repo = InMemoryRepository::new();
        let course = CourseId::generate();
        let (a, b) = (UserId::generate(), UserId::generate());
        repo.apply_review(&review(a, course, 5)).await.unwrap();
        repo.apply_review(&review(b, course, 1)).await.unwrap();

        repo.set_review_public(b, course, false).unwrap();
        let summary = repo.recompute_course_rating(course, fixed_now()).await.unwrap();

        assert_eq!(summary.rating_count, 1);
        assert!((summary.rating_avg - 5.0).abs() < f64::EPSILON);
        let page = repo
            .list_public_reviews(course, PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
