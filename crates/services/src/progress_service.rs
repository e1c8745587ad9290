use std::sync::Arc;

use market_core::{
    model::{
        CourseId, CourseProgress, LectureId, LectureProgress, ProgressSummary, ProgressUpdate,
        UserId,
    },
    time::Clock,
};
use storage::repository::ProgressRepository;

use crate::error::ProgressServiceError;

/// Records lecture progress and keeps the per-course snapshot current.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, progress }
    }

    /// Apply `update` to one lecture and return the recomputed course
    /// snapshot.
    ///
    /// Course and lecture references are taken as given; callers resolve the
    /// lecture first so `course_id` is the lecture's own course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the upsert or the recompute
    /// fails. Neither is persisted in that case.
    pub async fn record_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lecture_id: LectureId,
        update: ProgressUpdate,
    ) -> Result<ProgressSummary, ProgressServiceError> {
        let now = self.clock.now();
        let resolved = update.resolve(now);
        // The store keeps an earlier completion stamp when this one is None.
        let row = LectureProgress::from_update(user_id, course_id, lecture_id, resolved, now);

        let snapshot = self.progress.apply_progress(&row).await?;
        tracing::debug!(
            user_id = %user_id,
            course_id = %course_id,
            lecture_id = %lecture_id,
            status = resolved.status.as_str(),
            percent = snapshot.percent,
            "lecture progress recorded"
        );
        Ok(snapshot.summary())
    }

    /// The stored snapshot, or an empty one when the user has no progress yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on storage faults.
    pub async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let stored = self.progress.course_progress(user_id, course_id).await?;
        Ok(stored.unwrap_or_else(|| {
            CourseProgress::from_counts(user_id, course_id, 0, 0, self.clock.now())
        }))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on storage faults.
    pub async fn lecture_progress(
        &self,
        user_id: UserId,
        lecture_id: LectureId,
    ) -> Result<Option<LectureProgress>, ProgressServiceError> {
        Ok(self.progress.lecture_progress(user_id, lecture_id).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on storage faults.
    pub async fn course_lecture_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LectureProgress>, ProgressServiceError> {
        Ok(self
            .progress
            .course_lecture_progress(user_id, course_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::model::{Lecture, LectureKind, LectureStatus, Section, SectionId};
    use market_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn published_lectures(repo: &InMemoryRepository, course_id: CourseId, n: usize) -> Vec<LectureId> {
        let section = Section::new(SectionId::generate(), course_id, "Intro", 1).unwrap();
        (0..n)
            .map(|i| {
                let mut lecture = Lecture::new(
                    LectureId::generate(),
                    &section,
                    LectureKind::Video,
                    format!("L{i}"),
                    i64::try_from(i).unwrap(),
                )
                .unwrap();
                lecture.publish(fixed_now());
                let id = lecture.id;
                repo.add_lecture(lecture).unwrap();
                id
            })
            .collect()
    }

    #[tokio::test]
    async fn completing_lectures_moves_the_percentage() {
        let repo = Arc::new(InMemoryRepository::new());
        let course = CourseId::generate();
        let user = UserId::generate();
        let lectures = published_lectures(&repo, course, 4);
        let service = ProgressService::new(fixed_clock(), repo.clone());

        let first = service
            .record_progress(user, course, lectures[0], ProgressUpdate::completed())
            .await
            .unwrap();
        assert_eq!((first.percent, first.completed, first.total), (25, 1, 4));

        let second = service
            .record_progress(user, course, lectures[1], ProgressUpdate::at_position(42.0))
            .await
            .unwrap();
        assert_eq!(second.percent, 25);

        let stored = service.lecture_progress(user, lectures[1]).await.unwrap().unwrap();
        assert_eq!(stored.status, LectureStatus::InProgress);
        assert_eq!(stored.last_position_seconds, 42);
        assert_eq!(stored.completed_at, None);
    }

    #[tokio::test]
    async fn reopening_a_completed_lecture_keeps_its_completion_time() {
        let repo = Arc::new(InMemoryRepository::new());
        let course = CourseId::generate();
        let user = UserId::generate();
        let lectures = published_lectures(&repo, course, 1);

        let mut clock = fixed_clock();
        ProgressService::new(clock, repo.clone())
            .record_progress(user, course, lectures[0], ProgressUpdate::completed())
            .await
            .unwrap();

        clock.advance(chrono::Duration::hours(2));
        let summary = ProgressService::new(clock, repo.clone())
            .record_progress(
                user,
                course,
                lectures[0],
                ProgressUpdate {
                    status: Some(LectureStatus::InProgress),
                    last_position_seconds: Some(-10.0),
                    completed: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(summary.completed, 0);

        let row = repo.lecture_progress(user, lectures[0]).await.unwrap().unwrap();
        assert_eq!(row.status, LectureStatus::InProgress);
        assert_eq!(row.last_position_seconds, 0);
        assert_eq!(row.completed_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn missing_snapshot_reads_as_zero() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = ProgressService::new(fixed_clock(), repo);
        let snapshot = service
            .course_progress(UserId::generate(), CourseId::generate())
            .await
            .unwrap();
        assert_eq!(snapshot.percent, 0);
        assert_eq!(snapshot.total_lectures, 0);
    }
}
