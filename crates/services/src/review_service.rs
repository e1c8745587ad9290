use std::sync::Arc;

use market_core::{
    model::{
        CourseId, CourseReview, Page, PageRequest, Rating, RatingSummary, ReviewId,
        ReviewListing, ReviewSubmission, UserId,
    },
    time::Clock,
};
use storage::repository::ReviewRepository;

use crate::error::ReviewServiceError;

/// Blank review text is stored as absent.
fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Writes course reviews and keeps the course's cached rating in step.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    reviews: Arc<dyn ReviewRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(clock: Clock, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { clock, reviews }
    }

    /// Upsert the user's review of a course and return the recomputed
    /// rating aggregate.
    ///
    /// The rating is floored and clamped into `1..=5`. `review_id` only takes
    /// effect when the user has not reviewed this course before.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if the upsert or the recompute
    /// fails.
    pub async fn rate_course(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        course_id: CourseId,
        submission: ReviewSubmission,
    ) -> Result<RatingSummary, ReviewServiceError> {
        let now = self.clock.now();
        let review = CourseReview {
            id: review_id,
            course_id,
            user_id,
            rating: Rating::clamped(submission.rating),
            title: non_blank(submission.title),
            body: non_blank(submission.body),
            is_public: true,
            is_flagged: false,
            created_at: now,
            updated_at: now,
        };

        let summary = self.reviews.apply_review(&review).await?;
        tracing::debug!(
            user_id = %user_id,
            course_id = %course_id,
            rating = review.rating.value(),
            rating_avg = summary.rating_avg,
            rating_count = summary.rating_count,
            "course rating recomputed"
        );
        Ok(summary)
    }

    /// Public reviews of a course, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` on storage faults.
    pub async fn course_reviews(
        &self,
        course_id: CourseId,
        page: PageRequest,
    ) -> Result<Page<ReviewListing>, ReviewServiceError> {
        Ok(self.reviews.list_public_reviews(course_id, page).await?)
    }

    #[cfg(test)]
    async fn my_review(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseReview>, ReviewServiceError> {
        Ok(self.reviews.review_for(user_id, course_id).await?)
    }

    #[cfg(test)]
    async fn recompute(&self, course_id: CourseId) -> Result<RatingSummary, ReviewServiceError> {
        Ok(self
            .reviews
            .recompute_course_rating(course_id, self.clock.now())
            .await?)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
