use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::course::UserRef;
use crate::model::ids::{CourseId, ReviewId, UserId};

//
// ─── RATING ───────────────────────────────────────────────────────────────────
//

/// Star rating in `1..=5`.
///
/// Out-of-range input is coerced rather than rejected: the value is floored
/// and then clamped into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Floors and clamps an arbitrary number into a valid rating.
    ///
    /// NaN maps to the minimum; infinities map to the nearest bound.
    #[must_use]
    pub fn clamped(raw: f64) -> Self {
        if raw.is_nan() {
            return Self(Self::MIN);
        }
        let floored = raw.floor().clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        // in range 1..=5 after the clamp
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = floored as u8;
        Self(value)
    }

    /// Same coercion for integer input.
    #[must_use]
    pub fn from_i64(raw: i64) -> Self {
        let clamped = raw.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        Self(u8::try_from(clamped).unwrap_or(Self::MIN))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

//
// ─── COURSE REVIEW ────────────────────────────────────────────────────────────
//

/// A user's review of a course. At most one per `(user_id, course_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReview {
    pub id: ReviewId,
    pub course_id: CourseId,
    pub user_id: UserId,
    pub rating: Rating,
    pub title: Option<String>,
    pub body: Option<String>,
    pub is_public: bool,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review enriched with its author for public listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListing {
    #[serde(flatten)]
    pub review: CourseReview,
    pub author: Option<UserRef>,
}

/// Incoming review body as submitted by a user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewSubmission {
    pub rating: f64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

//
// ─── RATING SUMMARY ───────────────────────────────────────────────────────────
//

/// Aggregate of a course's public reviews, cached on the course record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub rating_avg: f64,
    pub rating_count: u32,
}

impl RatingSummary {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rating_avg: 0.0,
            rating_count: 0,
        }
    }

    /// Mean of the given ratings; zero when there are none.
    #[must_use]
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Rating>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0_u64, 0_u32), |(sum, count), r| {
                (sum + u64::from(r.value()), count + 1)
            });
        if count == 0 {
            return Self::empty();
        }
        #[allow(clippy::cast_precision_loss)]
        let avg = sum as f64 / f64::from(count);
        Self {
            rating_avg: avg,
            rating_count: count,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_ratings_are_coerced() {
        assert_eq!(Rating::clamped(0.0).value(), 1);
        assert_eq!(Rating::clamped(-5.0).value(), 1);
        assert_eq!(Rating::clamped(8.0).value(), 5);
        assert_eq!(Rating::from_i64(0).value(), 1);
        assert_eq!(Rating::from_i64(-5).value(), 1);
        assert_eq!(Rating::from_i64(8).value(), 5);
    }

    #[test]
    fn fractional_ratings_are_floored() {
        assert_eq!(Rating::clamped(4.9).value(), 4);
        assert_eq!(Rating::clamped(1.2).value(), 1);
        assert_eq!(Rating::clamped(5.0).value(), 5);
    }

    #[test]
    fn non_finite_ratings_are_coerced() {
        assert_eq!(Rating::clamped(f64::NAN).value(), 1);
        assert_eq!(Rating::clamped(f64::INFINITY).value(), 5);
        assert_eq!(Rating::clamped(f64::NEG_INFINITY).value(), 1);
    }

    #[test]
    fn summary_of_no_reviews_is_zero() {
        let summary = RatingSummary::from_ratings(std::iter::empty());
        assert_eq!(summary, RatingSummary::empty());
    }

    #[test]
    fn summary_averages_ratings() {
        let summary = RatingSummary::from_ratings([5, 4, 3].map(Rating::from_i64));
        assert_eq!(summary.rating_count, 3);
        assert!((summary.rating_avg - 4.0).abs() < f64::EPSILON);
    }
}
