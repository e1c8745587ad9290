use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, CourseId, UserId};
use crate::model::user::PublicProfile;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course slug cannot be empty")]
    EmptySlug,

    #[error("price cannot be negative")]
    NegativePrice,

    #[error("invalid course status: {0}")]
    InvalidStatus(String),

    #[error("invalid course sort: {0}")]
    InvalidSort(String),
}

//
// ─── REFERENCES ────────────────────────────────────────────────────────────────
//

/// Compact user reference embedded in listings (instructor, review author).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

/// Instructor block on a course detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorRef {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Publication lifecycle of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Draft,
    Review,
    Published,
    Archived,
}

impl CourseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// # Errors
    ///
    /// Returns `CourseError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, CourseError> {
        match value {
            "draft" => Ok(Self::Draft),
            "review" => Ok(Self::Review),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(CourseError::InvalidStatus(other.to_owned())),
        }
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Full course record.
///
/// `rating_avg`, `rating_count` and `student_count` are derived caches that
/// the storage layer recomputes; callers never write them directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub instructor_id: UserId,
    pub category_id: Option<CategoryId>,
    pub level_id: Option<String>,
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub language: String,
    pub thumbnail_url: Option<String>,
    pub promo_video_url: Option<String>,
    pub currency: String,
    pub price_base: i64,
    pub price_current: i64,
    pub status: CourseStatus,
    pub rating_avg: f64,
    pub rating_count: u32,
    pub student_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Creates a draft course with zeroed aggregates.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the title or slug is blank.
    pub fn new(
        id: CourseId,
        instructor_id: UserId,
        title: impl Into<String>,
        slug: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        let slug = slug.into().trim().to_owned();
        if slug.is_empty() {
            return Err(CourseError::EmptySlug);
        }
        Ok(Self {
            id,
            instructor_id,
            category_id: None,
            level_id: None,
            title,
            slug,
            subtitle: None,
            description: None,
            language: "id".to_owned(),
            thumbnail_url: None,
            promo_video_url: None,
            currency: "IDR".to_owned(),
            price_base: 0,
            price_current: 0,
            status: CourseStatus::Draft,
            rating_avg: 0.0,
            rating_count: 0,
            student_count: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
        })
    }

    /// Marks the course published at `at`.
    pub fn publish(&mut self, at: DateTime<Utc>) {
        self.status = CourseStatus::Published;
        self.published_at = Some(at);
        self.updated_at = at;
    }

    /// # Errors
    ///
    /// Returns `CourseError::NegativePrice` if either price is below zero.
    pub fn set_price(&mut self, base: i64, current: i64) -> Result<(), CourseError> {
        if base < 0 || current < 0 {
            return Err(CourseError::NegativePrice);
        }
        self.price_base = base;
        self.price_current = current;
        Ok(())
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price_current == 0
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }
}

/// Course detail joined with instructor and category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: Option<InstructorRef>,
    pub category: Option<CategoryRef>,
}

/// Row of a course listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub thumbnail_url: Option<String>,
    pub promo_video_url: Option<String>,
    pub currency: String,
    pub price_current: i64,
    pub rating_avg: f64,
    pub rating_count: u32,
    pub student_count: u32,
    pub published_at: Option<DateTime<Utc>>,
    pub instructor: Option<UserRef>,
    pub category: Option<CategoryRef>,
}

//
// ─── LISTING FILTER ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseSort {
    #[default]
    Newest,
    Popular,
    Rating,
    PriceLow,
    PriceHigh,
}

impl CourseSort {
    /// # Errors
    ///
    /// Returns `CourseError::InvalidSort` for unknown values.
    pub fn parse(value: &str) -> Result<Self, CourseError> {
        match value {
            "newest" => Ok(Self::Newest),
            "popular" => Ok(Self::Popular),
            "rating" => Ok(Self::Rating),
            "price_low" => Ok(Self::PriceLow),
            "price_high" => Ok(Self::PriceHigh),
            other => Err(CourseError::InvalidSort(other.to_owned())),
        }
    }
}

/// Filters for `list_courses`. Unset fields do not constrain the listing;
/// `status` defaults to published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub q: Option<String>,
    pub category_id: Option<CategoryId>,
    pub instructor_id: Option<UserId>,
    pub level_id: Option<String>,
    pub status: Option<CourseStatus>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: CourseSort,
}

impl CourseFilter {
    #[must_use]
    pub fn published() -> Self {
        Self {
            status: Some(CourseStatus::Published),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn effective_status(&self) -> CourseStatus {
        self.status.unwrap_or(CourseStatus::Published)
    }

    /// Search text with surrounding whitespace removed; `None` when blank.
    #[must_use]
    pub fn search_text(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

//
// ─── CATEGORIES & TAGS ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTag {
    pub course_id: CourseId,
    pub tag: String,
}

//
// ─── INSTRUCTORS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorSummary {
    pub id: UserId,
    pub name: String,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub course_count: u32,
}

/// Course row as seen from the instructor's own dashboard (all statuses).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorCourse {
    pub id: CourseId,
    pub title: String,
    pub status: CourseStatus,
    pub student_count: u32,
    pub rating_avg: f64,
    pub rating_count: u32,
    pub price_current: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorDetail {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub courses: Vec<CourseSummary>,
    pub course_count: usize,
}
