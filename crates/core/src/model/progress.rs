use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LectureId, UserId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("invalid lecture status: {0}")]
    InvalidStatus(String),
}

//
// ─── LECTURE STATUS ───────────────────────────────────────────────────────────
//

/// Per-user state of a single lecture.
///
/// Transitions are expected to move forward (`NotStarted` → `InProgress` →
/// `Completed`) but are not enforced; a completed lecture may be reported as
/// in progress again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LectureStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl LectureStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, ProgressError> {
        match value {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ProgressError::InvalidStatus(other.to_owned())),
        }
    }
}

//
// ─── PROGRESS UPDATE ──────────────────────────────────────────────────────────
//

/// Caller-supplied change to a lecture's progress.
///
/// Every field is optional; `resolve` turns it into the concrete values that
/// get persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub status: Option<LectureStatus>,
    /// Playback position; players report fractional seconds.
    pub last_position_seconds: Option<f64>,
    pub completed: Option<bool>,
}

/// Concrete values derived from a `ProgressUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProgress {
    pub status: LectureStatus,
    pub last_position_seconds: u32,
    /// `Some` only when this update marks the lecture completed. `None` means
    /// "keep whatever completion time is already stored".
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at_position(seconds: f64) -> Self {
        Self {
            last_position_seconds: Some(seconds),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_completion(&self) -> bool {
        self.completed == Some(true)
    }

    /// Resolve status, position and completion stamp at `now`.
    ///
    /// - `completed = true` forces `Completed` and stamps `now`.
    /// - otherwise the given status, defaulting to `InProgress`.
    /// - positions are floored into `0..=u32::MAX`; NaN reads as 0.
    #[must_use]
    pub fn resolve(&self, now: DateTime<Utc>) -> ResolvedProgress {
        let status = if self.is_completion() {
            LectureStatus::Completed
        } else {
            self.status.unwrap_or(LectureStatus::InProgress)
        };
        ResolvedProgress {
            status,
            last_position_seconds: position_seconds(self.last_position_seconds),
            completed_at: self.is_completion().then_some(now),
        }
    }
}

fn position_seconds(raw: Option<f64>) -> u32 {
    match raw {
        Some(value) if !value.is_nan() => {
            let floored = value.floor().clamp(0.0, f64::from(u32::MAX));
            // in range after the clamp
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let seconds = floored as u32;
            seconds
        }
        _ => 0,
    }
}

//
// ─── LECTURE PROGRESS ─────────────────────────────────────────────────────────
//

/// Stored progress of one user on one lecture, keyed by `(user_id, lecture_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgress {
    pub user_id: UserId,
    pub lecture_id: LectureId,
    pub course_id: CourseId,
    pub status: LectureStatus,
    pub last_position_seconds: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LectureProgress {
    /// Row to upsert for a resolved update.
    ///
    /// `completed_at` is `None` unless this update completes the lecture;
    /// repositories keep an earlier stored stamp in that case.
    #[must_use]
    pub fn from_update(
        user_id: UserId,
        course_id: CourseId,
        lecture_id: LectureId,
        resolved: ResolvedProgress,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            lecture_id,
            course_id,
            status: resolved.status,
            last_position_seconds: resolved.last_position_seconds,
            completed_at: resolved.completed_at,
            updated_at: now,
        }
    }
}

//
// ─── COURSE PROGRESS SNAPSHOT ─────────────────────────────────────────────────
//

/// Integer completion percentage, floored. Zero when the course has no
/// published lectures.
#[must_use]
pub fn completion_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = u64::from(completed.min(total)) * 100 / u64::from(total);
    u8::try_from(pct).unwrap_or(100)
}

/// Cached per-user course completion, derived from lecture progress rows and
/// the course's published lectures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub percent: u8,
    pub completed_lectures: u32,
    pub total_lectures: u32,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgress {
    #[must_use]
    pub fn from_counts(
        user_id: UserId,
        course_id: CourseId,
        completed: u32,
        total: u32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            course_id,
            percent: completion_percent(completed, total),
            completed_lectures: completed,
            total_lectures: total,
            updated_at,
        }
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            percent: self.percent,
            completed: self.completed_lectures,
            total: self.total_lectures,
        }
    }
}

/// `{percent, completed, total}` view returned to callers of the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub percent: u8,
    pub completed: u32,
    pub total: u32,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
