use chrono::{DateTime, Utc};
use market_core::model::{CourseId, CourseProgress, LectureId, LectureProgress, UserId};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository,
    mapping::{db, map_course_progress_row, map_lecture_progress_row, u32_from_i64},
};
use crate::repository::{ProgressRepository, StorageError};

const LECTURE_PROGRESS_COLUMNS: &str = r"
    user_id, lecture_id, course_id, status, last_position_seconds, completed_at, updated_at
";

/// Counts published lectures and the user's completed rows among them, then
/// upserts the snapshot. Runs on the caller's transaction.
async fn recompute_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: UserId,
    course_id: CourseId,
    now: DateTime<Utc>,
) -> Result<CourseProgress, StorageError> {
    let total: i64 = sqlx::query_scalar(
        r"
            SELECT COUNT(*) FROM lectures
            WHERE course_id = ?1 AND status = 'published'
        ",
    )
    .bind(course_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .map_err(db)?;

    let completed: i64 = sqlx::query_scalar(
        r"
            SELECT COUNT(*)
            FROM lecture_progress lp
            JOIN lectures l ON l.id = lp.lecture_id
            WHERE lp.user_id = ?1
              AND lp.course_id = ?2
              AND lp.status = 'completed'
              AND l.course_id = ?2
              AND l.status = 'published'
        ",
    )
    .bind(user_id.to_string())
    .bind(course_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .map_err(db)?;

    let snapshot = CourseProgress::from_counts(
        user_id,
        course_id,
        u32_from_i64("completed_lectures", completed)?,
        u32_from_i64("total_lectures", total)?,
        now,
    );

    sqlx::query(
        r"
            INSERT INTO course_progress (
                user_id, course_id, percent, completed_lectures, total_lectures, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                percent = excluded.percent,
                completed_lectures = excluded.completed_lectures,
                total_lectures = excluded.total_lectures,
                updated_at = excluded.updated_at
        ",
    )
    .bind(user_id.to_string())
    .bind(course_id.to_string())
    .bind(i64::from(snapshot.percent))
    .bind(i64::from(snapshot.completed_lectures))
    .bind(i64::from(snapshot.total_lectures))
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db)?;

    Ok(snapshot)
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn apply_progress(
        &self,
        progress: &LectureProgress,
    ) -> Result<CourseProgress, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO lecture_progress (
                user_id, lecture_id, course_id, status, last_position_seconds,
                completed_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, lecture_id) DO UPDATE SET
                course_id = excluded.course_id,
                status = excluded.status,
                last_position_seconds = excluded.last_position_seconds,
                -- a stored completion time is never cleared
                completed_at = COALESCE(excluded.completed_at, lecture_progress.completed_at),
                updated_at = excluded.updated_at
            ",
        )
        .bind(progress.user_id.to_string())
        .bind(progress.lecture_id.to_string())
        .bind(progress.course_id.to_string())
        .bind(progress.status.as_str())
        .bind(i64::from(progress.last_position_seconds))
        .bind(progress.completed_at)
        .bind(progress.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let snapshot = recompute_in_tx(
            &mut tx,
            progress.user_id,
            progress.course_id,
            progress.updated_at,
        )
        .await?;

        tx.commit().await.map_err(db)?;
        Ok(snapshot)
    }

    async fn recompute_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgress, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let snapshot = recompute_in_tx(&mut tx, user_id, course_id, now).await?;
        tx.commit().await.map_err(db)?;
        Ok(snapshot)
    }

    async fn lecture_progress(
        &self,
        user_id: UserId,
        lecture_id: LectureId,
    ) -> Result<Option<LectureProgress>, StorageError> {
        let sql = format!(
            "SELECT {LECTURE_PROGRESS_COLUMNS} FROM lecture_progress \
             WHERE user_id = ?1 AND lecture_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(lecture_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_lecture_progress_row).transpose()
    }

    async fn course_lecture_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LectureProgress>, StorageError> {
        let sql = format!(
            "SELECT {LECTURE_PROGRESS_COLUMNS} FROM lecture_progress \
             WHERE user_id = ?1 AND course_id = ?2 ORDER BY updated_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(course_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_lecture_progress_row).collect()
    }

    async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, course_id, percent, completed_lectures, total_lectures, updated_at
                FROM course_progress
                WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_course_progress_row).transpose()
    }
}
