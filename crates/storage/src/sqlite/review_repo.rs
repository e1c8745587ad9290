use chrono::{DateTime, Utc};
use market_core::model::{
    CourseId, CourseReview, Page, PageRequest, RatingSummary, ReviewListing, UserId,
};
use sqlx::{Row, Sqlite, Transaction};

use super::{
    SqliteRepository,
    mapping::{db, map_author, map_review_row, ser, u32_from_i64},
};
use crate::repository::{ReviewRepository, StorageError};

const REVIEW_COLUMNS: &str = r"
    r.id, r.course_id, r.user_id, r.rating, r.title, r.body, r.is_public, r.is_flagged,
    r.created_at, r.updated_at
";

/// Averages public reviews and writes the result onto the course row.
async fn recompute_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    course_id: CourseId,
    now: DateTime<Utc>,
) -> Result<RatingSummary, StorageError> {
    let row = sqlx::query(
        r"
            SELECT COUNT(*) AS rating_count, AVG(rating) AS rating_avg
            FROM course_reviews
            WHERE course_id = ?1 AND is_public = 1
        ",
    )
    .bind(course_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .map_err(db)?;

    let count: i64 = row.try_get("rating_count").map_err(ser)?;
    let avg: Option<f64> = row.try_get("rating_avg").map_err(ser)?;
    let summary = RatingSummary {
        rating_avg: if count == 0 { 0.0 } else { avg.unwrap_or(0.0) },
        rating_count: u32_from_i64("rating_count", count)?,
    };

    sqlx::query(
        r"
            UPDATE courses
            SET rating_avg = ?2, rating_count = ?3, updated_at = ?4
            WHERE id = ?1
        ",
    )
    .bind(course_id.to_string())
    .bind(summary.rating_avg)
    .bind(i64::from(summary.rating_count))
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db)?;

    Ok(summary)
}

#[async_trait::async_trait]
impl ReviewRepository for SqliteRepository {
    async fn apply_review(&self, review: &CourseReview) -> Result<RatingSummary, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO course_reviews (
                id, course_id, user_id, rating, title, body, is_public, is_flagged,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                -- id, created_at and moderation flags belong to the first submission
                rating = excluded.rating,
                title = excluded.title,
                body = excluded.body,
                updated_at = excluded.updated_at
            ",
        )
        .bind(review.id.to_string())
        .bind(review.course_id.to_string())
        .bind(review.user_id.to_string())
        .bind(i64::from(review.rating.value()))
        .bind(review.title.as_deref())
        .bind(review.body.as_deref())
        .bind(review.is_public)
        .bind(review.is_flagged)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let summary = recompute_in_tx(&mut tx, review.course_id, review.updated_at).await?;

        tx.commit().await.map_err(db)?;
        Ok(summary)
    }

    async fn recompute_course_rating(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<RatingSummary, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let summary = recompute_in_tx(&mut tx, course_id, now).await?;
        tx.commit().await.map_err(db)?;
        Ok(summary)
    }

    async fn review_for(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseReview>, StorageError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM course_reviews r \
             WHERE r.user_id = ?1 AND r.course_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_review_row).transpose()
    }

    async fn list_public_reviews(
        &self,
        course_id: CourseId,
        page: PageRequest,
    ) -> Result<Page<ReviewListing>, StorageError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM course_reviews WHERE course_id = ?1 AND is_public = 1",
        )
        .bind(course_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        let sql = format!(
            r"
            SELECT {REVIEW_COLUMNS}, u.name AS author_name, u.avatar AS author_avatar
            FROM course_reviews r
            LEFT JOIN users u ON u.id = r.user_id
            WHERE r.course_id = ?1 AND r.is_public = 1
            ORDER BY r.created_at DESC, r.id
            LIMIT ?2 OFFSET ?3
            "
        );
        let rows = sqlx::query(&sql)
            .bind(course_id.to_string())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(ReviewListing {
                review: map_review_row(row)?,
                author: map_author(row)?,
            });
        }
        let total = u64::try_from(total).map_err(ser)?;
        Ok(Page::new(page, total, items))
    }

    async fn course_rating(&self, course_id: CourseId) -> Result<RatingSummary, StorageError> {
        let row = sqlx::query("SELECT rating_avg, rating_count FROM courses WHERE id = ?1")
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        let count: i64 = row.try_get("rating_count").map_err(ser)?;
        Ok(RatingSummary {
            rating_avg: row.try_get("rating_avg").map_err(ser)?,
            rating_count: u32_from_i64("rating_count", count)?,
        })
    }
}
