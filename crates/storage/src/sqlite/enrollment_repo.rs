use market_core::model::{
    CourseId, EnrolledCourse, Enrollment, Page, PageRequest, UserId,
};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository,
    mapping::{db, map_enrolled_course_row, map_enrollment_row, ser, u32_from_i64},
};
use crate::repository::{EnrollmentRepository, StorageError};

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, source, enrolled_at, access_expires_at, status";

async fn recompute_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    course_id: CourseId,
) -> Result<u32, StorageError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollments WHERE course_id = ?1 AND status = 'active'",
    )
    .bind(course_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .map_err(db)?;

    sqlx::query("UPDATE courses SET student_count = ?2 WHERE id = ?1")
        .bind(course_id.to_string())
        .bind(count)
        .execute(&mut **tx)
        .await
        .map_err(db)?;

    u32_from_i64("student_count", count)
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO enrollments (
                id, user_id, course_id, source, enrolled_at, access_expires_at, status
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(enrollment.id.to_string())
        .bind(enrollment.user_id.to_string())
        .bind(enrollment.course_id.to_string())
        .bind(enrollment.source.as_str())
        .bind(enrollment.enrolled_at)
        .bind(enrollment.access_expires_at)
        .bind(enrollment.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = ?1 AND course_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(enrollment.user_id.to_string())
            .bind(enrollment.course_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;
        let stored = map_enrollment_row(&row)?;

        let students = recompute_in_tx(&mut tx, enrollment.course_id).await?;
        tx.commit().await.map_err(db)?;

        tracing::debug!(
            course_id = %enrollment.course_id,
            students,
            "student count recomputed"
        );
        Ok(stored)
    }

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = ?1 AND course_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn enrolled_courses(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<EnrolledCourse>, StorageError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let rows = sqlx::query(
            r"
            SELECT
                e.id, e.enrolled_at, e.access_expires_at, e.status, e.course_id,
                c.title, c.slug, c.thumbnail_url, c.instructor_id,
                u.name AS instructor_name, u.avatar AS instructor_avatar,
                cp.percent
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            LEFT JOIN users u ON u.id = c.instructor_id
            LEFT JOIN course_progress cp ON cp.user_id = e.user_id AND cp.course_id = e.course_id
            WHERE e.user_id = ?1
            ORDER BY e.enrolled_at DESC, e.id
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(user_id.to_string())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let items = rows
            .iter()
            .map(map_enrolled_course_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(page, u64::try_from(total).map_err(ser)?, items))
    }

    async fn recompute_student_count(&self, course_id: CourseId) -> Result<u32, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let count = recompute_in_tx(&mut tx, course_id).await?;
        tx.commit().await.map_err(db)?;
        Ok(count)
    }
}
