use market_core::model::{
    Category, CategoryId, Course, CourseDetail, CourseFilter, CourseId, CourseSort, CourseStatus,
    CourseSummary, CourseTag, Identifier, InstructorCourse, InstructorSummary, Lecture,
    LectureAsset, LectureId, Page, PageRequest, Section, UserId,
};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{
        COURSE_COLUMNS, db, id_col, identifier_binds, map_asset_row, map_category_row,
        map_course_detail_parts, map_course_row, map_course_summary_row, map_lecture_row,
        map_section_row, ser, u32_col,
    },
};
use crate::repository::{CatalogRepository, StorageError};

const COURSE_JOINS: &str = r"
    LEFT JOIN users u ON u.id = c.instructor_id
    LEFT JOIN categories cat ON cat.id = c.category_id
";

const JOINED_COLUMNS: &str = r"
    u.name AS instructor_name, u.avatar AS instructor_avatar, u.bio AS instructor_bio,
    cat.name AS category_name, cat.slug AS category_slug
";

/// Shared filter clause for course listings. Unset parameters bind NULL and
/// drop out of the predicate.
const LIST_FILTER: &str = r"
    WHERE c.status = ?1
      AND (?2 IS NULL OR c.title LIKE ?2 ESCAPE '\' OR c.subtitle LIKE ?2 ESCAPE '\')
      AND (?3 IS NULL OR c.category_id = ?3)
      AND (?4 IS NULL OR c.instructor_id = ?4)
      AND (?5 IS NULL OR c.level_id = ?5)
      AND (?6 IS NULL OR c.price_current >= ?6)
      AND (?7 IS NULL OR c.price_current <= ?7)
";

const LECTURE_COLUMNS: &str = r"
    id, course_id, section_id, kind, title, description, duration_seconds, is_preview,
    sort_order, status, published_at
";

fn order_by(sort: CourseSort) -> &'static str {
    match sort {
        CourseSort::Newest => "c.published_at DESC, c.created_at DESC, c.id",
        CourseSort::Popular => "c.student_count DESC, c.published_at DESC, c.id",
        CourseSort::Rating => "c.rating_avg DESC, c.rating_count DESC, c.id",
        CourseSort::PriceLow => "c.price_current ASC, c.published_at DESC, c.id",
        CourseSort::PriceHigh => "c.price_current DESC, c.published_at DESC, c.id",
    }
}

/// `%text%` with LIKE wildcards in the search text escaped.
fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_category(&self, category: &Category) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO categories (id, parent_id, name, slug, sort_order)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                name = excluded.name,
                slug = excluded.slug,
                sort_order = excluded.sort_order
            ",
        )
        .bind(category.id.to_string())
        .bind(category.parent_id.map(|p| p.to_string()))
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.sort_order)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (
                id, instructor_id, category_id, level_id, title, slug, subtitle, description,
                language, thumbnail_url, promo_video_url, currency, price_base, price_current,
                status, created_at, updated_at, published_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(id) DO UPDATE SET
                -- rating and student counters are owned by their recomputes
                instructor_id = excluded.instructor_id,
                category_id = excluded.category_id,
                level_id = excluded.level_id,
                title = excluded.title,
                slug = excluded.slug,
                subtitle = excluded.subtitle,
                description = excluded.description,
                language = excluded.language,
                thumbnail_url = excluded.thumbnail_url,
                promo_video_url = excluded.promo_video_url,
                currency = excluded.currency,
                price_base = excluded.price_base,
                price_current = excluded.price_current,
                status = excluded.status,
                updated_at = excluded.updated_at,
                published_at = excluded.published_at
            ",
        )
        .bind(course.id.to_string())
        .bind(course.instructor_id.to_string())
        .bind(course.category_id.map(|c| c.to_string()))
        .bind(course.level_id.as_deref())
        .bind(&course.title)
        .bind(&course.slug)
        .bind(course.subtitle.as_deref())
        .bind(course.description.as_deref())
        .bind(&course.language)
        .bind(course.thumbnail_url.as_deref())
        .bind(course.promo_video_url.as_deref())
        .bind(&course.currency)
        .bind(course.price_base)
        .bind(course.price_current)
        .bind(course.status.as_str())
        .bind(course.created_at)
        .bind(course.updated_at)
        .bind(course.published_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn upsert_section(&self, section: &Section) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sections (id, course_id, title, sort_order)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                sort_order = excluded.sort_order
            ",
        )
        .bind(section.id.to_string())
        .bind(section.course_id.to_string())
        .bind(&section.title)
        .bind(section.sort_order)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn upsert_lecture(&self, lecture: &Lecture) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lectures (
                id, course_id, section_id, kind, title, description, duration_seconds,
                is_preview, sort_order, status, published_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                section_id = excluded.section_id,
                kind = excluded.kind,
                title = excluded.title,
                description = excluded.description,
                duration_seconds = excluded.duration_seconds,
                is_preview = excluded.is_preview,
                sort_order = excluded.sort_order,
                status = excluded.status,
                published_at = excluded.published_at
            ",
        )
        .bind(lecture.id.to_string())
        .bind(lecture.course_id.to_string())
        .bind(lecture.section_id.to_string())
        .bind(lecture.kind.as_str())
        .bind(&lecture.title)
        .bind(lecture.description.as_deref())
        .bind(lecture.duration_seconds.map(i64::from))
        .bind(lecture.is_preview)
        .bind(lecture.sort_order)
        .bind(lecture.status.as_str())
        .bind(lecture.published_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn insert_asset(&self, asset: &LectureAsset) -> Result<(), StorageError> {
        let size = asset
            .size_bytes
            .map(i64::try_from)
            .transpose()
            .map_err(|_| StorageError::Serialization("size_bytes overflow".into()))?;
        let meta = asset.meta.as_ref().map(serde_json::Value::to_string);
        sqlx::query(
            r"
            INSERT INTO lecture_assets (
                id, lecture_id, asset_type, url, filename, size_bytes, meta_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(asset.id.to_string())
        .bind(asset.lecture_id.to_string())
        .bind(&asset.asset_type)
        .bind(&asset.url)
        .bind(asset.filename.as_deref())
        .bind(size)
        .bind(meta)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn add_tag(&self, course_id: CourseId, tag: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO course_tags (course_id, tag) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
        )
        .bind(course_id.to_string())
        .bind(tag.trim())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn list_courses(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<CourseSummary>, StorageError> {
        let status = filter.effective_status().as_str();
        let pattern = filter.search_text().map(like_pattern);
        let category = filter.category_id.map(|c| c.to_string());
        let instructor = filter.instructor_id.map(|u| u.to_string());

        let count_sql = format!("SELECT COUNT(*) FROM courses c {LIST_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(status)
            .bind(pattern.as_deref())
            .bind(category.as_deref())
            .bind(instructor.as_deref())
            .bind(filter.level_id.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let sql = format!(
            "SELECT {COURSE_COLUMNS}, {JOINED_COLUMNS} FROM courses c {COURSE_JOINS} \
             {LIST_FILTER} ORDER BY {} LIMIT ?8 OFFSET ?9",
            order_by(filter.sort)
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(pattern.as_deref())
            .bind(category.as_deref())
            .bind(instructor.as_deref())
            .bind(filter.level_id.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let items = rows
            .iter()
            .map(map_course_summary_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(page, u64::try_from(total).map_err(ser)?, items))
    }

    async fn find_course(&self, identifier: &Identifier) -> Result<Option<Course>, StorageError> {
        let (id, slug) = identifier_binds(identifier);
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ?1 OR c.slug = ?2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn course_detail(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<CourseDetail>, StorageError> {
        let (id, slug) = identifier_binds(identifier);
        let sql = format!(
            "SELECT {COURSE_COLUMNS}, {JOINED_COLUMNS} FROM courses c {COURSE_JOINS} \
             WHERE c.id = ?1 OR c.slug = ?2"
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
        else {
            return Ok(None);
        };
        let course = map_course_row(&row)?;
        let (instructor, category) = map_course_detail_parts(&row)?;
        Ok(Some(CourseDetail {
            course,
            instructor,
            category,
        }))
    }

    async fn course_tags(&self, course_ids: &[CourseId]) -> Result<Vec<CourseTag>, StorageError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT course_id, tag FROM course_tags WHERE course_id IN (");
        for i in 0..course_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(") ORDER BY course_id, tag");

        let mut q = sqlx::query(&sql);
        for id in course_ids {
            q = q.bind(id.to_string());
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db)?;

        rows.iter()
            .map(|row| {
                Ok(CourseTag {
                    course_id: id_col(row, "course_id")?,
                    tag: row.try_get("tag").map_err(ser)?,
                })
            })
            .collect()
    }

    async fn categories(&self, parent: Option<CategoryId>) -> Result<Vec<Category>, StorageError> {
        let rows = match parent {
            None => {
                sqlx::query(
                    r"
                    SELECT id, parent_id, name, slug, sort_order FROM categories
                    WHERE parent_id IS NULL
                    ORDER BY sort_order, name
                    ",
                )
                .fetch_all(&self.pool)
                .await
            }
            Some(parent) => {
                sqlx::query(
                    r"
                    SELECT id, parent_id, name, slug, sort_order FROM categories
                    WHERE parent_id = ?1
                    ORDER BY sort_order, name
                    ",
                )
                .bind(parent.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db)?;
        rows.iter().map(map_category_row).collect()
    }

    async fn find_category(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Category>, StorageError> {
        let (id, slug) = identifier_binds(identifier);
        let row = sqlx::query(
            "SELECT id, parent_id, name, slug, sort_order FROM categories WHERE id = ?1 OR slug = ?2",
        )
        .bind(id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_category_row).transpose()
    }

    async fn instructors(
        &self,
        page: PageRequest,
    ) -> Result<Page<InstructorSummary>, StorageError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT instructor_id) FROM courses WHERE status = 'published'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        let rows = sqlx::query(
            r"
            SELECT u.id, u.name, u.username, u.avatar, u.bio, COUNT(c.id) AS course_count
            FROM users u
            JOIN courses c ON c.instructor_id = u.id AND c.status = 'published'
            GROUP BY u.id
            ORDER BY course_count DESC, u.name, u.id
            LIMIT ?1 OFFSET ?2
            ",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(InstructorSummary {
                    id: id_col(row, "id")?,
                    name: row.try_get("name").map_err(ser)?,
                    username: row.try_get("username").map_err(ser)?,
                    avatar: row.try_get("avatar").map_err(ser)?,
                    bio: row.try_get("bio").map_err(ser)?,
                    course_count: u32_col(row, "course_count")?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Page::new(page, u64::try_from(total).map_err(ser)?, items))
    }

    async fn instructor_courses(
        &self,
        instructor_id: UserId,
    ) -> Result<Vec<InstructorCourse>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, status, student_count, rating_avg, rating_count, price_current,
                   updated_at
            FROM courses
            WHERE instructor_id = ?1
            ORDER BY updated_at DESC, id
            ",
        )
        .bind(instructor_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(ser)?;
                Ok(InstructorCourse {
                    id: id_col(row, "id")?,
                    title: row.try_get("title").map_err(ser)?,
                    status: CourseStatus::parse(&status).map_err(ser)?,
                    student_count: u32_col(row, "student_count")?,
                    rating_avg: row.try_get("rating_avg").map_err(ser)?,
                    rating_count: u32_col(row, "rating_count")?,
                    price_current: row.try_get("price_current").map_err(ser)?,
                    updated_at: row.try_get("updated_at").map_err(ser)?,
                })
            })
            .collect()
    }

    async fn sections(&self, course_id: CourseId) -> Result<Vec<Section>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, sort_order FROM sections
            WHERE course_id = ?1
            ORDER BY sort_order, id
            ",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_section_row).collect()
    }

    async fn lectures(&self, course_id: CourseId) -> Result<Vec<Lecture>, StorageError> {
        let sql = format!(
            "SELECT {LECTURE_COLUMNS} FROM lectures WHERE course_id = ?1 ORDER BY sort_order, id"
        );
        let rows = sqlx::query(&sql)
            .bind(course_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_lecture_row).collect()
    }

    async fn get_lecture(&self, lecture_id: LectureId) -> Result<Option<Lecture>, StorageError> {
        let sql = format!("SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(lecture_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_lecture_row).transpose()
    }

    async fn lecture_assets(
        &self,
        lecture_id: LectureId,
    ) -> Result<Vec<LectureAsset>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lecture_id, asset_type, url, filename, size_bytes, meta_json
            FROM lecture_assets
            WHERE lecture_id = ?1
            ORDER BY rowid
            ",
        )
        .bind(lecture_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_asset_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }
}
