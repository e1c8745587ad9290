use std::str::FromStr;

use market_core::model::{
    Category, CategoryRef, Course, CourseProgress, CourseReview, CourseStatus, CourseSummary,
    EnrolledCourse, Enrollment, EnrollmentSource, EnrollmentStatus, Identifier, InstructorRef,
    Lecture, LectureAsset, LectureKind, LectureProgress, LectureStatus, ParseIdError,
    PublishState, Rating, Section, User, UserRef, UserStatus,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors. Constraint violations get their own variants so
/// callers can tell a duplicate or a dangling reference from an outage.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(inner) if inner.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(inner) if inner.is_foreign_key_violation() => StorageError::NotFound,
        sqlx::Error::RowNotFound => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

/// `(id, slug)` bind pair for `WHERE id = ?1 OR slug = ?2` lookups; exactly
/// one side is `Some`.
pub(crate) fn identifier_binds(identifier: &Identifier) -> (Option<String>, Option<String>) {
    match identifier {
        Identifier::Id(id) => (Some(id.to_string()), None),
        Identifier::Slug(slug) => (None, Some(slug.clone())),
    }
}

fn parse_id<T>(raw: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = ParseIdError>,
{
    raw.parse::<T>().map_err(ser)
}

pub(crate) fn id_col<T>(row: &SqliteRow, col: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = ParseIdError>,
{
    let raw: String = row.try_get(col).map_err(ser)?;
    parse_id(&raw)
}

pub(crate) fn opt_id_col<T>(row: &SqliteRow, col: &str) -> Result<Option<T>, StorageError>
where
    T: FromStr<Err = ParseIdError>,
{
    row.try_get::<Option<String>, _>(col)
        .map_err(ser)?
        .as_deref()
        .map(parse_id)
        .transpose()
}

pub(crate) fn u32_col(row: &SqliteRow, col: &str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(col).map_err(ser)?;
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {col}: {v}")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn opt_u32_col(row: &SqliteRow, col: &str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(col)
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {col}: {v}")))
        })
        .transpose()
}

fn bool_col(row: &SqliteRow, col: &str) -> Result<bool, StorageError> {
    let v: i64 = row.try_get(col).map_err(ser)?;
    Ok(v != 0)
}

fn str_col(row: &SqliteRow, col: &str) -> Result<String, StorageError> {
    row.try_get(col).map_err(ser)
}

fn opt_str_col(row: &SqliteRow, col: &str) -> Result<Option<String>, StorageError> {
    row.try_get(col).map_err(ser)
}

// ─── Catalog ───────────────────────────────────────────────────────────────────

pub(crate) const COURSE_COLUMNS: &str = r"
    c.id, c.instructor_id, c.category_id, c.level_id, c.title, c.slug, c.subtitle,
    c.description, c.language, c.thumbnail_url, c.promo_video_url, c.currency,
    c.price_base, c.price_current, c.status, c.rating_avg, c.rating_count,
    c.student_count, c.created_at, c.updated_at, c.published_at
";

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Ok(Course {
        id: id_col(row, "id")?,
        instructor_id: id_col(row, "instructor_id")?,
        category_id: opt_id_col(row, "category_id")?,
        level_id: opt_str_col(row, "level_id")?,
        title: str_col(row, "title")?,
        slug: str_col(row, "slug")?,
        subtitle: opt_str_col(row, "subtitle")?,
        description: opt_str_col(row, "description")?,
        language: str_col(row, "language")?,
        thumbnail_url: opt_str_col(row, "thumbnail_url")?,
        promo_video_url: opt_str_col(row, "promo_video_url")?,
        currency: str_col(row, "currency")?,
        price_base: row.try_get("price_base").map_err(ser)?,
        price_current: row.try_get("price_current").map_err(ser)?,
        status: CourseStatus::parse(&str_col(row, "status")?).map_err(ser)?,
        rating_avg: row.try_get("rating_avg").map_err(ser)?,
        rating_count: u32_col(row, "rating_count")?,
        student_count: u32_col(row, "student_count")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
        published_at: row.try_get("published_at").map_err(ser)?,
    })
}

/// Instructor columns are expected as `instructor_name`, `instructor_avatar`
/// (and `instructor_bio` where requested); category columns as
/// `category_name`, `category_slug`. Left joins leave them NULL.
fn instructor_ref(row: &SqliteRow) -> Result<Option<UserRef>, StorageError> {
    let Some(name) = opt_str_col(row, "instructor_name")? else {
        return Ok(None);
    };
    Ok(Some(UserRef {
        id: id_col(row, "instructor_id")?,
        name,
        avatar: opt_str_col(row, "instructor_avatar")?,
    }))
}

fn category_ref(row: &SqliteRow) -> Result<Option<CategoryRef>, StorageError> {
    let (Some(id), Some(name), Some(slug)) = (
        opt_id_col(row, "category_id")?,
        opt_str_col(row, "category_name")?,
        opt_str_col(row, "category_slug")?,
    ) else {
        return Ok(None);
    };
    Ok(Some(CategoryRef { id, name, slug }))
}

pub(crate) fn map_course_detail_parts(
    row: &SqliteRow,
) -> Result<(Option<InstructorRef>, Option<CategoryRef>), StorageError> {
    let instructor = instructor_ref(row)?
        .map(|r| -> Result<InstructorRef, StorageError> {
            Ok(InstructorRef {
                id: r.id,
                name: r.name,
                avatar: r.avatar,
                bio: opt_str_col(row, "instructor_bio")?,
            })
        })
        .transpose()?;
    Ok((instructor, category_ref(row)?))
}

pub(crate) fn map_course_summary_row(row: &SqliteRow) -> Result<CourseSummary, StorageError> {
    Ok(CourseSummary {
        id: id_col(row, "id")?,
        title: str_col(row, "title")?,
        slug: str_col(row, "slug")?,
        subtitle: opt_str_col(row, "subtitle")?,
        thumbnail_url: opt_str_col(row, "thumbnail_url")?,
        promo_video_url: opt_str_col(row, "promo_video_url")?,
        currency: str_col(row, "currency")?,
        price_current: row.try_get("price_current").map_err(ser)?,
        rating_avg: row.try_get("rating_avg").map_err(ser)?,
        rating_count: u32_col(row, "rating_count")?,
        student_count: u32_col(row, "student_count")?,
        published_at: row.try_get("published_at").map_err(ser)?,
        instructor: instructor_ref(row)?,
        category: category_ref(row)?,
    })
}

pub(crate) fn map_category_row(row: &SqliteRow) -> Result<Category, StorageError> {
    Ok(Category {
        id: id_col(row, "id")?,
        parent_id: opt_id_col(row, "parent_id")?,
        name: str_col(row, "name")?,
        slug: str_col(row, "slug")?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
    })
}

pub(crate) fn map_section_row(row: &SqliteRow) -> Result<Section, StorageError> {
    Ok(Section {
        id: id_col(row, "id")?,
        course_id: id_col(row, "course_id")?,
        title: str_col(row, "title")?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
    })
}

pub(crate) fn map_lecture_row(row: &SqliteRow) -> Result<Lecture, StorageError> {
    Ok(Lecture {
        id: id_col(row, "id")?,
        course_id: id_col(row, "course_id")?,
        section_id: id_col(row, "section_id")?,
        kind: LectureKind::parse(&str_col(row, "kind")?).map_err(ser)?,
        title: str_col(row, "title")?,
        description: opt_str_col(row, "description")?,
        duration_seconds: opt_u32_col(row, "duration_seconds")?,
        is_preview: bool_col(row, "is_preview")?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
        status: PublishState::parse(&str_col(row, "status")?).map_err(ser)?,
        published_at: row.try_get("published_at").map_err(ser)?,
    })
}

pub(crate) fn map_asset_row(row: &SqliteRow) -> Result<LectureAsset, StorageError> {
    let size_bytes = row
        .try_get::<Option<i64>, _>("size_bytes")
        .map_err(ser)?
        .map(|v| u64::try_from(v).map_err(|_| StorageError::Serialization("size_bytes sign".into())))
        .transpose()?;
    let meta = opt_str_col(row, "meta_json")?
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| StorageError::Serialization(format!("meta_json: {e}")))
        })
        .transpose()?;
    Ok(LectureAsset {
        id: id_col(row, "id")?,
        lecture_id: id_col(row, "lecture_id")?,
        asset_type: str_col(row, "asset_type")?,
        url: str_col(row, "url")?,
        filename: opt_str_col(row, "filename")?,
        size_bytes,
        meta,
    })
}

// ─── Users ─────────────────────────────────────────────────────────────────────

pub(crate) const USER_COLUMNS: &str = r"
    u.id, u.name, u.username, u.email, u.avatar, u.bio, u.phone, u.location,
    u.status, u.created_at, u.updated_at, u.last_login_at
";

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: id_col(row, "id")?,
        name: str_col(row, "name")?,
        username: opt_str_col(row, "username")?,
        email: str_col(row, "email")?,
        avatar: opt_str_col(row, "avatar")?,
        bio: opt_str_col(row, "bio")?,
        phone: opt_str_col(row, "phone")?,
        location: opt_str_col(row, "location")?,
        status: UserStatus::parse(&str_col(row, "status")?).map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
        last_login_at: row.try_get("last_login_at").map_err(ser)?,
    })
}

// ─── Enrollment ────────────────────────────────────────────────────────────────

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment {
        id: id_col(row, "id")?,
        user_id: id_col(row, "user_id")?,
        course_id: id_col(row, "course_id")?,
        source: EnrollmentSource::parse(&str_col(row, "source")?).map_err(ser)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        access_expires_at: row.try_get("access_expires_at").map_err(ser)?,
        status: EnrollmentStatus::parse(&str_col(row, "status")?).map_err(ser)?,
    })
}

pub(crate) fn map_enrolled_course_row(row: &SqliteRow) -> Result<EnrolledCourse, StorageError> {
    let percent: i64 = row
        .try_get::<Option<i64>, _>("percent")
        .map_err(ser)?
        .unwrap_or(0);
    Ok(EnrolledCourse {
        enrollment_id: id_col(row, "id")?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        access_expires_at: row.try_get("access_expires_at").map_err(ser)?,
        status: EnrollmentStatus::parse(&str_col(row, "status")?).map_err(ser)?,
        course_id: id_col(row, "course_id")?,
        title: str_col(row, "title")?,
        slug: str_col(row, "slug")?,
        thumbnail_url: opt_str_col(row, "thumbnail_url")?,
        instructor: instructor_ref(row)?,
        progress_percent: u8::try_from(percent.clamp(0, 100)).unwrap_or(0),
    })
}

// ─── Progress & reviews ────────────────────────────────────────────────────────

pub(crate) fn map_lecture_progress_row(row: &SqliteRow) -> Result<LectureProgress, StorageError> {
    Ok(LectureProgress {
        user_id: id_col(row, "user_id")?,
        lecture_id: id_col(row, "lecture_id")?,
        course_id: id_col(row, "course_id")?,
        status: LectureStatus::parse(&str_col(row, "status")?).map_err(ser)?,
        last_position_seconds: u32_col(row, "last_position_seconds")?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_course_progress_row(row: &SqliteRow) -> Result<CourseProgress, StorageError> {
    let percent: i64 = row.try_get("percent").map_err(ser)?;
    Ok(CourseProgress {
        user_id: id_col(row, "user_id")?,
        course_id: id_col(row, "course_id")?,
        percent: u8::try_from(percent)
            .map_err(|_| StorageError::Serialization(format!("invalid percent: {percent}")))?,
        completed_lectures: u32_col(row, "completed_lectures")?,
        total_lectures: u32_col(row, "total_lectures")?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_review_row(row: &SqliteRow) -> Result<CourseReview, StorageError> {
    Ok(CourseReview {
        id: id_col(row, "id")?,
        course_id: id_col(row, "course_id")?,
        user_id: id_col(row, "user_id")?,
        rating: Rating::from_i64(row.try_get("rating").map_err(ser)?),
        title: opt_str_col(row, "title")?,
        body: opt_str_col(row, "body")?,
        is_public: bool_col(row, "is_public")?,
        is_flagged: bool_col(row, "is_flagged")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

/// Author reference from `author_name` / `author_avatar` join columns.
pub(crate) fn map_author(row: &SqliteRow) -> Result<Option<UserRef>, StorageError> {
    let Some(name) = opt_str_col(row, "author_name")? else {
        return Ok(None);
    };
    Ok(Some(UserRef {
        id: id_col(row, "user_id")?,
        name,
        avatar: opt_str_col(row, "author_avatar")?,
    }))
}
