use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::SqliteInitError;

/// Role names seeded by the first migration.
pub const SEEDED_ROLES: [&str; 3] = ["student", "instructor", "admin"];

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            avatar TEXT,
            bio TEXT,
            phone TEXT,
            location TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'banned')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login_at TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            PRIMARY KEY (user_id, role_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            parent_id TEXT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            instructor_id TEXT NOT NULL,
            category_id TEXT,
            level_id TEXT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            subtitle TEXT,
            description TEXT,
            language TEXT NOT NULL,
            thumbnail_url TEXT,
            promo_video_url TEXT,
            currency TEXT NOT NULL,
            price_base INTEGER NOT NULL CHECK (price_base >= 0),
            price_current INTEGER NOT NULL CHECK (price_current >= 0),
            status TEXT NOT NULL CHECK (status IN ('draft', 'review', 'published', 'archived')),
            rating_avg REAL NOT NULL DEFAULT 0,
            rating_count INTEGER NOT NULL DEFAULT 0 CHECK (rating_count >= 0),
            student_count INTEGER NOT NULL DEFAULT 0 CHECK (student_count >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            published_at TEXT,
            FOREIGN KEY (instructor_id) REFERENCES users(id),
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_tags (
            course_id TEXT NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (course_id, tag),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS sections (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lectures (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            kind TEXT NOT NULL
                CHECK (kind IN ('video', 'article', 'quiz', 'assignment', 'resource', 'live')),
            title TEXT NOT NULL,
            description TEXT,
            duration_seconds INTEGER CHECK (duration_seconds >= 0),
            is_preview INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('draft', 'published')),
            published_at TEXT,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
            FOREIGN KEY (section_id) REFERENCES sections(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lecture_assets (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            asset_type TEXT NOT NULL,
            url TEXT NOT NULL,
            filename TEXT,
            size_bytes INTEGER CHECK (size_bytes >= 0),
            FOREIGN KEY (lecture_id) REFERENCES lectures(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            source TEXT NOT NULL
                CHECK (source IN ('purchase', 'free', 'coupon', 'gift', 'admin_grant')),
            enrolled_at TEXT NOT NULL,
            access_expires_at TEXT,
            status TEXT NOT NULL CHECK (status IN ('active', 'refunded', 'revoked')),
            UNIQUE (user_id, course_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lecture_progress (
            user_id TEXT NOT NULL,
            lecture_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('not_started', 'in_progress', 'completed')),
            last_position_seconds INTEGER NOT NULL DEFAULT 0 CHECK (last_position_seconds >= 0),
            completed_at TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, lecture_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (lecture_id) REFERENCES lectures(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_progress (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            percent INTEGER NOT NULL CHECK (percent BETWEEN 0 AND 100),
            completed_lectures INTEGER NOT NULL CHECK (completed_lectures >= 0),
            total_lectures INTEGER NOT NULL CHECK (total_lectures >= 0),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_reviews (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            title TEXT,
            body TEXT,
            is_public INTEGER NOT NULL DEFAULT 1,
            is_flagged INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_courses_status_published
            ON courses (status, published_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_courses_instructor ON courses (instructor_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_courses_category ON courses (category_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lectures_course_status ON lectures (course_id, status);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lecture_progress_user_course
            ON lecture_progress (user_id, course_id, status);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_course_reviews_course_public
            ON course_reviews (course_id, is_public, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_enrollments_course_status
            ON enrollments (course_id, status);
    ",
];

/// Brings the schema up to the latest version.
///
/// Versions already recorded in `schema_migrations` are skipped, so running
/// this on every startup is safe.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: marketplace schema plus default roles.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for &statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        for role in SEEDED_ROLES {
            sqlx::query("INSERT INTO roles (id, name) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING")
                .bind(Uuid::new_v4().to_string())
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    // Version 2: free-form asset metadata.
    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;
        sqlx::query("ALTER TABLE lecture_assets ADD COLUMN meta_json TEXT")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(2_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(version = 2, "applied schema migration");
    }

    Ok(())
}
