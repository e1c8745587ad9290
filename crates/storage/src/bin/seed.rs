use std::fmt;

use chrono::{DateTime, Duration, Utc};
use market_core::model::{
    Category, CategoryId, Course, CourseId, Lecture, LectureAsset, LectureAssetId, LectureId,
    LectureKind, Section, SectionId, User, UserId, UserStatus,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    courses: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidCourses { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCourses { raw } => write!(f, "invalid --courses value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("MARKET_DB_URL").unwrap_or_else(|_| "sqlite://market.sqlite3".into());
        let mut courses = std::env::var("MARKET_SEED_COURSES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(6);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--courses" => {
                    let value = require_value(&mut args, "--courses")?;
                    courses = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCourses { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            courses,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite URL (default: sqlite://market.sqlite3)");
    eprintln!("  --courses <n>         Number of demo courses to create (default: 6)");
    eprintln!("  --now <rfc3339>       Fixed current time for deterministic seeding");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  MARKET_DB_URL, MARKET_SEED_COURSES");
}

const TOPICS: [(&str, &str); 4] = [
    ("Programming", "programming"),
    ("Design", "design"),
    ("Business", "business"),
    ("Music", "music"),
];

const TITLES: [&str; 6] = [
    "Rust from Zero",
    "Practical SQL",
    "Figma Essentials",
    "Startup Finance 101",
    "Home Recording Basics",
    "Async Programming Deep Dive",
];

fn instructor(now: DateTime<Utc>) -> User {
    User {
        id: UserId::generate(),
        name: "Demo Instructor".into(),
        username: Some(format!("instructor-{}", now.timestamp())),
        email: format!("instructor+{}@market.local", now.timestamp()),
        avatar: None,
        bio: Some("Teaches the demo catalog.".into()),
        phone: None,
        location: None,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    // Seeded instructors have no password and cannot sign in.
    let owner = instructor(now);
    storage.users.insert_user(&owner, "", "instructor").await?;

    let mut categories = Vec::with_capacity(TOPICS.len());
    for (order, (name, slug)) in (0_i64..).zip(TOPICS) {
        let category = Category {
            id: CategoryId::generate(),
            parent_id: None,
            name: name.into(),
            slug: format!("{slug}-{}", now.timestamp()),
            sort_order: order,
        };
        storage.catalog.upsert_category(&category).await?;
        categories.push(category);
    }

    let mut lectures_created = 0_u32;
    for i in 0..args.courses {
        let idx = i as usize;
        let title = TITLES[idx % TITLES.len()];
        let published_at = now - Duration::days(i64::from(i));
        let mut course = Course::new(
            CourseId::generate(),
            owner.id,
            title,
            format!("{}-{}-{i}", slugify(title), now.timestamp()),
            published_at,
        )?;
        course.subtitle = Some(format!("Demo course #{}", i + 1));
        course.category_id = categories.get(idx % categories.len()).map(|c| c.id);
        // every third course is paid
        if i % 3 == 2 {
            course.set_price(249_000, 199_000)?;
        }
        course.publish(published_at);
        storage.catalog.upsert_course(&course).await?;
        storage.catalog.add_tag(course.id, "demo").await?;

        for s in 0..2_i64 {
            let section =
                Section::new(SectionId::generate(), course.id, format!("Part {}", s + 1), s)?;
            storage.catalog.upsert_section(&section).await?;

            for l in 0..3_i64 {
                let mut lecture = Lecture::new(
                    LectureId::generate(),
                    &section,
                    if l == 2 { LectureKind::Article } else { LectureKind::Video },
                    format!("Lesson {}.{}", s + 1, l + 1),
                    l,
                )?;
                lecture.duration_seconds = Some(300);
                lecture.is_preview = s == 0 && l == 0;
                lecture.publish(published_at);
                storage.catalog.upsert_lecture(&lecture).await?;
                storage
                    .catalog
                    .insert_asset(&LectureAsset {
                        id: LectureAssetId::generate(),
                        lecture_id: lecture.id,
                        asset_type: lecture.kind.as_str().into(),
                        url: format!("https://cdn.market.local/{}.bin", lecture.id),
                        filename: None,
                        size_bytes: None,
                        meta: Some(serde_json::json!({ "durationSeconds": 300 })),
                    })
                    .await?;
                lectures_created += 1;
            }
        }
    }

    println!(
        "Seeded {} courses ({} lectures) by {} into {}",
        args.courses, lectures_created, owner.email, args.db_url
    );

    Ok(())
}

fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
