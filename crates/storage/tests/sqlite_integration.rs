use chrono::Duration;
use market_core::model::{
    Category, CategoryId, Course, CourseFilter, CourseId, CourseReview, CourseSort, Enrollment,
    EnrollmentId, EnrollmentSource, Identifier, Lecture, LectureAsset, LectureAssetId,
    LectureId, LectureKind, LectureProgress, LectureStatus, PageRequest, Rating, ReviewId, Section, SectionId, User,
    UserId, UserStatus,
};
use market_core::time::fixed_now;
use storage::repository::{
    CatalogRepository, EnrollmentRepository, ProgressRepository, ReviewRepository, StorageError,
    UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:memdb_{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn user(email: &str) -> User {
    User {
        id: UserId::generate(),
        name: email.split('@').next().unwrap_or("user").to_owned(),
        username: None,
        email: email.to_owned(),
        avatar: None,
        bio: None,
        phone: None,
        location: None,
        status: UserStatus::Active,
        created_at: fixed_now(),
        updated_at: fixed_now(),
        last_login_at: None,
    }
}

async fn insert_user(repo: &SqliteRepository, email: &str) -> User {
    let u = user(email);
    repo.insert_user(&u, "hash", "student").await.unwrap();
    u
}

async fn published_course(repo: &SqliteRepository, instructor: &User, slug: &str) -> Course {
    let mut course = Course::new(CourseId::generate(), instructor.id, slug, slug, fixed_now())
        .unwrap();
    course.publish(fixed_now());
    repo.upsert_course(&course).await.unwrap();
    course
}

async fn add_lecture(repo: &SqliteRepository, section: &Section, order: i64, publish: bool) -> Lecture {
    let mut lecture = Lecture::new(
        LectureId::generate(),
        section,
        LectureKind::Video,
        format!("Lecture {order}"),
        order,
    )
    .unwrap();
    if publish {
        lecture.publish(fixed_now());
    }
    repo.upsert_lecture(&lecture).await.unwrap();
    lecture
}

fn progress(u: &User, lecture: &Lecture, completed: bool, minutes: i64) -> LectureProgress {
    let at = fixed_now() + Duration::minutes(minutes);
    LectureProgress {
        user_id: u.id,
        lecture_id: lecture.id,
        course_id: lecture.course_id,
        status: if completed {
            LectureStatus::Completed
        } else {
            LectureStatus::InProgress
        },
        last_position_seconds: 30,
        completed_at: completed.then_some(at),
        updated_at: at,
    }
}

fn review(u: &User, course: &Course, rating: i64, minutes: i64) -> CourseReview {
    let at = fixed_now() + Duration::minutes(minutes);
    CourseReview {
        id: ReviewId::generate(),
        course_id: course.id,
        user_id: u.id,
        rating: Rating::from_i64(rating),
        title: Some(format!("{rating} stars")),
        body: None,
        is_public: true,
        is_flagged: false,
        created_at: at,
        updated_at: at,
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = repo("migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn progress_snapshot_tracks_published_lectures() {
    let repo = repo("progress_snapshot").await;
    let owner = insert_user(&repo, "tutor@progress.io").await;
    let learner = insert_user(&repo, "learner@progress.io").await;
    let course = published_course(&repo, &owner, "progress-course").await;
    let section = Section::new(SectionId::generate(), course.id, "Intro", 1).unwrap();
    repo.upsert_section(&section).await.unwrap();

    let mut lectures = Vec::new();
    for order in 1..=4 {
        lectures.push(add_lecture(&repo, &section, order, true).await);
    }
    let draft = add_lecture(&repo, &section, 5, false).await;

    let snap = repo
        .apply_progress(&progress(&learner, &lectures[0], true, 1))
        .await
        .unwrap();
    assert_eq!((snap.percent, snap.completed_lectures, snap.total_lectures), (25, 1, 4));

    // a completed draft lecture is not counted
    let snap = repo
        .apply_progress(&progress(&learner, &draft, true, 2))
        .await
        .unwrap();
    assert_eq!((snap.percent, snap.completed_lectures), (25, 1));

    repo.apply_progress(&progress(&learner, &lectures[1], true, 3))
        .await
        .unwrap();
    let stored = repo
        .course_progress(learner.id, course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.percent, 50);
    assert_eq!(stored.updated_at, fixed_now() + Duration::minutes(3));

    let rows = repo
        .course_lecture_progress(learner.id, course.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn progress_never_clears_completed_at() {
    let repo = repo("progress_completed_at").await;
    let owner = insert_user(&repo, "tutor@keep.io").await;
    let learner = insert_user(&repo, "learner@keep.io").await;
    let course = published_course(&repo, &owner, "keep-course").await;
    let section = Section::new(SectionId::generate(), course.id, "Intro", 1).unwrap();
    repo.upsert_section(&section).await.unwrap();
    let lecture = add_lecture(&repo, &section, 1, true).await;

    repo.apply_progress(&progress(&learner, &lecture, true, 1))
        .await
        .unwrap();
    let snap = repo
        .apply_progress(&progress(&learner, &lecture, false, 5))
        .await
        .unwrap();

    let stored = repo
        .lecture_progress(learner.id, lecture.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LectureStatus::InProgress);
    assert_eq!(stored.completed_at, Some(fixed_now() + Duration::minutes(1)));
    assert_eq!(stored.updated_at, fixed_now() + Duration::minutes(5));
    assert_eq!(snap.completed_lectures, 0);
}

#[tokio::test]
async fn progress_upsert_takes_the_callers_course() {
    let repo = repo("progress_course_move").await;
    let owner = insert_user(&repo, "tutor@move.io").await;
    let learner = insert_user(&repo, "learner@move.io").await;
    let first = published_course(&repo, &owner, "move-first").await;
    let second = published_course(&repo, &owner, "move-second").await;
    let section = Section::new(SectionId::generate(), first.id, "Intro", 1).unwrap();
    repo.upsert_section(&section).await.unwrap();
    let lecture = add_lecture(&repo, &section, 1, true).await;

    repo.apply_progress(&progress(&learner, &lecture, false, 1))
        .await
        .unwrap();
    let mut moved = progress(&learner, &lecture, false, 2);
    moved.course_id = second.id;
    repo.apply_progress(&moved).await.unwrap();

    let stored = repo
        .lecture_progress(learner.id, lecture.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.course_id, second.id);
    assert!(
        repo.course_lecture_progress(learner.id, first.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        repo.course_lecture_progress(learner.id, second.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn asset_meta_is_stored_as_json() {
    let repo = repo("asset_meta").await;
    let owner = insert_user(&repo, "tutor@assets.io").await;
    let course = published_course(&repo, &owner, "asset-course").await;
    let section = Section::new(SectionId::generate(), course.id, "Intro", 1).unwrap();
    repo.upsert_section(&section).await.unwrap();
    let lecture = add_lecture(&repo, &section, 1, true).await;

    let with_meta = LectureAsset {
        id: LectureAssetId::generate(),
        lecture_id: lecture.id,
        asset_type: "video".into(),
        url: "https://cdn.test/a.mp4".into(),
        filename: Some("a.mp4".into()),
        size_bytes: Some(2048),
        meta: Some(serde_json::json!({"resolution": "720p", "captions": ["id", "en"]})),
    };
    let bare = LectureAsset {
        id: LectureAssetId::generate(),
        url: "https://cdn.test/b.pdf".into(),
        asset_type: "pdf".into(),
        filename: None,
        size_bytes: None,
        meta: None,
        ..with_meta.clone()
    };
    repo.insert_asset(&with_meta).await.unwrap();
    repo.insert_asset(&bare).await.unwrap();

    let assets = repo.lecture_assets(lecture.id).await.unwrap();
    assert_eq!(assets, vec![with_meta, bare]);
}

#[tokio::test]
async fn progress_with_zero_published_lectures_is_zero_percent() {
    let repo = repo("progress_zero").await;
    let owner = insert_user(&repo, "tutor@zero.io").await;
    let learner = insert_user(&repo, "learner@zero.io").await;
    let course = published_course(&repo, &owner, "zero-course").await;

    let snap = repo
        .recompute_course_progress(learner.id, course.id, fixed_now())
        .await
        .unwrap();
    assert_eq!((snap.percent, snap.total_lectures), (0, 0));
}

#[tokio::test]
async fn progress_for_unknown_lecture_is_rejected_atomically() {
    let repo = repo("progress_unknown").await;
    let owner = insert_user(&repo, "owner@unknown.io").await;
    let learner = insert_user(&repo, "learner@unknown.io").await;
    let course = published_course(&repo, &owner, "unknown-course").await;
    let section = Section::new(SectionId::generate(), course.id, "Intro", 1).unwrap();
    let ghost = Lecture::new(LectureId::generate(), &section, LectureKind::Video, "Ghost", 1)
        .unwrap();

    let err = repo
        .apply_progress(&progress(&learner, &ghost, true, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    assert!(
        repo.course_progress(learner.id, course.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn rating_aggregate_follows_public_reviews() {
    let repo = repo("rating_aggregate").await;
    let owner = insert_user(&repo, "owner@rating.io").await;
    let course = published_course(&repo, &owner, "rating-course").await;

    let mut last = None;
    for (i, rating) in [5, 4, 3].into_iter().enumerate() {
        let reviewer = insert_user(&repo, &format!("r{i}@rating.io")).await;
        last = Some(
            repo.apply_review(&review(&reviewer, &course, rating, i64::try_from(i).unwrap()))
                .await
                .unwrap(),
        );
    }
    let summary = last.unwrap();
    assert_eq!(summary.rating_count, 3);
    assert!((summary.rating_avg - 4.0).abs() < 1e-9);

    let cached = repo.course_rating(course.id).await.unwrap();
    assert_eq!(cached, summary);

    let page = repo
        .list_public_reviews(course.id, PageRequest::first(2))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].review.rating.value(), 3);
    assert!(page.items[0].author.is_some());
}

#[tokio::test]
async fn review_resubmission_overwrites_in_place() {
    let repo = repo("rating_resubmit").await;
    let owner = insert_user(&repo, "owner@resubmit.io").await;
    let reviewer = insert_user(&repo, "reviewer@resubmit.io").await;
    let course = published_course(&repo, &owner, "resubmit-course").await;

    let first = review(&reviewer, &course, 2, 0);
    repo.apply_review(&first).await.unwrap();
    let summary = repo
        .apply_review(&review(&reviewer, &course, 5, 10))
        .await
        .unwrap();

    assert_eq!(summary.rating_count, 1);
    assert!((summary.rating_avg - 5.0).abs() < 1e-9);
    let stored = repo.review_for(reviewer.id, course.id).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.created_at, first.created_at);
    assert_eq!(stored.updated_at, fixed_now() + Duration::minutes(10));
}

#[tokio::test]
async fn rating_of_unreviewed_course_is_zero() {
    let repo = repo("rating_zero").await;
    let owner = insert_user(&repo, "owner@rzero.io").await;
    let course = published_course(&repo, &owner, "rzero-course").await;

    let summary = repo
        .recompute_course_rating(course.id, fixed_now())
        .await
        .unwrap();
    assert_eq!(summary.rating_count, 0);
    assert!(summary.rating_avg.abs() < f64::EPSILON);
}

#[tokio::test]
async fn catalog_filters_sorts_and_resolves_identifiers() {
    let repo = repo("catalog_listing").await;
    let owner = insert_user(&repo, "owner@catalog.io").await;
    let category = Category {
        id: CategoryId::generate(),
        parent_id: None,
        name: "Programming".into(),
        slug: "programming".into(),
        sort_order: 1,
    };
    repo.upsert_category(&category).await.unwrap();

    let mut cheap = Course::new(CourseId::generate(), owner.id, "Rust basics", "rust-basics", fixed_now())
        .unwrap();
    cheap.category_id = Some(category.id);
    cheap.publish(fixed_now());
    repo.upsert_course(&cheap).await.unwrap();

    let mut pricey = Course::new(CourseId::generate(), owner.id, "Rust in production", "rust-prod", fixed_now())
        .unwrap();
    pricey.set_price(500_000, 400_000).unwrap();
    pricey.publish(fixed_now() + Duration::hours(1));
    repo.upsert_course(&pricey).await.unwrap();

    let draft = Course::new(CourseId::generate(), owner.id, "Rust drafts", "rust-draft", fixed_now())
        .unwrap();
    repo.upsert_course(&draft).await.unwrap();

    let all = repo
        .list_courses(&CourseFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.items[0].slug, "rust-prod");
    assert_eq!(all.items[0].instructor.as_ref().unwrap().name, owner.name);

    let by_price = repo
        .list_courses(
            &CourseFilter {
                sort: CourseSort::PriceLow,
                ..CourseFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_price.items[0].slug, "rust-basics");

    let in_category = repo
        .list_courses(
            &CourseFilter {
                category_id: Some(category.id),
                q: Some("basics".into()),
                ..CourseFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(in_category.total, 1);
    assert_eq!(in_category.items[0].category.as_ref().unwrap().slug, "programming");

    let by_slug = repo
        .course_detail(&Identifier::parse("rust-basics").unwrap())
        .await
        .unwrap()
        .unwrap();
    let by_id = repo
        .course_detail(&Identifier::parse(&cheap.id.to_string()).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_slug.course.id, by_id.course.id);
    assert_eq!(by_slug.category.unwrap().name, "Programming");

    let dup = Course::new(CourseId::generate(), owner.id, "Other", "rust-basics", fixed_now())
        .unwrap();
    assert!(matches!(
        repo.upsert_course(&dup).await.unwrap_err(),
        StorageError::Conflict
    ));

    let instructors = repo.instructors(PageRequest::default()).await.unwrap();
    assert_eq!(instructors.total, 1);
    assert_eq!(instructors.items[0].course_count, 2);
    assert_eq!(repo.instructor_courses(owner.id).await.unwrap().len(), 3);

    repo.add_tag(cheap.id, "rust").await.unwrap();
    repo.add_tag(cheap.id, "rust").await.unwrap();
    let tags = repo.course_tags(&[cheap.id, pricey.id]).await.unwrap();
    assert_eq!(tags.len(), 1);
}

#[tokio::test]
async fn enrollment_is_insert_if_absent_and_counts_students() {
    let repo = repo("enrollment_flow").await;
    let owner = insert_user(&repo, "owner@enroll.io").await;
    let learner = insert_user(&repo, "learner@enroll.io").await;
    let course = published_course(&repo, &owner, "enroll-course").await;

    let first = Enrollment::new(
        EnrollmentId::generate(),
        learner.id,
        course.id,
        EnrollmentSource::Free,
        fixed_now(),
    );
    let stored = repo.enroll(&first).await.unwrap();
    let again = Enrollment::new(
        EnrollmentId::generate(),
        learner.id,
        course.id,
        EnrollmentSource::Gift,
        fixed_now() + Duration::days(1),
    );
    let kept = repo.enroll(&again).await.unwrap();

    assert_eq!(kept.id, stored.id);
    assert_eq!(kept.source, EnrollmentSource::Free);
    let found = repo.find_course(&Identifier::Id(course.id.value())).await.unwrap().unwrap();
    assert_eq!(found.student_count, 1);

    let mine = repo
        .enrolled_courses(learner.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].slug, "enroll-course");
    assert_eq!(mine.items[0].progress_percent, 0);
}

#[tokio::test]
async fn users_are_unique_by_email_and_get_default_role() {
    let repo = repo("users_unique").await;
    let first = insert_user(&repo, "ada@users.io").await;

    let err = repo
        .insert_user(&user("ada@users.io"), "hash", "student")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    assert!(repo.email_exists("ada@users.io").await.unwrap());
    assert_eq!(repo.roles(first.id).await.unwrap(), vec!["student".to_owned()]);

    let creds = repo.credentials_by_email("ada@users.io").await.unwrap().unwrap();
    assert_eq!(creds.password_hash.as_deref(), Some("hash"));

    repo.touch_last_login(first.id, fixed_now()).await.unwrap();
    let reloaded = repo.get_user(first.id).await.unwrap();
    assert_eq!(reloaded.last_login_at, Some(fixed_now()));
}
