use market_core::model::{
    Course, CourseId, Lecture, LectureAsset, LectureAssetId, LectureId, LectureKind,
    LectureStatus, PageRequest, ProgressUpdate, ReviewId, ReviewSubmission, Section, SectionId,
    User, UserId, UserStatus,
};
use market_core::time::fixed_now;
use services::{
    AccountServiceError, AppServices, Clock, EnrollmentServiceError,
};
use storage::repository::Storage;

struct Fixture {
    storage: Storage,
    services: AppServices,
    instructor: User,
}

async fn fixture(name: &str) -> Fixture {
    let url = format!("sqlite:file:memdb_{name}?mode=memory&cache=shared");
    let storage = Storage::sqlite(&url).await.expect("storage");
    let services = AppServices::from_storage(&storage, Clock::fixed(fixed_now()));

    let instructor = User {
        id: UserId::generate(),
        name: "Ibu Guru".into(),
        username: Some(format!("guru-{name}")),
        email: format!("guru@{name}.test"),
        avatar: None,
        bio: None,
        phone: None,
        location: None,
        status: UserStatus::Active,
        created_at: fixed_now(),
        updated_at: fixed_now(),
        last_login_at: None,
    };
    storage
        .users
        .insert_user(&instructor, "", "instructor")
        .await
        .unwrap();

    Fixture {
        storage,
        services,
        instructor,
    }
}

/// A published course with one section of `lectures` published lectures; the
/// first lecture is a free preview.
async fn course(fx: &Fixture, slug: &str, price: i64, lectures: i64) -> (Course, Vec<Lecture>) {
    let mut course =
        Course::new(CourseId::generate(), fx.instructor.id, slug, slug, fixed_now()).unwrap();
    course.set_price(price, price).unwrap();
    course.publish(fixed_now());
    fx.storage.catalog.upsert_course(&course).await.unwrap();

    let section = Section::new(SectionId::generate(), course.id, "Part 1", 1).unwrap();
    fx.storage.catalog.upsert_section(&section).await.unwrap();

    let mut created = Vec::new();
    for order in 0..lectures {
        let mut lecture = Lecture::new(
            LectureId::generate(),
            &section,
            LectureKind::Video,
            format!("Lesson {order}"),
            order,
        )
        .unwrap();
        lecture.is_preview = order == 0;
        lecture.publish(fixed_now());
        fx.storage.catalog.upsert_lecture(&lecture).await.unwrap();
        fx.storage
            .catalog
            .insert_asset(&LectureAsset {
                id: LectureAssetId::generate(),
                lecture_id: lecture.id,
                asset_type: "video".into(),
                url: format!("https://cdn.test/{}.mp4", lecture.id),
                filename: None,
                size_bytes: None,
                meta: None,
            })
            .await
            .unwrap();
        created.push(lecture);
    }
    (course, created)
}

#[tokio::test]
async fn register_then_sign_in() {
    let fx = fixture("svc_accounts").await;
    let accounts = fx.services.accounts();

    let user = accounts
        .register("Budi", "  Budi@Example.COM ", "hunter2hunter2", None)
        .await
        .unwrap();
    assert_eq!(user.email, "budi@example.com");
    assert!(accounts.check("budi@example.com").await.unwrap());
    assert!(!accounts.check("nobody@example.com").await.unwrap());

    let dup = accounts
        .register("Budi again", "budi@example.com", "hunter2hunter2", None)
        .await
        .unwrap_err();
    assert!(matches!(dup, AccountServiceError::EmailTaken));

    let wrong = accounts
        .authenticate("budi@example.com", "not-the-password")
        .await
        .unwrap_err();
    assert!(matches!(wrong, AccountServiceError::InvalidCredentials));

    let unknown = accounts
        .authenticate("ghost@example.com", "whatever1")
        .await
        .unwrap_err();
    assert!(matches!(unknown, AccountServiceError::UserNotFound));

    let signed_in = accounts
        .authenticate("budi@example.com", "hunter2hunter2")
        .await
        .unwrap();
    assert_eq!(signed_in.last_login_at, Some(fixed_now()));

    let profile = accounts.profile(user.id).await.unwrap();
    assert_eq!(profile.roles, vec!["student".to_owned()]);
    assert_eq!(profile.user.last_login_at, Some(fixed_now()));
}

#[tokio::test]
async fn seeded_instructor_cannot_sign_in() {
    let fx = fixture("svc_no_password").await;
    let err = fx
        .services
        .accounts()
        .authenticate(&fx.instructor.email, "anything-at-all")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountServiceError::InvalidCredentials));
}

#[tokio::test]
async fn free_enrollment_unlocks_lectures_and_tracks_progress() {
    let fx = fixture("svc_learning").await;
    let (course, lectures) = course(&fx, "free-course", 0, 4).await;
    let learner = fx
        .services
        .accounts()
        .register("Sari", "sari@example.com", "password123", None)
        .await
        .unwrap();

    let catalog = fx.services.catalog();
    let locked = catalog
        .lecture_detail(lectures[1].id, Some(learner.id))
        .await
        .unwrap();
    assert!(locked.locked);
    assert!(locked.assets.is_empty());

    let preview = catalog.lecture_detail(lectures[0].id, None).await.unwrap();
    assert!(!preview.locked);
    assert_eq!(preview.assets.len(), 1);

    let enrollments = fx.services.enrollments();
    let outcome = enrollments
        .self_enroll(learner.id, &course.slug)
        .await
        .unwrap();
    assert!(outcome.has_access);
    // enrolling twice keeps the first row
    let again = enrollments
        .self_enroll(learner.id, &course.id.to_string())
        .await
        .unwrap();
    assert_eq!(again.enrollment.id, outcome.enrollment.id);
    assert!(enrollments.is_enrolled(learner.id, &course.slug).await.unwrap());

    let detail = catalog.course_detail(&course.slug).await.unwrap();
    assert_eq!(detail.course.student_count, 1);

    let unlocked = catalog
        .lecture_detail(lectures[1].id, Some(learner.id))
        .await
        .unwrap();
    assert!(!unlocked.locked);
    assert_eq!(unlocked.prev_lecture.as_ref().map(|l| l.id), Some(lectures[0].id));
    assert_eq!(unlocked.next_lecture.as_ref().map(|l| l.id), Some(lectures[2].id));
    assert!(preview.prev_lecture.is_none());

    let progress = fx.services.progress();
    progress
        .record_progress(learner.id, course.id, lectures[0].id, ProgressUpdate::completed())
        .await
        .unwrap();
    let summary = progress
        .record_progress(learner.id, course.id, lectures[1].id, ProgressUpdate::at_position(90.0))
        .await
        .unwrap();
    assert_eq!((summary.percent, summary.completed, summary.total), (25, 1, 4));

    let curriculum = catalog.curriculum(&course.slug, Some(learner.id)).await.unwrap();
    assert_eq!(curriculum.lecture_count(), 4);
    assert_eq!(curriculum.sections[0].lecture_count, 4);
    assert_eq!(curriculum.course_progress.as_ref().map(|p| p.percent), Some(25));
    let second = &curriculum.sections[0].lectures[1];
    assert_eq!(
        second.progress.as_ref().map(|p| p.status),
        Some(LectureStatus::InProgress)
    );

    let mine = enrollments
        .my_courses(learner.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].progress_percent, 25);
}

#[tokio::test]
async fn paid_and_unknown_courses_refuse_self_enrollment() {
    let fx = fixture("svc_paid").await;
    let (paid, _) = course(&fx, "paid-course", 149_000, 1).await;
    let learner = UserId::generate();
    let enrollments = fx.services.enrollments();

    let err = enrollments.self_enroll(learner, &paid.slug).await.unwrap_err();
    assert!(matches!(err, EnrollmentServiceError::PaymentRequired));

    let err = enrollments
        .self_enroll(learner, "no-such-course")
        .await
        .unwrap_err();
    assert!(matches!(err, EnrollmentServiceError::CourseNotFound));

    let err = enrollments.require_access(learner, paid.id).await.unwrap_err();
    assert!(matches!(err, EnrollmentServiceError::NoAccess));
}

#[tokio::test]
async fn ratings_land_on_the_course() {
    let fx = fixture("svc_ratings").await;
    let (course, _) = course(&fx, "rated-course", 0, 1).await;
    let reviews = fx.services.reviews();

    let mut raters = Vec::new();
    for (i, rating) in [5.0, 4.0, 3.0].into_iter().enumerate() {
        let user = fx
            .services
            .accounts()
            .register("Rater", &format!("rater{i}@example.com"), "password123", None)
            .await
            .unwrap();
        reviews
            .rate_course(
                ReviewId::generate(),
                user.id,
                course.id,
                ReviewSubmission {
                    rating,
                    title: Some("Nice".into()),
                    body: None,
                },
            )
            .await
            .unwrap();
        raters.push(user);
    }

    let detail = fx.services.catalog().course_detail(&course.slug).await.unwrap();
    assert_eq!(detail.course.rating_count, 3);
    assert!((detail.course.rating_avg - 4.0).abs() < 1e-9);

    let listing = reviews
        .course_reviews(course.id, PageRequest::new(None, None, 10))
        .await
        .unwrap();
    assert_eq!(listing.total, 3);
    assert_eq!(
        listing.items[0].author.as_ref().map(|a| a.name.as_str()),
        Some("Rater")
    );

    // the first rater changes their mind
    let summary = reviews
        .rate_course(
            ReviewId::generate(),
            raters[0].id,
            course.id,
            ReviewSubmission {
                rating: 0.0,
                title: None,
                body: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(summary.rating_count, 3);
    assert!((summary.rating_avg - 8.0 / 3.0).abs() < 1e-9);
}
