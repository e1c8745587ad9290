use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LectureAssetId, LectureId, SectionId};
use crate::model::progress::{CourseProgress, LectureProgress};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("invalid lecture kind: {0}")]
    InvalidKind(String),

    #[error("invalid publish state: {0}")]
    InvalidPublishState(String),

    #[error("title cannot be empty")]
    EmptyTitle,
}

//
// ─── ENUMS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LectureKind {
    #[default]
    Video,
    Article,
    Quiz,
    Assignment,
    Resource,
    Live,
}

impl LectureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
            Self::Quiz => "quiz",
            Self::Assignment => "assignment",
            Self::Resource => "resource",
            Self::Live => "live",
        }
    }

    /// # Errors
    ///
    /// Returns `CurriculumError::InvalidKind` for unknown values.
    pub fn parse(value: &str) -> Result<Self, CurriculumError> {
        match value {
            "video" => Ok(Self::Video),
            "article" => Ok(Self::Article),
            "quiz" => Ok(Self::Quiz),
            "assignment" => Ok(Self::Assignment),
            "resource" => Ok(Self::Resource),
            "live" => Ok(Self::Live),
            other => Err(CurriculumError::InvalidKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    #[default]
    Draft,
    Published,
}

impl PublishState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    /// # Errors
    ///
    /// Returns `CurriculumError::InvalidPublishState` for unknown values.
    pub fn parse(value: &str) -> Result<Self, CurriculumError> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(CurriculumError::InvalidPublishState(other.to_owned())),
        }
    }
}

//
// ─── ENTITIES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub course_id: CourseId,
    pub title: String,
    pub sort_order: i64,
}

impl Section {
    /// # Errors
    ///
    /// Returns `CurriculumError::EmptyTitle` for a blank title.
    pub fn new(
        id: SectionId,
        course_id: CourseId,
        title: impl Into<String>,
        sort_order: i64,
    ) -> Result<Self, CurriculumError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CurriculumError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id,
            title,
            sort_order,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: LectureId,
    pub course_id: CourseId,
    pub section_id: SectionId,
    pub kind: LectureKind,
    pub title: String,
    pub description: Option<String>,
    pub duration_seconds: Option<u32>,
    pub is_preview: bool,
    pub sort_order: i64,
    pub status: PublishState,
    pub published_at: Option<DateTime<Utc>>,
}

impl Lecture {
    /// Creates a draft, non-preview lecture.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::EmptyTitle` for a blank title.
    pub fn new(
        id: LectureId,
        section: &Section,
        kind: LectureKind,
        title: impl Into<String>,
        sort_order: i64,
    ) -> Result<Self, CurriculumError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CurriculumError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id: section.course_id,
            section_id: section.id,
            kind,
            title,
            description: None,
            duration_seconds: None,
            is_preview: false,
            sort_order,
            status: PublishState::Draft,
            published_at: None,
        })
    }

    pub fn publish(&mut self, at: DateTime<Utc>) {
        self.status = PublishState::Published;
        self.published_at = Some(at);
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PublishState::Published
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureAsset {
    pub id: LectureAssetId,
    pub lecture_id: LectureId,
    pub asset_type: String,
    pub url: String,
    pub filename: Option<String>,
    pub size_bytes: Option<u64>,
    /// Free-form player metadata (resolution, captions, ...).
    pub meta: Option<serde_json::Value>,
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumLecture {
    #[serde(flatten)]
    pub lecture: Lecture,
    pub progress: Option<LectureProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSection {
    #[serde(flatten)]
    pub section: Section,
    pub lectures: Vec<CurriculumLecture>,
    pub lecture_count: u32,
    /// Sum of the listed lectures' `duration_seconds`.
    pub total_duration: u64,
}

/// Neighbouring lecture in curriculum order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureLink {
    pub id: LectureId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LectureKind,
}

impl From<&Lecture> for LectureLink {
    fn from(lecture: &Lecture) -> Self {
        Self {
            id: lecture.id,
            title: lecture.title.clone(),
            kind: lecture.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub course_id: CourseId,
    pub sections: Vec<CurriculumSection>,
    pub course_progress: Option<CourseProgress>,
}

impl Curriculum {
    /// Groups lectures under their sections.
    ///
    /// Sections and the lectures inside each are ordered by `sort_order`.
    /// Unpublished lectures and lectures whose section is not listed are
    /// dropped. `progress` is matched to lectures by id.
    #[must_use]
    pub fn assemble(
        course_id: CourseId,
        mut sections: Vec<Section>,
        lectures: Vec<Lecture>,
        progress: &[LectureProgress],
        course_progress: Option<CourseProgress>,
    ) -> Self {
        sections.sort_by_key(|s| s.sort_order);
        let mut grouped: Vec<CurriculumSection> = sections
            .into_iter()
            .map(|section| CurriculumSection {
                section,
                lectures: Vec::new(),
                lecture_count: 0,
                total_duration: 0,
            })
            .collect();

        for lecture in lectures.into_iter().filter(Lecture::is_published) {
            let Some(slot) = grouped
                .iter_mut()
                .find(|s| s.section.id == lecture.section_id)
            else {
                continue;
            };
            let progress = progress
                .iter()
                .find(|p| p.lecture_id == lecture.id)
                .cloned();
            slot.lectures.push(CurriculumLecture { lecture, progress });
        }

        for section in &mut grouped {
            section.lectures.sort_by_key(|l| l.lecture.sort_order);
            section.lecture_count = u32::try_from(section.lectures.len()).unwrap_or(u32::MAX);
            section.total_duration = section
                .lectures
                .iter()
                .filter_map(|l| l.lecture.duration_seconds)
                .map(u64::from)
                .sum();
        }

        Self {
            course_id,
            sections: grouped,
            course_progress,
        }
    }

    #[must_use]
    pub fn lecture_count(&self) -> usize {
        self.sections.iter().map(|s| s.lectures.len()).sum()
    }

    /// Previous and next lecture around `lecture_id`, crossing section
    /// boundaries. Both are `None` when the lecture is not listed.
    #[must_use]
    pub fn neighbours(&self, lecture_id: LectureId) -> (Option<LectureLink>, Option<LectureLink>) {
        let ordered: Vec<&Lecture> = self
            .sections
            .iter()
            .flat_map(|s| s.lectures.iter().map(|l| &l.lecture))
            .collect();
        let Some(at) = ordered.iter().position(|l| l.id == lecture_id) else {
            return (None, None);
        };
        let prev = at.checked_sub(1).and_then(|i| ordered.get(i));
        let next = ordered.get(at + 1);
        (
            prev.map(|l| LectureLink::from(*l)),
            next.map(|l| LectureLink::from(*l)),
        )
    }
}

/// A single lecture as served to a viewer.
///
/// When `locked` is set the lecture is neither a preview nor covered by the
/// viewer's access, and `assets` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureDetail {
    #[serde(flatten)]
    pub lecture: Lecture,
    pub assets: Vec<LectureAsset>,
    pub locked: bool,
    pub progress: Option<LectureProgress>,
    pub prev_lecture: Option<LectureLink>,
    pub next_lecture: Option<LectureLink>,
}

impl LectureDetail {
    #[must_use]
    pub fn new(
        lecture: Lecture,
        assets: Vec<LectureAsset>,
        has_access: bool,
        progress: Option<LectureProgress>,
    ) -> Self {
        let locked = !lecture.is_preview && !has_access;
        Self {
            lecture,
            assets: if locked { Vec::new() } else { assets },
            locked,
            progress,
            prev_lecture: None,
            next_lecture: None,
        }
    }

    #[must_use]
    pub fn with_neighbours(
        mut self,
        (prev, next): (Option<LectureLink>, Option<LectureLink>),
    ) -> Self {
        self.prev_lecture = prev;
        self.next_lecture = next;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::UserId;
    use crate::model::progress::LectureStatus;
    use crate::time::fixed_now;

    fn section(course: CourseId, title: &str, order: i64) -> Section {
        Section::new(SectionId::generate(), course, title, order).unwrap()
    }

    fn published(section: &Section, title: &str, order: i64) -> Lecture {
        let mut lecture =
            Lecture::new(LectureId::generate(), section, LectureKind::Video, title, order).unwrap();
        lecture.publish(fixed_now());
        lecture
    }

    #[test]
    fn assemble_orders_sections_and_lectures() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let advanced = section(course, "Advanced", 2);
        let lectures = vec![
            published(&advanced, "Traits", 2),
            published(&intro, "Setup", 2),
            published(&intro, "Welcome", 1),
            published(&advanced, "Lifetimes", 1),
        ];

        let curriculum =
            Curriculum::assemble(course, vec![advanced, intro], lectures, &[], None);

        let titles: Vec<Vec<&str>> = curriculum
            .sections
            .iter()
            .map(|s| s.lectures.iter().map(|l| l.lecture.title.as_str()).collect())
            .collect();
        assert_eq!(curriculum.sections[0].section.title, "Intro");
        assert_eq!(titles, vec![vec!["Welcome", "Setup"], vec!["Lifetimes", "Traits"]]);
        assert_eq!(curriculum.lecture_count(), 4);
    }

    #[test]
    fn assemble_drops_unpublished_lectures() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let draft =
            Lecture::new(LectureId::generate(), &intro, LectureKind::Article, "Draft", 1).unwrap();
        let live = published(&intro, "Live", 2);

        let curriculum = Curriculum::assemble(course, vec![intro], vec![draft, live], &[], None);

        assert_eq!(curriculum.lecture_count(), 1);
        assert_eq!(curriculum.sections[0].lectures[0].lecture.title, "Live");
    }

    #[test]
    fn assemble_attaches_progress_by_lecture() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let lecture = published(&intro, "Welcome", 1);
        let progress = LectureProgress {
            user_id: UserId::generate(),
            lecture_id: lecture.id,
            course_id: course,
            status: LectureStatus::Completed,
            last_position_seconds: 0,
            completed_at: Some(fixed_now()),
            updated_at: fixed_now(),
        };

        let curriculum =
            Curriculum::assemble(course, vec![intro], vec![lecture], &[progress.clone()], None);

        assert_eq!(curriculum.sections[0].lectures[0].progress, Some(progress));
    }

    #[test]
    fn locked_lecture_hides_assets() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let lecture = published(&intro, "Welcome", 1);
        let asset = LectureAsset {
            id: LectureAssetId::generate(),
            lecture_id: lecture.id,
            asset_type: "video".into(),
            url: "https://cdn.example/v.mp4".into(),
            filename: None,
            size_bytes: None,
            meta: None,
        };

        let locked = LectureDetail::new(lecture.clone(), vec![asset.clone()], false, None);
        assert!(locked.locked);
        assert!(locked.assets.is_empty());

        let open = LectureDetail::new(lecture.clone(), vec![asset.clone()], true, None);
        assert!(!open.locked);
        assert_eq!(open.assets.len(), 1);

        let mut preview = lecture;
        preview.is_preview = true;
        let preview = LectureDetail::new(preview, vec![asset], false, None);
        assert!(!preview.locked);
    }

    #[test]
    fn sections_report_count_and_duration() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let empty = section(course, "Later", 2);
        let mut welcome = published(&intro, "Welcome", 1);
        welcome.duration_seconds = Some(120);
        let mut setup = published(&intro, "Setup", 2);
        setup.duration_seconds = Some(300);
        let reading = published(&intro, "Reading", 3);

        let curriculum = Curriculum::assemble(
            course,
            vec![intro, empty],
            vec![welcome, setup, reading],
            &[],
            None,
        );

        assert_eq!(curriculum.sections[0].lecture_count, 3);
        assert_eq!(curriculum.sections[0].total_duration, 420);
        assert_eq!(curriculum.sections[1].lecture_count, 0);
        assert_eq!(curriculum.sections[1].total_duration, 0);

        let json = serde_json::to_value(&curriculum.sections[0]).unwrap();
        assert_eq!(json["lectureCount"], 3);
        assert_eq!(json["totalDuration"], 420);
    }

    #[test]
    fn neighbours_cross_sections() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let advanced = section(course, "Advanced", 2);
        let welcome = published(&intro, "Welcome", 1);
        let setup = published(&intro, "Setup", 2);
        let traits = published(&advanced, "Traits", 1);
        let ids = (welcome.id, setup.id, traits.id);

        let curriculum = Curriculum::assemble(
            course,
            vec![advanced, intro],
            vec![traits, setup, welcome],
            &[],
            None,
        );

        let (prev, next) = curriculum.neighbours(ids.1);
        assert_eq!(prev.map(|l| l.id), Some(ids.0));
        assert_eq!(next.map(|l| l.title), Some("Traits".to_owned()));

        let (prev, next) = curriculum.neighbours(ids.0);
        assert!(prev.is_none());
        assert_eq!(next.map(|l| l.id), Some(ids.1));

        let (prev, next) = curriculum.neighbours(ids.2);
        assert_eq!(prev.map(|l| l.id), Some(ids.1));
        assert!(next.is_none());

        assert_eq!(curriculum.neighbours(LectureId::generate()), (None, None));
    }

    #[test]
    fn lecture_links_serialize_kind_as_type() {
        let course = CourseId::generate();
        let intro = section(course, "Intro", 1);
        let lecture = published(&intro, "Welcome", 1);
        let detail = LectureDetail::new(lecture.clone(), Vec::new(), true, None)
            .with_neighbours((None, Some(LectureLink::from(&lecture))));

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["prevLecture"], serde_json::Value::Null);
        assert_eq!(json["nextLecture"]["type"], "video");
        assert_eq!(json["nextLecture"]["title"], "Welcome");
    }

    #[test]
    fn kinds_parse() {
        assert_eq!(LectureKind::parse("live").unwrap(), LectureKind::Live);
        assert!(LectureKind::parse("podcast").is_err());
    }
}
