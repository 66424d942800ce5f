use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Admission track a catalog row and a recommendation request belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdmissionTrack {
    /// Rolling admission, decided mostly on school-record grades.
    #[serde(rename = "susi", alias = "rolling")]
    Rolling,
    /// Standardized-exam admission, split into three application windows.
    #[serde(rename = "jungsi", alias = "jeongsi", alias = "examBased")]
    ExamBased,
}

impl AdmissionTrack {
    pub const fn ordered() -> [Self; 2] {
        [Self::Rolling, Self::ExamBased]
    }

    /// Key segment used by the catalog store.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Rolling => "susi",
            Self::ExamBased => "jungsi",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Rolling => "Rolling admission (susi)",
            Self::ExamBased => "Exam-based admission (jungsi)",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "susi" | "rolling" | "수시" => Some(Self::Rolling),
            "jungsi" | "jeongsi" | "exambased" | "exam" | "정시" => Some(Self::ExamBased),
            _ => None,
        }
    }
}

impl fmt::Display for AdmissionTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One of the three parallel exam-based application windows (가/나/다군).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubGroup {
    #[serde(rename = "ga", alias = "A", alias = "가")]
    Ga,
    #[serde(rename = "na", alias = "B", alias = "나")]
    Na,
    #[serde(rename = "da", alias = "C", alias = "다")]
    Da,
}

impl SubGroup {
    /// Fixed cycle order, also used when redistributing leftover candidates.
    pub const fn ordered() -> [Self; 3] {
        [Self::Ga, Self::Na, Self::Da]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Ga => "ga",
            Self::Na => "na",
            Self::Da => "da",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ga => "가군",
            Self::Na => "나군",
            Self::Da => "다군",
        }
    }

    /// Accepts wire names, the A/B/C letters, and the Korean group markers found
    /// in admission-type strings such as `정시(가군)`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "ga" | "a" => return Some(Self::Ga),
            "na" | "b" => return Some(Self::Na),
            "da" | "c" => return Some(Self::Da),
            _ => {}
        }

        if trimmed.contains('가') {
            Some(Self::Ga)
        } else if trimmed.contains('나') {
            Some(Self::Na)
        } else if trimmed.contains('다') {
            Some(Self::Da)
        } else {
            None
        }
    }
}

impl fmt::Display for SubGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-subject exam cutoffs published for exam-based rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCutoffs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub korean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub math: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inquiry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
}

impl SubjectCutoffs {
    pub fn is_empty(&self) -> bool {
        self.korean.is_none()
            && self.math.is_none()
            && self.english.is_none()
            && self.inquiry.is_none()
            && self.average.is_none()
    }
}

/// Normalized university/department/year row of the admission catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub university: String,
    pub department: String,
    pub track: AdmissionTrack,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_group: Option<SubGroup>,
    pub year: i32,
    pub cutoff_at_50pct: f64,
    pub cutoff_at_70pct: f64,
    pub recruitment_count: u32,
    pub competition_rate: f64,
    pub real_competition_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_scores: Option<SubjectCutoffs>,
}

impl CatalogEntry {
    pub fn entry_id(&self) -> String {
        format!("{}-{}", self.university, self.department)
    }

    /// The 70% cutoff when published, otherwise the 50% cutoff.
    pub fn primary_cutoff(&self) -> f64 {
        if self.cutoff_at_70pct > 0.0 {
            self.cutoff_at_70pct
        } else {
            self.cutoff_at_50pct
        }
    }

    pub fn has_usable_cutoff(&self) -> bool {
        self.cutoff_at_50pct > 0.0 || self.cutoff_at_70pct > 0.0
    }

    pub fn matches(&self, university: &str, department: &str) -> bool {
        self.university == university && self.department == department
    }
}

/// Single school-record grade as entered on the student's form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradeEntry {
    pub subject: String,
    pub term: String,
    /// 1..=9, where 0 means "not entered".
    pub grade: u8,
    /// Credit-hours; 0 means none were supplied.
    #[serde(default)]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<u8>,
}

impl RawGradeEntry {
    pub fn is_present(&self) -> bool {
        self.grade > 0
    }
}

/// Standardized-exam subjects a student can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExamSubject {
    Korean,
    Math,
    English,
    Inquiry1,
    Inquiry2,
    KoreanHistory,
    SecondLanguage,
}

impl ExamSubject {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Korean => "국어",
            Self::Math => "수학",
            Self::English => "영어",
            Self::Inquiry1 => "탐구1",
            Self::Inquiry2 => "탐구2",
            Self::KoreanHistory => "한국사",
            Self::SecondLanguage => "제2외국어",
        }
    }

    /// Only the five core subjects feed the exam average.
    pub const fn counts_toward_average(self) -> bool {
        matches!(
            self,
            Self::Korean | Self::Math | Self::English | Self::Inquiry1 | Self::Inquiry2
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSubjectScore {
    pub subject: ExamSubject,
    /// 1..=9, where 0 means "not entered".
    #[serde(default)]
    pub grade: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

impl ExamSubjectScore {
    pub fn is_present(&self) -> bool {
        self.grade > 0
    }
}

/// Scalar summary of a student's record; 0 means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub gpa_equivalent: f64,
    pub exam_average: f64,
}

impl StudentProfile {
    pub fn new(gpa_equivalent: f64, exam_average: f64) -> Self {
        Self {
            gpa_equivalent,
            exam_average,
        }
    }

    /// The summary value the given track is scored against.
    pub fn value_for(&self, track: AdmissionTrack) -> f64 {
        match track {
            AdmissionTrack::Rolling => self.gpa_equivalent,
            AdmissionTrack::ExamBased => self.exam_average,
        }
    }
}

/// Discretized admission likelihood bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
}

impl Tier {
    pub const fn ordered() -> [Self; 4] {
        [Self::S, Self::A, Self::B, Self::C]
    }

    /// Sort weight: S=4 down to C=1.
    pub const fn rank(self) -> u8 {
        match self {
            Self::S => 4,
            Self::A => 3,
            Self::B => 2,
            Self::C => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::S => "Safe",
            Self::A => "Appropriate",
            Self::B => "Bold",
            Self::C => "Reach",
        }
    }

    pub const fn korean_label(self) -> &'static str {
        match self {
            Self::S => "안전권",
            Self::A => "적정권",
            Self::B => "소신권",
            Self::C => "도전권",
        }
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Catalog entry enriched with its probability, tier, and trend window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub probability: u8,
    pub tier: Tier,
    pub recent_history: Vec<CatalogEntry>,
    /// Placed into a sub-group by the underfill policy rather than by its own group.
    #[serde(default)]
    pub redistributed: bool,
}

impl ScoredCandidate {
    pub fn tier_label(&self) -> &'static str {
        self.tier.korean_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_puts_safe_first() {
        let mut tiers = vec![Tier::B, Tier::S, Tier::C, Tier::A];
        tiers.sort_by(|a, b| b.cmp(a));
        assert_eq!(tiers, Tier::ordered().to_vec());
        assert!(Tier::S > Tier::A && Tier::A > Tier::B && Tier::B > Tier::C);
    }

    #[test]
    fn sub_group_parses_admission_type_strings() {
        assert_eq!(SubGroup::parse("정시(가군)"), Some(SubGroup::Ga));
        assert_eq!(SubGroup::parse("나"), Some(SubGroup::Na));
        assert_eq!(SubGroup::parse("DA"), Some(SubGroup::Da));
        assert_eq!(SubGroup::parse("B"), Some(SubGroup::Na));
        assert_eq!(SubGroup::parse("학생부종합전형"), None);
    }

    #[test]
    fn track_serializes_with_store_names() {
        let json = serde_json::to_string(&AdmissionTrack::ExamBased).expect("serializes");
        assert_eq!(json, "\"jungsi\"");
        let parsed: AdmissionTrack = serde_json::from_str("\"rolling\"").expect("alias parses");
        assert_eq!(parsed, AdmissionTrack::Rolling);
    }

    #[test]
    fn primary_cutoff_falls_back_to_fifty_percent() {
        let mut entry = CatalogEntry {
            university: "서울대학교".to_string(),
            department: "경영학과".to_string(),
            track: AdmissionTrack::Rolling,
            sub_group: None,
            year: 2024,
            cutoff_at_50pct: 1.2,
            cutoff_at_70pct: 1.5,
            recruitment_count: 30,
            competition_rate: 15.2,
            real_competition_rate: 15.2,
            region: None,
            category: None,
            admission_type: None,
            subject_scores: None,
        };
        assert_eq!(entry.primary_cutoff(), 1.5);
        entry.cutoff_at_70pct = 0.0;
        assert_eq!(entry.primary_cutoff(), 1.2);
        entry.cutoff_at_50pct = 0.0;
        assert!(!entry.has_usable_cutoff());
    }
}
