//! Admission chance estimation for Korean university applicants.
//!
//! Raw school-record grades and exam scores reduce to a [`StudentProfile`];
//! each catalog row is scored against it, bucketed into a tier, and ranked
//! into rolling or exam-based recommendation lists. The `catalog` module owns
//! uploads, storage keys, and cached result sets; `router` exposes it over HTTP.

pub mod catalog;
pub mod domain;
pub mod grades;
pub mod history;
pub mod ranking;
pub mod router;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use catalog::{
    AdminAuthority, AuthError, CatalogService, CatalogServiceError, KeyValueStore,
    RecommendationQuery, RecommendationResponse, SessionVerifier, SharedSecretAuthority,
    StoreError,
};
pub use domain::{
    AdmissionTrack, CatalogEntry, ExamSubject, ExamSubjectScore, RawGradeEntry, ScoredCandidate,
    StudentProfile, SubGroup, SubjectCutoffs, Tier,
};
pub use grades::{aggregate, exam_average, ProfileReport};
pub use history::group_history;
pub use ranking::{rank, RankOptions, Ranker, RecommendationSet, SubGroupRecommendations};
pub use router::admissions_router;
pub use scoring::{classify, score, ProbabilityScorer, ScoringConfig};
