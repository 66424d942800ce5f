//! Applies the scorer, classifier, and trend grouper across a catalog and
//! orders the result into capped recommendation lists.

pub mod policy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{AdmissionTrack, CatalogEntry, ScoredCandidate, StudentProfile, SubGroup};
use super::history::HistoryIndex;
use super::scoring::{classify, ProbabilityScorer, ScoringConfig};

pub use policy::{compare_candidates, fill_underfilled_groups, sort_candidates};

/// Result-size and fill policy knobs for a ranking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankOptions {
    /// Cap of the single rolling-admission list.
    pub limit_total: usize,
    /// Cap of each exam-based sub-group list.
    pub sub_group_limit: usize,
    /// Redistribute leftover candidates into short sub-groups.
    pub fill_underfilled: bool,
    /// Only the newest row per university/department becomes a candidate.
    pub latest_year_only: bool,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            limit_total: 20,
            sub_group_limit: 5,
            fill_underfilled: true,
            latest_year_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubGroupRecommendations {
    pub ga: Vec<ScoredCandidate>,
    pub na: Vec<ScoredCandidate>,
    pub da: Vec<ScoredCandidate>,
}

impl SubGroupRecommendations {
    pub fn get(&self, group: SubGroup) -> &Vec<ScoredCandidate> {
        match group {
            SubGroup::Ga => &self.ga,
            SubGroup::Na => &self.na,
            SubGroup::Da => &self.da,
        }
    }

    pub fn get_mut(&mut self, group: SubGroup) -> &mut Vec<ScoredCandidate> {
        match group {
            SubGroup::Ga => &mut self.ga,
            SubGroup::Na => &mut self.na,
            SubGroup::Da => &mut self.da,
        }
    }

    pub fn len(&self) -> usize {
        self.ga.len() + self.na.len() + self.da.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Track-shaped ranking output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum RecommendationSet {
    Rolling { candidates: Vec<ScoredCandidate> },
    ExamBased { groups: SubGroupRecommendations },
}

impl RecommendationSet {
    pub fn empty(track: AdmissionTrack) -> Self {
        match track {
            AdmissionTrack::Rolling => Self::Rolling {
                candidates: Vec::new(),
            },
            AdmissionTrack::ExamBased => Self::ExamBased {
                groups: SubGroupRecommendations::default(),
            },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Rolling { candidates } => candidates.len(),
            Self::ExamBased { groups } => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ranking engine holding the scoring constants; cheap to share.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    scorer: ProbabilityScorer,
}

impl Ranker {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            scorer: ProbabilityScorer::new(config),
        }
    }

    pub fn scorer(&self) -> &ProbabilityScorer {
        &self.scorer
    }

    /// Scores every usable entry of the track and returns them sorted, uncapped.
    pub fn score_all(
        &self,
        catalog: &[CatalogEntry],
        profile: &StudentProfile,
        track: AdmissionTrack,
        options: &RankOptions,
    ) -> Vec<ScoredCandidate> {
        let student_value = profile.value_for(track);
        if student_value <= 0.0 {
            debug!(%track, "no student value for track; skipping ranking");
            return Vec::new();
        }

        let index = HistoryIndex::build(catalog);
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        let mut candidates: Vec<ScoredCandidate> = catalog
            .iter()
            .filter(|entry| entry.track == track && entry.has_usable_cutoff())
            .filter(|entry| {
                if !options.latest_year_only {
                    return true;
                }
                let is_latest = index
                    .latest(&entry.university, &entry.department)
                    .map(|latest| std::ptr::eq(latest, *entry))
                    .unwrap_or(true);
                is_latest && seen.insert((entry.university.as_str(), entry.department.as_str()))
            })
            .map(|entry| {
                let probability = self.scorer.score_entry(entry, student_value);
                ScoredCandidate {
                    entry: entry.clone(),
                    probability,
                    tier: classify(probability),
                    recent_history: index.recent(&entry.university, &entry.department),
                    redistributed: false,
                }
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates
    }

    /// Sorted candidates capped at `options.limit_total`.
    pub fn rank(
        &self,
        catalog: &[CatalogEntry],
        profile: &StudentProfile,
        track: AdmissionTrack,
        options: &RankOptions,
    ) -> Vec<ScoredCandidate> {
        let mut candidates = self.score_all(catalog, profile, track, options);
        candidates.truncate(options.limit_total);
        candidates
    }

    /// Exam-based candidates split into the three windows, each capped
    /// independently, then topped up by the underfill policy when enabled.
    pub fn rank_by_sub_group(
        &self,
        catalog: &[CatalogEntry],
        profile: &StudentProfile,
        options: &RankOptions,
    ) -> SubGroupRecommendations {
        let ranked = self.score_all(catalog, profile, AdmissionTrack::ExamBased, options);
        let limit = options.sub_group_limit;
        let mut groups = SubGroupRecommendations::default();
        let mut placed = vec![false; ranked.len()];

        for (position, candidate) in ranked.iter().enumerate() {
            if let Some(group) = candidate.entry.sub_group {
                let bucket = groups.get_mut(group);
                if bucket.len() < limit {
                    bucket.push(candidate.clone());
                    placed[position] = true;
                }
            }
        }

        if options.fill_underfilled {
            let moved = fill_underfilled_groups(&mut groups, &ranked, &placed, limit);
            if moved > 0 {
                debug!(moved, "redistributed leftover candidates into short sub-groups");
            }
        }

        groups
    }

    pub fn recommend(
        &self,
        catalog: &[CatalogEntry],
        profile: &StudentProfile,
        track: AdmissionTrack,
        options: &RankOptions,
    ) -> RecommendationSet {
        match track {
            AdmissionTrack::Rolling => RecommendationSet::Rolling {
                candidates: self.rank(catalog, profile, track, options),
            },
            AdmissionTrack::ExamBased => RecommendationSet::ExamBased {
                groups: self.rank_by_sub_group(catalog, profile, options),
            },
        }
    }
}

/// Ranks with the standard scoring constants.
pub fn rank(
    catalog: &[CatalogEntry],
    profile: &StudentProfile,
    track: AdmissionTrack,
    options: &RankOptions,
) -> Vec<ScoredCandidate> {
    Ranker::default().rank(catalog, profile, track, options)
}
