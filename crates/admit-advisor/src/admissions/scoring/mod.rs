mod config;
pub mod tier;

pub use config::{
    CompetitionSource, ProbabilityStep, RecruitmentBonus, ScoringConfig, ScoringConfigError,
    TrackCurve,
};
pub use tier::classify;

use super::domain::{AdmissionTrack, CatalogEntry};

/// Stateless scorer applying a [`ScoringConfig`] to a student value and a cutoff.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityScorer {
    config: ScoringConfig,
}

impl ProbabilityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Bounded probability in `[floor, ceiling]` of the track, or the neutral
    /// default when either the student value or the cutoff is missing. Lower
    /// grade numbers are better, so a negative diff favors the student.
    pub fn score(
        &self,
        track: AdmissionTrack,
        student_value: f64,
        target_cutoff: f64,
        competition_rate: f64,
        recruitment_count: u32,
    ) -> u8 {
        if student_value <= 0.0 || target_cutoff <= 0.0 {
            return self.config.neutral_default;
        }

        let curve = self.config.curve(track);
        let diff = student_value - target_cutoff;
        let base = curve.base_probability(diff);

        let competition_factor = (competition_rate.max(0.0) / curve.competition_normalizer).min(1.0);
        let mut adjusted = base * (1.0 - competition_factor * curve.dampening);

        if let Some(bonus) = curve.recruitment_bonus {
            if recruitment_count > bonus.above {
                adjusted += bonus.bonus;
            }
        }

        adjusted.clamp(curve.floor, curve.ceiling).round() as u8
    }

    /// Scores an entry against the student's value using the entry's primary
    /// cutoff and the competition figure the track is penalized by.
    pub fn score_entry(&self, entry: &CatalogEntry, student_value: f64) -> u8 {
        let curve = self.config.curve(entry.track);
        let competition = match curve.competition_source {
            CompetitionSource::Nominal => entry.competition_rate,
            CompetitionSource::Real => entry.real_competition_rate,
        };
        self.score(
            entry.track,
            student_value,
            entry.primary_cutoff(),
            competition,
            entry.recruitment_count,
        )
    }
}

/// Scores with the standard constants.
pub fn score(
    track: AdmissionTrack,
    student_value: f64,
    target_cutoff: f64,
    competition_rate: f64,
    recruitment_count: u32,
) -> u8 {
    ProbabilityScorer::default().score(
        track,
        student_value,
        target_cutoff,
        competition_rate,
        recruitment_count,
    )
}
