use std::path::Path;

use serde::{Deserialize, Serialize};

use super::super::domain::AdmissionTrack;

/// Which published competition figure a track is penalized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionSource {
    Nominal,
    Real,
}

/// `diff <= max_diff` maps to `probability`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityStep {
    pub max_diff: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentBonus {
    /// Bonus applies when the recruitment count is strictly above this.
    pub above: u32,
    pub bonus: f64,
}

/// Heuristic curve for one admission track. The numbers carry no derivation;
/// they reproduce the published calculator and are kept configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCurve {
    /// Ascending by `max_diff`; the first step the diff fits into wins.
    pub steps: Vec<ProbabilityStep>,
    pub otherwise: f64,
    pub competition_source: CompetitionSource,
    pub competition_normalizer: f64,
    pub dampening: f64,
    #[serde(default)]
    pub recruitment_bonus: Option<RecruitmentBonus>,
    pub floor: f64,
    pub ceiling: f64,
}

impl TrackCurve {
    pub fn rolling() -> Self {
        Self {
            steps: steps(&[
                (-1.5, 90.0),
                (-1.0, 80.0),
                (-0.5, 65.0),
                (0.0, 50.0),
                (0.5, 35.0),
                (1.0, 20.0),
            ]),
            otherwise: 10.0,
            competition_source: CompetitionSource::Nominal,
            competition_normalizer: 10.0,
            dampening: 0.3,
            recruitment_bonus: Some(RecruitmentBonus {
                above: 10,
                bonus: 5.0,
            }),
            floor: 5.0,
            ceiling: 95.0,
        }
    }

    pub fn exam_based() -> Self {
        Self {
            steps: steps(&[
                (-1.5, 85.0),
                (-1.0, 75.0),
                (-0.5, 60.0),
                (0.0, 45.0),
                (0.5, 30.0),
                (1.0, 15.0),
            ]),
            otherwise: 8.0,
            competition_source: CompetitionSource::Real,
            competition_normalizer: 15.0,
            dampening: 0.4,
            recruitment_bonus: None,
            floor: 3.0,
            ceiling: 92.0,
        }
    }

    pub fn base_probability(&self, diff: f64) -> f64 {
        self.steps
            .iter()
            .find(|step| diff <= step.max_diff)
            .map(|step| step.probability)
            .unwrap_or(self.otherwise)
    }
}

fn steps(pairs: &[(f64, f64)]) -> Vec<ProbabilityStep> {
    pairs
        .iter()
        .map(|&(max_diff, probability)| ProbabilityStep {
            max_diff,
            probability,
        })
        .collect()
}

/// Scoring constants for both tracks plus the missing-data default. Omitted
/// fields of an override file keep their standard values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_neutral")]
    pub neutral_default: u8,
    #[serde(default = "TrackCurve::rolling")]
    pub rolling: TrackCurve,
    #[serde(default = "TrackCurve::exam_based")]
    pub exam_based: TrackCurve,
}

fn default_neutral() -> u8 {
    30
}

impl ScoringConfig {
    pub fn standard() -> Self {
        Self {
            neutral_default: default_neutral(),
            rolling: TrackCurve::rolling(),
            exam_based: TrackCurve::exam_based(),
        }
    }

    pub fn curve(&self, track: AdmissionTrack) -> &TrackCurve {
        match track {
            AdmissionTrack::Rolling => &self.rolling,
            AdmissionTrack::ExamBased => &self.exam_based,
        }
    }

    /// Reads a JSON override file; steps are re-sorted so lookups stay monotone.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ScoringConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: ScoringConfig = serde_json::from_str(&raw)?;
        for curve in [&mut config.rolling, &mut config.exam_based] {
            curve
                .steps
                .sort_by(|a, b| a.max_diff.total_cmp(&b.max_diff));
        }
        config.validate()?;
        Ok(config)
    }

    /// Every value the scorer can return must stay within 0..=100.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        if self.neutral_default > 100 {
            return Err(ScoringConfigError::NeutralDefault(self.neutral_default));
        }
        for curve in [&self.rolling, &self.exam_based] {
            if !(0.0..=100.0).contains(&curve.floor)
                || !(0.0..=100.0).contains(&curve.ceiling)
                || curve.floor > curve.ceiling
            {
                return Err(ScoringConfigError::Bounds {
                    floor: curve.floor,
                    ceiling: curve.ceiling,
                });
            }
            if !curve.dampening.is_finite() || curve.dampening < 0.0 {
                return Err(ScoringConfigError::Coefficient {
                    field: "dampening",
                    value: curve.dampening,
                });
            }
            if !curve.competition_normalizer.is_finite() || curve.competition_normalizer <= 0.0 {
                return Err(ScoringConfigError::Coefficient {
                    field: "competition_normalizer",
                    value: curve.competition_normalizer,
                });
            }
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("failed to read scoring config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scoring config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("clamp bounds [{floor}, {ceiling}] must satisfy 0 <= floor <= ceiling <= 100")]
    Bounds { floor: f64, ceiling: f64 },
    #[error("neutral default {0} must not exceed 100")]
    NeutralDefault(u8),
    #[error("`{field}` must be a finite, non-negative number, got {value}")]
    Coefficient { field: &'static str, value: f64 },
}
