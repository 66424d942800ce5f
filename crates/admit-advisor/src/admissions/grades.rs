//! Reduces raw school-record and exam entries into the scalar summaries the
//! scorer works with. A grade of 0 always means "not entered" and never takes
//! part in an average.

use serde::Serialize;

use super::domain::{ExamSubject, ExamSubjectScore, RawGradeEntry, StudentProfile};

/// Credit-weighted mean of present grades, or the plain mean when no entry
/// carries credit-hours. Returns 0 when nothing was entered.
pub fn aggregate(entries: &[RawGradeEntry]) -> f64 {
    let present: Vec<&RawGradeEntry> = entries.iter().filter(|entry| entry.is_present()).collect();
    if present.is_empty() {
        return 0.0;
    }

    if present.iter().any(|entry| entry.weight > 0) {
        let (weighted_sum, total_weight) = present
            .iter()
            .filter(|entry| entry.weight > 0)
            .fold((0.0_f64, 0.0_f64), |(sum, weight), entry| {
                (
                    sum + f64::from(entry.grade) * f64::from(entry.weight),
                    weight + f64::from(entry.weight),
                )
            });
        return weighted_sum / total_weight;
    }

    mean(present.iter().map(|entry| f64::from(entry.grade)))
}

/// Unweighted mean of the present core exam subjects; missing subjects are skipped.
pub fn exam_average(scores: &[ExamSubjectScore]) -> f64 {
    mean(
        scores
            .iter()
            .filter(|score| score.subject.counts_toward_average() && score.is_present())
            .map(|score| f64::from(score.grade)),
    )
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl StudentProfile {
    pub fn from_inputs(grades: &[RawGradeEntry], exam: &[ExamSubjectScore]) -> Self {
        Self::new(aggregate(grades), exam_average(exam))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
    pub entries: usize,
}

/// Per-subject mean of present grades, in the order subjects first appear.
pub fn subject_averages(entries: &[RawGradeEntry]) -> Vec<SubjectAverage> {
    let mut totals: Vec<(String, f64, usize)> = Vec::new();
    for entry in entries.iter().filter(|entry| entry.is_present()) {
        match totals.iter_mut().find(|(subject, _, _)| *subject == entry.subject) {
            Some((_, sum, count)) => {
                *sum += f64::from(entry.grade);
                *count += 1;
            }
            None => totals.push((entry.subject.clone(), f64::from(entry.grade), 1)),
        }
    }

    totals
        .into_iter()
        .map(|(subject, sum, count)| SubjectAverage {
            subject,
            average: round2(sum / count as f64),
            entries: count,
        })
        .collect()
}

/// The `limit` best subject averages (lowest grade number first).
pub fn strongest_subjects(entries: &[RawGradeEntry], limit: usize) -> Vec<SubjectAverage> {
    let mut averages = subject_averages(entries);
    averages.sort_by(|a, b| a.average.total_cmp(&b.average));
    averages.truncate(limit);
    averages
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStrength {
    pub subject: ExamSubject,
    pub label: &'static str,
    pub grade: u8,
}

/// The `limit` best present exam subjects by grade, ties kept in input order.
pub fn exam_strengths(scores: &[ExamSubjectScore], limit: usize) -> Vec<ExamStrength> {
    let mut present: Vec<ExamStrength> = scores
        .iter()
        .filter(|score| score.is_present())
        .map(|score| ExamStrength {
            subject: score.subject,
            label: score.subject.label(),
            grade: score.grade,
        })
        .collect();
    present.sort_by_key(|strength| strength.grade);
    present.truncate(limit);
    present
}

/// Student-facing breakdown behind a [`StudentProfile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub student: StudentProfile,
    pub grade_entries: usize,
    pub exam_subjects: usize,
    pub strongest_subjects: Vec<SubjectAverage>,
    pub exam_strengths: Vec<ExamStrength>,
}

impl ProfileReport {
    pub fn build(grades: &[RawGradeEntry], exam: &[ExamSubjectScore]) -> Self {
        let student = StudentProfile::from_inputs(grades, exam);
        Self {
            student: StudentProfile::new(round2(student.gpa_equivalent), round2(student.exam_average)),
            grade_entries: grades.iter().filter(|entry| entry.is_present()).count(),
            exam_subjects: exam.iter().filter(|score| score.is_present()).count(),
            strongest_subjects: strongest_subjects(grades, 3),
            exam_strengths: exam_strengths(exam, 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject: &str, term: &str, grade: u8, weight: u32) -> RawGradeEntry {
        RawGradeEntry {
            subject: subject.to_string(),
            term: term.to_string(),
            grade,
            weight,
            raw_score: None,
        }
    }

    fn exam(subject: ExamSubject, grade: u8) -> ExamSubjectScore {
        ExamSubjectScore {
            subject,
            grade,
            standard_score: None,
            percentile: None,
        }
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        assert_eq!(aggregate(&[]), 0.0);
        assert_eq!(aggregate(&[entry("국어", "1-1", 0, 4)]), 0.0);
    }

    #[test]
    fn aggregate_skips_unentered_grades() {
        let entries = vec![
            entry("국어", "1-1", 2, 0),
            entry("수학", "1-1", 0, 0),
            entry("영어", "1-1", 4, 0),
        ];
        assert_eq!(aggregate(&entries), 3.0);
    }

    #[test]
    fn aggregate_weights_by_credit_hours() {
        let entries = vec![entry("국어", "1-1", 1, 4), entry("수학", "1-1", 4, 2)];
        assert_eq!(aggregate(&entries), 2.0);
    }

    #[test]
    fn weighted_mean_ignores_entries_without_credits() {
        let entries = vec![
            entry("국어", "1-1", 2, 3),
            entry("체육", "1-1", 9, 0),
            entry("수학", "1-2", 2, 1),
        ];
        assert_eq!(aggregate(&entries), 2.0);
    }

    #[test]
    fn exam_average_tolerates_missing_inquiry_slot() {
        let scores = vec![
            exam(ExamSubject::Korean, 2),
            exam(ExamSubject::Math, 1),
            exam(ExamSubject::English, 3),
            exam(ExamSubject::Inquiry1, 2),
            exam(ExamSubject::Inquiry2, 0),
            exam(ExamSubject::KoreanHistory, 9),
        ];
        assert_eq!(exam_average(&scores), 2.0);
        assert_eq!(exam_average(&[]), 0.0);
    }

    #[test]
    fn profile_combines_both_summaries() {
        let profile = StudentProfile::from_inputs(
            &[entry("국어", "1-1", 3, 0)],
            &[exam(ExamSubject::Math, 2)],
        );
        assert_eq!(profile, StudentProfile::new(3.0, 2.0));
    }

    #[test]
    fn strongest_subjects_ranks_lowest_average_first() {
        let entries = vec![
            entry("국어", "1-1", 3, 0),
            entry("수학", "1-1", 1, 0),
            entry("국어", "1-2", 4, 0),
            entry("영어", "1-1", 2, 0),
            entry("과학", "1-1", 0, 0),
        ];
        let breakdown = subject_averages(&entries);
        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].subject, "국어");
        assert_eq!(breakdown[0].average, 3.5);
        assert_eq!(breakdown[0].entries, 2);

        let best: Vec<String> = strongest_subjects(&entries, 2)
            .into_iter()
            .map(|average| average.subject)
            .collect();
        assert_eq!(best, vec!["수학".to_string(), "영어".to_string()]);
    }

    #[test]
    fn exam_strengths_skip_absent_subjects() {
        let scores = vec![
            exam(ExamSubject::Korean, 3),
            exam(ExamSubject::Math, 0),
            exam(ExamSubject::English, 1),
        ];
        let strengths = exam_strengths(&scores, 3);
        assert_eq!(strengths.len(), 2);
        assert_eq!(strengths[0].subject, ExamSubject::English);
        assert_eq!(strengths[0].label, "영어");
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(2.3456), 2.35);
        assert_eq!(round2(0.0), 0.0);
    }
}
