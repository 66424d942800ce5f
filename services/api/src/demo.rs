use crate::infra::{build_service, InMemoryKeyValueStore};
use admit_advisor::admissions::catalog::{
    chunk_rows, normalize_rows, read_csv_rows, CatalogServiceError, ChunkUpload,
    IngestionReceipt, RawCatalogRow, RecommendationQuery, RecommendationResponse, ScoresUpdate,
};
use admit_advisor::admissions::{
    AdmissionTrack, ExamSubject, ExamSubjectScore, ProfileReport, RawGradeEntry, Ranker,
    RecommendationSet, ScoredCandidate, StudentProfile, SubGroup,
};
use admit_advisor::config::AppConfig;
use admit_advisor::error::AppError;
use chrono::Utc;
use clap::Args;
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_ADMIN_TOKEN: &str = "demo-admin";
const DEMO_SESSION_TOKEN: &str = "demo-session";
const DEMO_USER: &str = "demo-student";

#[derive(Args, Debug)]
pub(crate) struct RecommendArgs {
    /// Catalog CSV export (Korean or English headers)
    #[arg(long)]
    pub(crate) catalog: PathBuf,
    /// Admission track the export belongs to (susi or jungsi)
    #[arg(long, value_parser = crate::infra::parse_track)]
    pub(crate) track: AdmissionTrack,
    /// Credit-weighted school-record grade (1.0 best, 9.0 worst)
    #[arg(long, default_value_t = 0.0)]
    pub(crate) gpa: f64,
    /// Average exam grade across the core subjects
    #[arg(long, default_value_t = 0.0)]
    pub(crate) exam: f64,
    /// Only print one exam-based application window (ga, na, da)
    #[arg(long, value_parser = crate::infra::parse_sub_group)]
    pub(crate) sub_group: Option<SubGroup>,
    /// Override the configured result limit
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Score only the most recent year of each department
    #[arg(long)]
    pub(crate) latest_only: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the school-record grade derived from the sample report card
    #[arg(long)]
    pub(crate) gpa: Option<f64>,
    /// Override the exam average derived from the sample exam sheet
    #[arg(long)]
    pub(crate) exam: Option<f64>,
    /// Rows per upload chunk
    #[arg(long, default_value_t = 2)]
    pub(crate) chunk_size: usize,
}

pub(crate) fn run_recommend(args: RecommendArgs) -> Result<(), AppError> {
    let RecommendArgs {
        catalog,
        track,
        gpa,
        exam,
        sub_group,
        limit,
        latest_only,
    } = args;

    let config = AppConfig::load()?;
    let rows = read_csv_rows(BufReader::new(File::open(&catalog)?))?;
    let entries = normalize_rows(&rows, track)?;

    let mut options = config.catalog.rank_options();
    if let Some(limit) = limit {
        options.limit_total = limit;
        options.sub_group_limit = limit;
    }
    options.latest_year_only |= latest_only;

    let profile = StudentProfile::new(gpa, exam);
    let set = Ranker::new(config.scoring.clone()).recommend(&entries, &profile, track, &options);

    println!("Admission recommendations from {}", catalog.display());
    println!(
        "{} | {} catalog rows | gpa {:.2} | exam {:.2}",
        track.label(),
        entries.len(),
        profile.gpa_equivalent,
        profile.exam_average
    );
    match &set {
        RecommendationSet::Rolling { candidates } => render_candidates(candidates),
        RecommendationSet::ExamBased { groups } => {
            for group in SubGroup::ordered() {
                if sub_group.is_some_and(|wanted| wanted != group) {
                    continue;
                }
                println!("{}:", group.label());
                render_candidates(groups.get(group));
            }
        }
    }
    if set.is_empty() {
        println!("No department could be scored; check the grade values and the catalog cutoffs.");
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        gpa,
        exam,
        chunk_size,
    } = args;

    let mut config = AppConfig::load()?;
    config.catalog.admin_token = Some(DEMO_ADMIN_TOKEN.to_string());
    config.catalog.sessions = vec![(DEMO_SESSION_TOKEN.to_string(), DEMO_USER.to_string())];
    let service = build_service(&config, Arc::new(InMemoryKeyValueStore::default()));
    let now = Utc::now();

    println!("Admission advisor demo");
    for track in AdmissionTrack::ordered() {
        let rows = sample_rows(track);
        let chunks = chunk_rows(rows, chunk_size);
        let last = chunks.len().saturating_sub(1);
        println!("\nUploading {} in {} chunk(s)", track.label(), chunks.len());
        for (index, rows) in chunks.into_iter().enumerate() {
            let upload = ChunkUpload {
                auth_token: Some(DEMO_ADMIN_TOKEN.to_string()),
                track,
                chunk_index: index as u32,
                is_final_chunk: index == last,
                rows,
            };
            match service.ingest_chunk(upload, now)? {
                IngestionReceipt::Staged(staged) => println!(
                    "  - chunk {} staged ({} received)",
                    staged.chunk_index, staged.chunks_received
                ),
                IngestionReceipt::Committed(committed) => println!(
                    "  - committed {} catalog entries",
                    committed.total_entries
                ),
            }
        }
    }

    let status = service.status(now).map_err(CatalogServiceError::from)?;
    println!(
        "\nCatalog status: {} susi | {} jungsi | {} total",
        status.susi_count, status.jungsi_count, status.total
    );

    let grades = sample_grades();
    let exam_scores = sample_exam();
    let report = ProfileReport::build(&grades, &exam_scores);
    println!(
        "\nStudent profile: gpa {:.2} over {} grades | exam {:.2} over {} subjects",
        report.student.gpa_equivalent,
        report.grade_entries,
        report.student.exam_average,
        report.exam_subjects
    );
    for subject in &report.strongest_subjects {
        println!(
            "  - {}: {:.2} ({} terms)",
            subject.subject, subject.average, subject.entries
        );
    }
    for strength in &report.exam_strengths {
        println!("  - exam {}: grade {}", strength.label, strength.grade);
    }

    let gpa_equivalent = gpa.unwrap_or(report.student.gpa_equivalent);
    let exam_average = exam.unwrap_or(report.student.exam_average);
    for track in AdmissionTrack::ordered() {
        let response = service.recommend(
            RecommendationQuery {
                gpa_equivalent,
                exam_average,
                track,
                sub_group: None,
            },
            now,
        );
        render_response(&response);
    }

    let user_id = service
        .authenticate(Some(DEMO_SESSION_TOKEN))
        .map_err(CatalogServiceError::from)?;
    service
        .save_scores(
            &user_id,
            ScoresUpdate {
                grades,
                exam: exam_scores,
            },
            now,
        )
        .map_err(CatalogServiceError::from)?;
    if let Some(saved) = service
        .load_scores(&user_id)
        .map_err(CatalogServiceError::from)?
    {
        println!(
            "\nSaved {} grades and {} exam scores for {} at {}",
            saved.grades.len(),
            saved.exam.len(),
            user_id,
            saved.updated_at.to_rfc3339()
        );
    }

    Ok(())
}

fn render_response(response: &RecommendationResponse) {
    println!(
        "\n{} ({} candidates)",
        response.track.label(),
        response.len()
    );
    if let Some(notice) = &response.notice {
        println!("  {notice}");
    }
    if let Some(candidates) = &response.candidates {
        render_candidates(candidates);
    }
    if let Some(groups) = &response.groups {
        for group in SubGroup::ordered() {
            println!("{}:", group.label());
            render_candidates(groups.get(group));
        }
    }
}

fn render_candidates(candidates: &[ScoredCandidate]) {
    for (position, candidate) in candidates.iter().enumerate() {
        let entry = &candidate.entry;
        let moved = if candidate.redistributed {
            entry
                .sub_group
                .map(|group| format!(" [moved from {}]", group.label()))
                .unwrap_or_else(|| " [moved]".to_string())
        } else {
            String::new()
        };
        println!(
            "  {:>2}. {} {} ({}) | cut {:.1}/{:.1} | {:.1}:1 | {}% {}{}",
            position + 1,
            entry.university,
            entry.department,
            entry.year,
            entry.cutoff_at_50pct,
            entry.cutoff_at_70pct,
            entry.competition_rate,
            candidate.probability,
            candidate.tier_label(),
            moved
        );
        if candidate.recent_history.len() > 1 {
            let years: Vec<String> = candidate
                .recent_history
                .iter()
                .map(|past| format!("{} {:.1}", past.year, past.primary_cutoff()))
                .collect();
            println!("      history: {}", years.join(", "));
        }
    }
}

fn raw_row(fields: Vec<(&str, Value)>) -> RawCatalogRow {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn sample_rows(track: AdmissionTrack) -> Vec<RawCatalogRow> {
    match track {
        AdmissionTrack::Rolling => vec![
            rolling_row("서울대학교", "경영학과", 2024, 1.2, 1.5, 30, 15.2),
            rolling_row("서울대학교", "경영학과", 2023, 1.1, 1.4, 28, 14.6),
            rolling_row("연세대학교", "경제학부", 2024, 1.5, 1.8, 25, 12.8),
            rolling_row("고려대학교", "컴퓨터학과", 2024, 1.8, 2.1, 20, 18.5),
            rolling_row("성균관대학교", "전기전자공학부", 2024, 2.0, 2.3, 40, 12.1),
            rolling_row("한양대학교", "기계공학부", 2024, 2.2, 2.5, 35, 10.8),
        ],
        AdmissionTrack::ExamBased => vec![
            exam_row("서울대학교", "의학과", "정시(가군)", 1.0, 1.2, [140.0, 145.0, 142.0, 142.3], 15, 25.6),
            exam_row("연세대학교", "경영학과", "정시(나군)", 1.3, 1.6, [135.0, 138.0, 136.0, 136.3], 35, 14.2),
            exam_row("고려대학교", "법학과", "정시(다군)", 1.6, 1.9, [132.0, 130.0, 135.0, 132.3], 25, 16.8),
            exam_row("성균관대학교", "소프트웨어학과", "정시(가군)", 1.7, 2.0, [128.0, 135.0, 132.0, 131.7], 30, 13.4),
            exam_row("한양대학교", "건축학부", "정시(나군)", 1.9, 2.2, [125.0, 130.0, 128.0, 127.7], 25, 11.6),
        ],
    }
}

fn rolling_row(
    university: &str,
    department: &str,
    year: i32,
    cut_50: f64,
    cut_70: f64,
    recruitment: u32,
    competition: f64,
) -> RawCatalogRow {
    raw_row(vec![
        ("대학명", json!(university)),
        ("학과명", json!(department)),
        ("년도", json!(year)),
        ("50%컷", json!(cut_50)),
        ("70%컷", json!(cut_70)),
        ("모집인원", json!(recruitment)),
        ("경쟁률", json!(competition)),
        ("지역", json!("서울")),
        ("전형구분", json!("학생부종합전형")),
    ])
}

#[allow(clippy::too_many_arguments)]
fn exam_row(
    university: &str,
    department: &str,
    admission_type: &str,
    cut_50: f64,
    cut_70: f64,
    [korean, math, inquiry, average]: [f64; 4],
    recruitment: u32,
    competition: f64,
) -> RawCatalogRow {
    raw_row(vec![
        ("university", json!(university)),
        ("department", json!(department)),
        ("year", json!(2024)),
        ("admission_type", json!(admission_type)),
        ("grade_50_cut", json!(cut_50)),
        ("grade_70_cut", json!(cut_70)),
        ("korean", json!(korean)),
        ("math", json!(math)),
        ("inquiry", json!(inquiry)),
        ("average", json!(average)),
        ("recruitment_count", json!(recruitment)),
        ("competition_rate", json!(competition)),
        ("real_competition_rate", json!(competition)),
        ("region", json!("서울")),
    ])
}

fn sample_grades() -> Vec<RawGradeEntry> {
    [
        ("국어", "1-1", 2, 4),
        ("수학", "1-1", 1, 4),
        ("영어", "1-1", 2, 3),
        ("국어", "1-2", 1, 4),
        ("수학", "1-2", 2, 4),
        ("통합과학", "1-2", 3, 3),
    ]
    .into_iter()
    .map(|(subject, term, grade, weight)| RawGradeEntry {
        subject: subject.to_string(),
        term: term.to_string(),
        grade,
        weight,
        raw_score: None,
    })
    .collect()
}

fn sample_exam() -> Vec<ExamSubjectScore> {
    [
        (ExamSubject::Korean, 2),
        (ExamSubject::Math, 1),
        (ExamSubject::English, 1),
        (ExamSubject::Inquiry1, 2),
        (ExamSubject::KoreanHistory, 3),
    ]
    .into_iter()
    .map(|(subject, grade)| ExamSubjectScore {
        subject,
        grade,
        standard_score: None,
        percentile: None,
    })
    .collect()
}
