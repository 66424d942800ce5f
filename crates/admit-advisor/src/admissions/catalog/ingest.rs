//! Normalises heterogeneous catalog rows (JSON uploads or CSV files with
//! Korean or English headers) into [`CatalogEntry`] values.

use std::collections::BTreeMap;
use std::io::Read;

use serde_json::Value;

use crate::admissions::domain::{AdmissionTrack, CatalogEntry, SubGroup, SubjectCutoffs};

/// Rows per upload chunk when a file is split client-side.
pub const CHUNK_SIZE: usize = 1000;

/// One uploaded row before normalisation: header or field name to raw value.
pub type RawCatalogRow = BTreeMap<String, Value>;

const UNIVERSITY: &[&str] = &["university", "대학명", "name"];
const DEPARTMENT: &[&str] = &["department", "학과명", "dept"];
const YEAR: &[&str] = &["year", "년도", "학년도"];
const CUTOFF_50: &[&str] = &["grade_50_cut", "cutoff50", "50%컷"];
const CUTOFF_70: &[&str] = &["grade_70_cut", "cutoff70", "70%컷", "내신등급", "requiredGrade"];
const RECRUITMENT: &[&str] = &["recruitment_count", "모집인원", "capacity", "students"];
const COMPETITION: &[&str] = &["competition_rate", "경쟁률", "rate"];
const REAL_COMPETITION: &[&str] = &["real_competition_rate", "실질경쟁률"];
const SUB_GROUP: &[&str] = &["group", "군"];
const ADMISSION_TYPE: &[&str] = &["admission_type", "전형구분"];
const REGION: &[&str] = &["region", "지역"];
const CATEGORY: &[&str] = &["category", "계열"];
const KOREAN: &[&str] = &["korean", "국어"];
const MATH: &[&str] = &["math", "수학"];
const ENGLISH: &[&str] = &["english", "영어"];
const INQUIRY: &[&str] = &["inquiry", "탐구"];
const AVERAGE: &[&str] = &["average", "평균"];

/// Error raised while normalising uploaded rows.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: field `{field}` is not a number: {value}")]
    InvalidNumber {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: unknown sub group `{value}`")]
    UnknownSubGroup { row: usize, value: String },
    #[error("chunk {0} carries no rows")]
    EmptyChunk(u32),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Normalises every row of a chunk; the first malformed row rejects the chunk.
pub fn normalize_rows(
    rows: &[RawCatalogRow],
    track: AdmissionTrack,
) -> Result<Vec<CatalogEntry>, IngestionError> {
    rows.iter()
        .enumerate()
        .map(|(row, raw)| normalize_row(row, raw, track))
        .collect()
}

pub fn normalize_row(
    row: usize,
    raw: &RawCatalogRow,
    track: AdmissionTrack,
) -> Result<CatalogEntry, IngestionError> {
    let reader = RowReader { row, raw };

    let university = reader
        .text(UNIVERSITY)
        .ok_or(IngestionError::MissingField {
            row,
            field: "university",
        })?;
    let department = reader
        .text(DEPARTMENT)
        .ok_or(IngestionError::MissingField {
            row,
            field: "department",
        })?;
    let year = reader
        .whole_number(YEAR, "year")?
        .ok_or(IngestionError::MissingField { row, field: "year" })?;

    let sub_group = match track {
        AdmissionTrack::ExamBased => reader.sub_group()?,
        AdmissionTrack::Rolling => None,
    };

    let subject_scores = SubjectCutoffs {
        korean: reader.number(KOREAN, "korean")?,
        math: reader.number(MATH, "math")?,
        english: reader.number(ENGLISH, "english")?,
        inquiry: reader.number(INQUIRY, "inquiry")?,
        average: reader.number(AVERAGE, "average")?,
    };

    Ok(CatalogEntry {
        university,
        department,
        track,
        sub_group,
        year,
        cutoff_at_50pct: reader.number(CUTOFF_50, "grade_50_cut")?.unwrap_or(0.0),
        cutoff_at_70pct: reader.number(CUTOFF_70, "grade_70_cut")?.unwrap_or(0.0),
        recruitment_count: reader
            .whole_number(RECRUITMENT, "recruitment_count")?
            .unwrap_or(0),
        competition_rate: reader
            .number(COMPETITION, "competition_rate")?
            .unwrap_or(0.0),
        real_competition_rate: reader
            .number(REAL_COMPETITION, "real_competition_rate")?
            .unwrap_or(0.0),
        region: reader.text(REGION),
        category: reader.text(CATEGORY),
        admission_type: reader.text(ADMISSION_TYPE),
        subject_scores: (!subject_scores.is_empty()).then_some(subject_scores),
    })
}

struct RowReader<'a> {
    row: usize,
    raw: &'a RawCatalogRow,
}

impl RowReader<'_> {
    /// First alias carrying a non-blank value.
    fn lookup(&self, aliases: &[&str]) -> Option<&Value> {
        aliases
            .iter()
            .filter_map(|alias| self.raw.get(*alias))
            .find(|value| !is_blank(value))
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        self.lookup(aliases).and_then(|value| match value {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
    }

    fn number(&self, aliases: &[&str], field: &'static str) -> Result<Option<f64>, IngestionError> {
        let Some(value) = self.lookup(aliases) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|number| number.is_finite())
            .map(Some)
            .ok_or_else(|| IngestionError::InvalidNumber {
                row: self.row,
                field,
                value: value.to_string(),
            })
    }

    /// Integral value that fits `T`; anything else is an invalid number.
    fn whole_number<T: TryFrom<i64>>(
        &self,
        aliases: &[&str],
        field: &'static str,
    ) -> Result<Option<T>, IngestionError> {
        let Some(number) = self.number(aliases, field)? else {
            return Ok(None);
        };
        let whole = (number.fract() == 0.0 && number.abs() <= i64::MAX as f64)
            .then_some(number as i64)
            .and_then(|value| T::try_from(value).ok());
        whole.map(Some).ok_or_else(|| IngestionError::InvalidNumber {
            row: self.row,
            field,
            value: number.to_string(),
        })
    }

    /// `group`/`군` must name a window; `admission_type` only counts when it does.
    fn sub_group(&self) -> Result<Option<SubGroup>, IngestionError> {
        if let Some(raw) = self.text(SUB_GROUP) {
            return SubGroup::parse(&raw)
                .map(Some)
                .ok_or(IngestionError::UnknownSubGroup {
                    row: self.row,
                    value: raw,
                });
        }
        Ok(self
            .text(ADMISSION_TYPE)
            .and_then(|raw| SubGroup::parse(&raw)))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Reads a CSV upload into raw rows keyed by header. Rows whose first column
/// is empty are skipped.
pub fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<RawCatalogRow>, IngestionError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.replace('\u{feff}', "").trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.get(0).map_or(true, |first| first.trim().is_empty()) {
            continue;
        }
        let row: RawCatalogRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Splits rows into upload-sized chunks, preserving order.
pub fn chunk_rows(rows: Vec<RawCatalogRow>, size: usize) -> Vec<Vec<RawCatalogRow>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(rows.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(rows.len()));
    for row in rows {
        current.push(row);
        if current.len() == size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
