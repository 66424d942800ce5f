//! Storage key layout and grade-band partitioning.

use std::collections::BTreeMap;

use crate::admissions::domain::{AdmissionTrack, CatalogEntry, StudentProfile};

const CATALOG_PREFIX: &str = "universities";
const USER_SCORES_PREFIX: &str = "user_scores";

fn track_prefix(track: AdmissionTrack) -> String {
    format!("{CATALOG_PREFIX}_{}_", track.key())
}

pub fn catalog_key(track: AdmissionTrack) -> String {
    format!("{}all", track_prefix(track))
}

pub fn band_key(track: AdmissionTrack, band: u32) -> String {
    format!("{}grade_{band}", track_prefix(track))
}

pub fn band_prefix(track: AdmissionTrack) -> String {
    format!("{}grade_", track_prefix(track))
}

pub fn staging_key(track: AdmissionTrack) -> String {
    format!("{}chunks", track_prefix(track))
}

pub fn updated_at_key(track: AdmissionTrack) -> String {
    format!("{}updated_at", track_prefix(track))
}

pub fn user_scores_key(user_id: &str) -> String {
    format!("{USER_SCORES_PREFIX}_{user_id}")
}

/// `floor(value * 10)`, the granularity result sets are cached at.
pub fn quantize(value: f64) -> i64 {
    (value * 10.0).floor() as i64
}

pub fn result_cache_key(track: AdmissionTrack, profile: &StudentProfile) -> String {
    format!(
        "{}{}_{}",
        track_prefix(track),
        quantize(profile.gpa_equivalent),
        quantize(profile.exam_average)
    )
}

/// Prefix shared by every key of the track; callers narrow it with
/// [`is_result_cache_key`].
pub fn track_scan_prefix(track: AdmissionTrack) -> String {
    track_prefix(track)
}

/// True for keys shaped like `universities_{track}_{int}_{int}`.
pub fn is_result_cache_key(track: AdmissionTrack, key: &str) -> bool {
    let Some(rest) = key.strip_prefix(&track_prefix(track)) else {
        return false;
    };
    let mut parts = rest.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(gpa), Some(exam), None) => {
            gpa.parse::<i64>().is_ok() && exam.parse::<i64>().is_ok()
        }
        _ => false,
    }
}

/// Integer grade band of an entry: `floor(primary cutoff)`.
pub fn band_of(entry: &CatalogEntry) -> u32 {
    entry.primary_cutoff().max(0.0).floor() as u32
}

/// Splits an already ordered catalog into bands, preserving order inside each.
pub fn partition_by_band(entries: &[CatalogEntry]) -> BTreeMap<u32, Vec<CatalogEntry>> {
    let mut bands: BTreeMap<u32, Vec<CatalogEntry>> = BTreeMap::new();
    for entry in entries {
        bands.entry(band_of(entry)).or_default().push(entry.clone());
    }
    bands
}
