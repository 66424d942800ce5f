use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::index;
use super::ingest::{normalize_rows, IngestionError, RawCatalogRow};
use super::store::{KeyValueStore, StoreError};
use crate::admissions::domain::{
    AdmissionTrack, CatalogEntry, ExamSubjectScore, RawGradeEntry, ScoredCandidate,
    StudentProfile, SubGroup,
};
use crate::admissions::history::group_history;
use crate::admissions::ranking::{RankOptions, Ranker, RecommendationSet, SubGroupRecommendations};
use crate::admissions::scoring::ScoringConfig;

/// Capability deciding whether a caller may replace the catalog.
pub trait AdminAuthority: Send + Sync {
    fn authorize(&self, token: Option<&str>) -> Result<(), AuthError>;
}

/// Compares the presented token against one configured secret. Without a
/// configured secret every upload is refused.
#[derive(Debug, Clone, Default)]
pub struct SharedSecretAuthority {
    secret: Option<String>,
}

impl SharedSecretAuthority {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

impl AdminAuthority for SharedSecretAuthority {
    fn authorize(&self, token: Option<&str>) -> Result<(), AuthError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        match self.secret.as_deref() {
            Some(secret) if secret == token => Ok(()),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

/// Resolves a bearer session token to the user id it belongs to.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Authorisation failure for admin uploads and user sessions.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credentials missing")]
    MissingToken,
    #[error("credentials rejected")]
    InvalidToken,
}

/// Chunk of an admin catalog upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUpload {
    #[serde(default)]
    pub auth_token: Option<String>,
    pub track: AdmissionTrack,
    pub chunk_index: u32,
    #[serde(default)]
    pub is_final_chunk: bool,
    #[serde(default)]
    pub rows: Vec<RawCatalogRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedChunk {
    pub success: bool,
    pub chunk_index: u32,
    pub chunks_received: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedCatalog {
    pub success: bool,
    pub total_entries: usize,
}

/// Acknowledgement of an uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestionReceipt {
    Committed(CommittedCatalog),
    Staged(StagedChunk),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationQuery {
    #[serde(default)]
    pub gpa_equivalent: f64,
    #[serde(default)]
    pub exam_average: f64,
    pub track: AdmissionTrack,
    #[serde(default)]
    pub sub_group: Option<SubGroup>,
}

impl RecommendationQuery {
    pub fn profile(&self) -> StudentProfile {
        StudentProfile::new(self.gpa_equivalent, self.exam_average)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub student: StudentProfile,
    pub track: AdmissionTrack,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<ScoredCandidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<SubGroupRecommendations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl RecommendationResponse {
    fn from_set(query: &RecommendationQuery, set: RecommendationSet) -> Self {
        let (candidates, groups) = match (set, query.sub_group) {
            (RecommendationSet::Rolling { candidates }, _) => (Some(candidates), None),
            (RecommendationSet::ExamBased { groups }, Some(group)) => {
                (Some(groups.get(group).clone()), None)
            }
            (RecommendationSet::ExamBased { groups }, None) => (None, Some(groups)),
        };
        Self {
            student: query.profile(),
            track: query.track,
            candidates,
            groups,
            notice: None,
        }
    }

    fn degraded(query: &RecommendationQuery, notice: impl Into<String>) -> Self {
        let mut response = Self::from_set(query, RecommendationSet::empty(query.track));
        response.notice = Some(notice.into());
        response
    }

    /// Total candidates across the list or the three windows.
    pub fn len(&self) -> usize {
        self.candidates.as_ref().map_or(0, Vec::len) + self.groups.as_ref().map_or(0, |g| g.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedRecommendations {
    stored_at: DateTime<Utc>,
    set: RecommendationSet,
}

/// Latest row of a university/department plus its recent years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentLookup {
    pub latest: CatalogEntry,
    pub history: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub susi_count: usize,
    pub jungsi_count: usize,
    pub total: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

/// Raw inputs a signed-in student keeps between visits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresUpdate {
    #[serde(default)]
    pub grades: Vec<RawGradeEntry>,
    #[serde(default)]
    pub exam: Vec<ExamSubjectScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScores {
    pub grades: Vec<RawGradeEntry>,
    pub exam: Vec<ExamSubjectScore>,
    pub updated_at: DateTime<Utc>,
}

/// Service composing the store, the ranking engine, and the admin and session
/// capabilities.
pub struct CatalogService<S, A, V> {
    store: Arc<S>,
    authority: Arc<A>,
    sessions: Arc<V>,
    ranker: Ranker,
    options: RankOptions,
    cache_ttl: Duration,
}

impl<S, A, V> CatalogService<S, A, V>
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    pub fn new(store: Arc<S>, authority: Arc<A>, sessions: Arc<V>) -> Self {
        Self {
            store,
            authority,
            sessions,
            ranker: Ranker::default(),
            options: RankOptions::default(),
            cache_ttl: Duration::seconds(3600),
        }
    }

    pub fn with_scoring(mut self, config: ScoringConfig) -> Self {
        self.ranker = Ranker::new(config);
        self
    }

    pub fn with_options(mut self, options: RankOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn options(&self) -> &RankOptions {
        &self.options
    }

    /// Resolves the user behind a bearer token.
    pub fn authenticate(&self, bearer: Option<&str>) -> Result<String, AuthError> {
        let token = bearer
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.sessions.verify(token)
    }

    /// Committed catalog of the track; empty when nothing was uploaded yet.
    pub fn get_catalog(&self, track: AdmissionTrack) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.read_json(&index::catalog_key(track))?.unwrap_or_default())
    }

    /// Replaces the committed catalog of the track and everything derived from it.
    pub fn put_catalog(
        &self,
        track: AdmissionTrack,
        mut entries: Vec<CatalogEntry>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        entries.sort_by(|a, b| {
            a.primary_cutoff()
                .total_cmp(&b.primary_cutoff())
                .then_with(|| a.competition_rate.total_cmp(&b.competition_rate))
        });

        self.write_json(&index::catalog_key(track), &entries)?;

        let bands = index::partition_by_band(&entries);
        let band_prefix = index::band_prefix(track);
        for key in self.store.scan_prefix(&band_prefix)? {
            let stale = key
                .strip_prefix(&band_prefix)
                .and_then(|band| band.parse::<u32>().ok())
                .map_or(true, |band| !bands.contains_key(&band));
            if stale {
                self.store.delete(&key)?;
            }
        }
        for (band, rows) in &bands {
            self.write_json(&index::band_key(track, *band), rows)?;
        }

        let invalidated = self.invalidate_results(track)?;
        self.write_json(&index::updated_at_key(track), &now)?;

        info!(
            %track,
            entries = entries.len(),
            bands = bands.len(),
            invalidated,
            "catalog committed"
        );
        Ok(entries.len())
    }

    fn invalidate_results(&self, track: AdmissionTrack) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in self.store.scan_prefix(&index::track_scan_prefix(track))? {
            if index::is_result_cache_key(track, &key) {
                self.store.delete(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Stages one chunk of an upload; the final chunk commits every staged chunk
    /// in index order. An upload that adds up to no rows never replaces the
    /// committed catalog.
    pub fn ingest_chunk(
        &self,
        upload: ChunkUpload,
        now: DateTime<Utc>,
    ) -> Result<IngestionReceipt, CatalogServiceError> {
        self.authority.authorize(upload.auth_token.as_deref())?;

        if upload.rows.is_empty() && !upload.is_final_chunk {
            return Err(IngestionError::EmptyChunk(upload.chunk_index).into());
        }

        let track = upload.track;
        let entries = normalize_rows(&upload.rows, track)?;
        let staging_key = index::staging_key(track);

        let mut staged: BTreeMap<u32, Vec<CatalogEntry>> = if upload.chunk_index == 0 {
            BTreeMap::new()
        } else {
            self.read_json(&staging_key)?.unwrap_or_default()
        };
        staged.insert(upload.chunk_index, entries);

        if !upload.is_final_chunk {
            self.write_json(&staging_key, &staged)?;
            debug!(%track, chunk = upload.chunk_index, staged = staged.len(), "chunk staged");
            return Ok(IngestionReceipt::Staged(StagedChunk {
                success: true,
                chunk_index: upload.chunk_index,
                chunks_received: staged.len(),
            }));
        }

        let chunks = staged.len();
        let merged: Vec<CatalogEntry> = staged.into_values().flatten().collect();
        if merged.is_empty() {
            return Err(IngestionError::EmptyChunk(upload.chunk_index).into());
        }
        let total_entries = self.put_catalog(track, merged, now)?;
        self.store.delete(&staging_key)?;

        info!(%track, chunks, total_entries, "catalog upload finished");
        Ok(IngestionReceipt::Committed(CommittedCatalog {
            success: true,
            total_entries,
        }))
    }

    /// Cached, ranked recommendations. Storage trouble never surfaces as an
    /// error; callers get an empty response with a notice instead.
    pub fn recommend(&self, query: RecommendationQuery, now: DateTime<Utc>) -> RecommendationResponse {
        let track = query.track;
        let profile = query.profile();
        let cache_key = index::result_cache_key(track, &profile);

        match self.read_json::<CachedRecommendations>(&cache_key) {
            Ok(Some(cached)) if now - cached.stored_at < self.cache_ttl => {
                debug!(%track, key = %cache_key, "serving cached recommendations");
                return RecommendationResponse::from_set(&query, cached.set);
            }
            Ok(_) => {}
            Err(StoreError::Corrupt { key, source }) => {
                warn!(%key, error = %source, "discarding unreadable cached recommendations");
            }
            Err(error) => {
                warn!(%track, %error, "recommendation store unavailable");
                return RecommendationResponse::degraded(&query, store_notice());
            }
        }

        let catalog = match self.get_catalog(track) {
            Ok(catalog) => catalog,
            Err(error) => {
                warn!(%track, %error, "catalog unreadable");
                return RecommendationResponse::degraded(&query, store_notice());
            }
        };
        if catalog.is_empty() {
            return RecommendationResponse::degraded(
                &query,
                format!("{} 입시 데이터가 아직 업로드되지 않았습니다.", track.label()),
            );
        }

        let set = self.ranker.recommend(&catalog, &profile, track, &self.options);
        let cached = CachedRecommendations {
            stored_at: now,
            set,
        };
        if let Err(error) = self.write_json(&cache_key, &cached) {
            warn!(%track, %error, "failed to cache recommendations");
        }

        RecommendationResponse::from_set(&query, cached.set)
    }

    /// Rows of one integer grade band, ordered like the committed catalog.
    pub fn band(&self, track: AdmissionTrack, band: u32) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.read_json(&index::band_key(track, band))?.unwrap_or_default())
    }

    pub fn lookup(
        &self,
        track: AdmissionTrack,
        university: &str,
        department: &str,
    ) -> Result<Option<DepartmentLookup>, StoreError> {
        let catalog = self.get_catalog(track)?;
        let history = group_history(&catalog, university, department);
        Ok(history.first().cloned().map(|latest| DepartmentLookup { latest, history }))
    }

    pub fn status(&self, now: DateTime<Utc>) -> Result<CatalogStatus, StoreError> {
        let susi_count = self.get_catalog(AdmissionTrack::Rolling)?.len();
        let jungsi_count = self.get_catalog(AdmissionTrack::ExamBased)?.len();

        let mut last_updated: Option<DateTime<Utc>> = None;
        for track in AdmissionTrack::ordered() {
            let stamp: Option<DateTime<Utc>> = self.read_json(&index::updated_at_key(track))?;
            last_updated = last_updated.max(stamp);
        }

        Ok(CatalogStatus {
            susi_count,
            jungsi_count,
            total: susi_count + jungsi_count,
            last_updated,
            checked_at: now,
        })
    }

    /// Merges new inputs into the user's saved scores; an empty part keeps
    /// what was saved before.
    pub fn save_scores(
        &self,
        user_id: &str,
        update: ScoresUpdate,
        now: DateTime<Utc>,
    ) -> Result<SavedScores, StoreError> {
        let key = index::user_scores_key(user_id);
        let previous: Option<SavedScores> = self.read_json(&key)?;
        let (previous_grades, previous_exam) = previous
            .map(|saved| (saved.grades, saved.exam))
            .unwrap_or_default();

        let saved = SavedScores {
            grades: if update.grades.is_empty() {
                previous_grades
            } else {
                update.grades
            },
            exam: if update.exam.is_empty() {
                previous_exam
            } else {
                update.exam
            },
            updated_at: now,
        };
        self.write_json(&key, &saved)?;
        Ok(saved)
    }

    pub fn load_scores(&self, user_id: &str) -> Result<Option<SavedScores>, StoreError> {
        self.read_json(&index::user_scores_key(user_id))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::corrupt(key, source)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::corrupt(key, source))?;
        self.store.put(key, raw)
    }
}

fn store_notice() -> &'static str {
    "입시 데이터를 불러오지 못했습니다. 잠시 후 다시 시도해 주세요."
}

/// Error raised by the catalog service.
#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
