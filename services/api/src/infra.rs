use admit_advisor::admissions::catalog::{
    AuthError, CatalogService, KeyValueStore, SessionVerifier, SharedSecretAuthority, StoreError,
};
use admit_advisor::admissions::{AdmissionTrack, SubGroup};
use admit_advisor::config::AppConfig;
use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type AdmissionsService =
    CatalogService<InMemoryKeyValueStore, SharedSecretAuthority, InMemorySessionVerifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store; contents are lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Fixed token-to-user table loaded once from configuration.
#[derive(Default)]
pub(crate) struct InMemorySessionVerifier {
    sessions: HashMap<String, String>,
}

impl InMemorySessionVerifier {
    pub(crate) fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            sessions: pairs.iter().cloned().collect(),
        }
    }
}

impl SessionVerifier for InMemorySessionVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

pub(crate) fn build_service(config: &AppConfig, store: Arc<InMemoryKeyValueStore>) -> AdmissionsService {
    CatalogService::new(
        store,
        Arc::new(SharedSecretAuthority::new(config.catalog.admin_token.clone())),
        Arc::new(InMemorySessionVerifier::from_pairs(&config.catalog.sessions)),
    )
    .with_scoring(config.scoring.clone())
    .with_options(config.catalog.rank_options())
    .with_cache_ttl(Duration::seconds(config.catalog.cache_ttl_secs))
}

pub(crate) fn parse_track(raw: &str) -> Result<AdmissionTrack, String> {
    AdmissionTrack::parse(raw).ok_or_else(|| format!("unknown admission track '{raw}' (use susi or jungsi)"))
}

pub(crate) fn parse_sub_group(raw: &str) -> Result<SubGroup, String> {
    SubGroup::parse(raw).ok_or_else(|| format!("unknown application window '{raw}' (use ga, na, or da)"))
}
