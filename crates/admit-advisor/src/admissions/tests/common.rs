use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::admissions::catalog::{
    AuthError, CatalogService, ChunkUpload, KeyValueStore, RawCatalogRow, SessionVerifier,
    SharedSecretAuthority, StoreError,
};
use crate::admissions::domain::AdmissionTrack;
use crate::admissions::router::admissions_router;

pub(super) const ADMIN_TOKEN: &str = "admin-secret";
pub(super) const SESSION_TOKEN: &str = "session-1";
pub(super) const SESSION_USER: &str = "student-1";

pub(super) type TestService = CatalogService<MemoryStore, SharedSecretAuthority, MemorySessions>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn row(value: Value) -> RawCatalogRow {
    serde_json::from_value(value).expect("row object")
}

pub(super) fn rolling_rows() -> Vec<RawCatalogRow> {
    vec![
        row(json!({
            "대학명": "서울대학교", "학과명": "경영학과", "년도": 2024,
            "50%컷": 1.2, "70%컷": 1.5, "모집인원": 30, "경쟁률": 8.5,
        })),
        row(json!({
            "대학명": "서울대학교", "학과명": "경영학과", "년도": 2023,
            "50%컷": 1.1, "70%컷": 1.4, "모집인원": 28, "경쟁률": 9.0,
        })),
        row(json!({
            "대학명": "연세대학교", "학과명": "경제학부", "년도": 2024,
            "50%컷": 1.5, "70%컷": 1.8, "모집인원": 40, "경쟁률": 7.2,
        })),
        row(json!({
            "대학명": "고려대학교", "학과명": "경제학과", "년도": 2024,
            "50%컷": 1.6, "70%컷": 1.9, "모집인원": 35, "경쟁률": 6.8,
        })),
        row(json!({
            "대학명": "중앙대학교", "학과명": "경영학부", "년도": 2024,
            "50%컷": 2.3, "70%컷": 2.6, "모집인원": 60, "경쟁률": 12.1,
        })),
        row(json!({
            "대학명": "경희대학교", "학과명": "회계세무학과", "년도": 2024,
            "50%컷": 2.8, "70%컷": 3.1, "모집인원": 25, "경쟁률": 9.4,
        })),
    ]
}

pub(super) fn exam_rows() -> Vec<RawCatalogRow> {
    vec![
        row(json!({
            "university": "서울대학교", "department": "경영학과", "year": 2024,
            "grade_70_cut": 1.3, "real_competition_rate": 3.1, "group": "가군",
        })),
        row(json!({
            "university": "연세대학교", "department": "경제학부", "year": 2024,
            "grade_70_cut": 1.6, "real_competition_rate": 4.0, "group": "가군",
        })),
        row(json!({
            "university": "고려대학교", "department": "경제학과", "year": 2024,
            "grade_70_cut": 1.7, "real_competition_rate": 3.8, "group": "나군",
        })),
        row(json!({
            "university": "중앙대학교", "department": "경영학부", "year": 2024,
            "grade_70_cut": 2.4, "real_competition_rate": 5.2, "group": "다군",
        })),
    ]
}

pub(super) fn upload(
    track: AdmissionTrack,
    chunk_index: u32,
    is_final_chunk: bool,
    rows: Vec<RawCatalogRow>,
) -> ChunkUpload {
    ChunkUpload {
        auth_token: Some(ADMIN_TOKEN.to_string()),
        track,
        chunk_index,
        is_final_chunk,
        rows,
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let service = CatalogService::new(
        store.clone(),
        Arc::new(SharedSecretAuthority::new(Some(ADMIN_TOKEN.to_string()))),
        Arc::new(MemorySessions::with_session(SESSION_TOKEN, SESSION_USER)),
    );
    (service, store)
}

/// Service with both tracks committed from the fixture rows.
pub(super) fn seeded_service() -> (TestService, Arc<MemoryStore>) {
    let (service, store) = build_service();
    service
        .ingest_chunk(upload(AdmissionTrack::Rolling, 0, true, rolling_rows()), now())
        .expect("rolling catalog commits");
    service
        .ingest_chunk(upload(AdmissionTrack::ExamBased, 0, true, exam_rows()), now())
        .expect("exam catalog commits");
    (service, store)
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub(super) fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub(super) fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key))
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store mutex poisoned").remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

pub(super) struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("kv offline".to_string()))
    }

    fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("kv offline".to_string()))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("kv offline".to_string()))
    }

    fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("kv offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySessions {
    sessions: HashMap<String, String>,
}

impl MemorySessions {
    pub(super) fn with_session(token: &str, user_id: &str) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(token.to_string(), user_id.to_string());
        Self { sessions }
    }
}

impl SessionVerifier for MemorySessions {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    admissions_router(Arc::new(service))
}
