use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use super::catalog::{
    AdminAuthority, AuthError, CatalogService, CatalogServiceError, ChunkUpload, KeyValueStore,
    RecommendationQuery, ScoresUpdate, SessionVerifier, StoreError,
};
use super::domain::AdmissionTrack;
use super::grades::ProfileReport;

/// Router builder exposing catalog upload, recommendation, and saved-score endpoints.
pub fn admissions_router<S, A, V>(service: Arc<CatalogService<S, A, V>>) -> Router
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    Router::new()
        .route("/api/v1/admin/catalog/chunks", post(ingest_handler::<S, A, V>))
        .route("/api/v1/recommendations", post(recommend_handler::<S, A, V>))
        .route("/api/v1/profile", post(profile_handler))
        .route("/api/v1/status", get(status_handler::<S, A, V>))
        .route(
            "/api/v1/catalog/:track/bands/:band",
            get(band_handler::<S, A, V>),
        )
        .route(
            "/api/v1/catalog/:track/universities/:university/:department",
            get(lookup_handler::<S, A, V>),
        )
        .route(
            "/api/v1/scores",
            get(load_scores_handler::<S, A, V>).put(save_scores_handler::<S, A, V>),
        )
        .with_state(service)
}

pub(crate) async fn ingest_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    axum::Json(upload): axum::Json<ChunkUpload>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    match service.ingest_chunk(upload, Utc::now()) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(CatalogServiceError::Auth(error)) => auth_failure(error),
        Err(CatalogServiceError::Ingestion(error)) => {
            let payload = json!({
                "success": false,
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(CatalogServiceError::Store(error)) => store_failure(error),
    }
}

pub(crate) async fn recommend_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    axum::Json(query): axum::Json<RecommendationQuery>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    let response = service.recommend(query, Utc::now());
    (StatusCode::OK, axum::Json(response)).into_response()
}

pub(crate) async fn profile_handler(axum::Json(inputs): axum::Json<ScoresUpdate>) -> Response {
    let report = ProfileReport::build(&inputs.grades, &inputs.exam);
    (StatusCode::OK, axum::Json(report)).into_response()
}

pub(crate) async fn status_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    match service.status(Utc::now()) {
        Ok(status) => (StatusCode::OK, axum::Json(status)).into_response(),
        Err(error) => store_failure(error),
    }
}

pub(crate) async fn band_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    Path((track, band)): Path<(String, u32)>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    let Some(track) = AdmissionTrack::parse(&track) else {
        return unknown_track(&track);
    };
    match service.band(track, band) {
        Ok(entries) => {
            let payload = json!({
                "track": track,
                "band": band,
                "entries": entries,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => store_failure(error),
    }
}

pub(crate) async fn lookup_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    Path((track, university, department)): Path<(String, String, String)>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    let Some(track) = AdmissionTrack::parse(&track) else {
        return unknown_track(&track);
    };
    match service.lookup(track, &university, &department) {
        Ok(Some(lookup)) => (StatusCode::OK, axum::Json(lookup)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": format!("{university} {department} is not in the {track} catalog"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => store_failure(error),
    }
}

pub(crate) async fn save_scores_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    headers: HeaderMap,
    axum::Json(update): axum::Json<ScoresUpdate>,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    let user_id = match service.authenticate(bearer_token(&headers)) {
        Ok(user_id) => user_id,
        Err(error) => return auth_failure(error),
    };
    match service.save_scores(&user_id, update, Utc::now()) {
        Ok(saved) => (StatusCode::OK, axum::Json(saved)).into_response(),
        Err(error) => store_failure(error),
    }
}

pub(crate) async fn load_scores_handler<S, A, V>(
    State(service): State<Arc<CatalogService<S, A, V>>>,
    headers: HeaderMap,
) -> Response
where
    S: KeyValueStore + 'static,
    A: AdminAuthority + 'static,
    V: SessionVerifier + 'static,
{
    let user_id = match service.authenticate(bearer_token(&headers)) {
        Ok(user_id) => user_id,
        Err(error) => return auth_failure(error),
    };
    match service.load_scores(&user_id) {
        Ok(Some(saved)) => (StatusCode::OK, axum::Json(saved)).into_response(),
        Ok(None) => {
            let payload = json!({ "error": "no saved scores" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => store_failure(error),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn auth_failure(error: AuthError) -> Response {
    let status = match error {
        AuthError::MissingToken => StatusCode::UNAUTHORIZED,
        AuthError::InvalidToken => StatusCode::FORBIDDEN,
    };
    let payload = json!({
        "success": false,
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn store_failure(error: StoreError) -> Response {
    warn!(%error, "catalog store request failed");
    let status = match error {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn unknown_track(raw: &str) -> Response {
    let payload = json!({
        "error": format!("unknown admission track `{raw}`"),
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}
