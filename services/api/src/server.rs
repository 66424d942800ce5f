use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, InMemoryKeyValueStore};
use crate::routes::with_admissions_routes;
use admit_advisor::config::AppConfig;
use admit_advisor::error::AppError;
use admit_advisor::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.catalog.admin_token.is_none() {
        warn!("APP_ADMIN_TOKEN is unset; catalog uploads will be refused");
    }

    let store = Arc::new(InMemoryKeyValueStore::default());
    let service = Arc::new(build_service(&config, store));

    let app = with_admissions_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sessions = config.catalog.sessions.len(),
        cache_ttl_secs = config.catalog.cache_ttl_secs,
        "admission advisor ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
