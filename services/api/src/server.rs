use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_core::config::AppConfig;
use talent_core::error::AppError;
use talent_core::pipeline::{PipelineService, SqliteStore};
use talent_core::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(db) = args.db.take() {
        config.storage.db_path = db;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = SqliteStore::open(config.storage.db_path.clone())?;
    let service = Arc::new(PipelineService::new(
        store,
        config.privacy.scrubber_enabled_default,
    ));

    let app = with_pipeline_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        db = %config.storage.db_path.display(),
        "talent pipeline api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
