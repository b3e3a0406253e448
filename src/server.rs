use crate::cli::ServeArgs;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::marketplace::payments::FondyGateway;
use crate::marketplace::{Marketplace, SharedClock, Stores};
use crate::routes::{with_service_routes, AppState};
use crate::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mockable::DefaultClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let gateway = Arc::new(FondyGateway::new(config.payments.clone())?);
    let clock: SharedClock = Arc::new(DefaultClock);
    let marketplace = Marketplace::new(
        &config.auth,
        config.subscriptions.clone(),
        Stores::in_memory(),
        gateway,
        clock,
    );

    let app = with_service_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = ?config.environment,
        %addr,
        demo_activation = config.subscriptions.demo_activation,
        "transportpro marketplace ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
