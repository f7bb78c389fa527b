use crate::cli::ServeArgs;
use crate::infra::{build_leave_services, AppState};
use crate::routes::with_leave_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use smart_leave::config::AppConfig;
use smart_leave::error::AppError;
use smart_leave::telemetry;
use smart_leave::workflows::leave::{spawn_reconciler, LeaveRepository};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = build_leave_services(&config)?;

    let store = Arc::clone(&services.store);
    let reconciler = spawn_reconciler(&services.bus, config.sync.poll_interval, move |event| {
        if let Some(event) = event {
            debug!(kind = ?event.kind, at = %event.at, "workflow change observed");
        }
        match store.leaves() {
            Ok(leaves) => {
                let open = leaves
                    .iter()
                    .filter(|leave| !leave.status.is_terminal())
                    .count();
                debug!(total = leaves.len(), open, "workflow state reconciled");
            }
            Err(err) => warn!(error = %err, "workflow state unavailable"),
        }
    });

    let app = with_leave_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "smart leave service ready");

    let served = axum::serve(listener, app).await;
    reconciler.abort();
    served?;
    Ok(())
}
