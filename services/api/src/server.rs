use crate::cli::ServeArgs;
use crate::infra::{seed_directory, AppState};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use internship_hub::config::AppConfig;
use internship_hub::error::AppError;
use internship_hub::telemetry;
use internship_hub::workflows::placement::{
    run_dispatch_worker, ApplicationStore, ChannelDispatcher, InMemoryApplicationStore,
    NotificationDispatcher, PlacementWorkflowService, TracingSink, WorkflowError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
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

    let store = Arc::new(InMemoryApplicationStore::default());
    if args.seed_demo {
        seed_directory(&store).map_err(WorkflowError::from)?;
        info!("demo students, supervisors, and postings registered");
    }

    let (dispatcher, receiver) = ChannelDispatcher::new(config.workflow.notification_buffer);
    tokio::spawn(run_dispatch_worker(receiver, Arc::new(TracingSink)));

    let placement_service = Arc::new(PlacementWorkflowService::new(store, Arc::new(dispatcher)));
    match config.workflow.reconcile_interval() {
        Some(period) => {
            tokio::spawn(reconcile_periodically(placement_service.clone(), period));
        }
        None => info!("periodic capacity reconciliation disabled"),
    }

    let app = with_placement_routes(placement_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "internship placement service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn reconcile_periodically<S, N>(service: Arc<PlacementWorkflowService<S, N>>, period: Duration)
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match service.reconcile_capacity() {
            Ok(report) if report.is_clean() => debug!("capacity counters consistent"),
            Ok(report) => info!(
                supervisors = report.corrections.supervisors.len(),
                jobs = report.corrections.jobs.len(),
                "capacity counters repaired"
            ),
            Err(err) => warn!(error = %err, "capacity reconciliation failed"),
        }
    }
}
