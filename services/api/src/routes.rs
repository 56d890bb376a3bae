use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use internship_hub::workflows::placement::{
    placement_router, ApplicationStore, NotificationDispatcher, PlacementWorkflowService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_placement_routes<S, N>(
    service: Arc<PlacementWorkflowService<S, N>>,
) -> axum::Router
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    placement_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{seed_directory, InMemoryOutbox, BACKEND_JOB, LEAD_SUPERVISOR};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use internship_hub::workflows::placement::InMemoryApplicationStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn router(ready: bool) -> axum::Router {
        let store = Arc::new(InMemoryApplicationStore::default());
        seed_directory(&store).expect("seed succeeds");
        let service = Arc::new(PlacementWorkflowService::new(
            store,
            Arc::new(InMemoryOutbox::default()),
        ));
        with_placement_routes(service).layer(Extension(app_state(ready)))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let response = router(false)
            .oneshot(
                Request::get("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "initializing");
    }

    #[tokio::test]
    async fn health_and_placement_routes_share_one_router() {
        let health = router(true)
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(health.status(), StatusCode::OK);

        let payload = json!({
            "student_id": "stu-1001",
            "job_id": BACKEND_JOB,
            "supervisor_id": LEAD_SUPERVISOR,
        });
        let submitted = router(true)
            .oneshot(
                Request::post("/api/v1/placements/applications")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(submitted.status(), StatusCode::CREATED);
        let body = body_json(submitted).await;
        assert_eq!(body["application"]["overall_status"], "pending_supervisor");
    }
}
