use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::placement::router::{
    fetch_handler, placement_router, submit_handler, SupervisorApproveRequest,
};
use crate::workflows::placement::service::PlacementWorkflowService;

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn submit_route_returns_created_with_projected_statuses() {
    let (service, _, _) = build_service();
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            "/api/v1/placements/applications",
            json!({
                "student_id": "s-1",
                "job_id": "job-1",
                "supervisor_id": "sup-1",
                "cover_letter": "Keen to join the platform team."
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    let application = &body["application"];
    assert_eq!(application["overall_status"], "pending_supervisor");
    assert_eq!(application["supervisor_status"], "pending");
    assert_eq!(application["application_status"], "pending");
    assert_eq!(application["revisions"].as_array().map(Vec::len), Some(1));
    assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn submit_handler_maps_conflict() {
    let (service, _, _) = build_service();
    submitted(&service, "s-1", "job-1", "sup-1");

    let response = submit_handler(
        State(Arc::new(service)),
        axum::Json(submit_request("s-1", "job-3", "sup-1")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn submit_handler_maps_store_failures_to_internal_error() {
    let service = Arc::new(PlacementWorkflowService::with_engine(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifier::default()),
        engine(),
    ));

    let response = submit_handler(State(service), axum::Json(submit_request("s-1", "job-1", "sup-1"))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn fetch_handler_returns_not_found() {
    let (service, _, _) = build_service();

    let response = fetch_handler(State(Arc::new(service)), Path("app-missing".to_string())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn feedback_route_rejects_blank_reason() {
    let (service, _, _) = build_service();
    let application = submitted(&service, "s-1", "job-1", "sup-1");
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!(
                "/api/v1/placements/applications/{}/supervisor-feedback",
                application.application_id
            ),
            json!({
                "supervisor_id": "sup-1",
                "reason": "",
                "details": "Please expand the cover letter."
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn interview_route_forbids_scheduling_before_approval() {
    let (service, _, _) = build_service();
    let application = submitted(&service, "s-1", "job-1", "sup-1");
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!(
                "/api/v1/placements/applications/{}/interview",
                application.application_id
            ),
            json!({
                "company_id": "acme",
                "details": {
                    "kind": "online",
                    "scheduled_at": "2025-07-20T09:00:00Z",
                    "meeting_link": "https://meet.example.com/acme"
                }
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_route_hires_and_reports_closed_job() {
    let (service, store, _) = build_service();
    let id = supervisor_approved(&service, "s-1", "job-2", "sup-1");
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/placements/applications/{id}/status"),
            json!({ "company_id": "globex", "status": "hired", "note": "Signed" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["application"]["application_status"], "hired");
    assert_eq!(body["application"]["overall_status"], "approved");
    assert_eq!(body["application"]["is_currently_hired"], true);

    let job = store
        .job(&jid("job-2"))
        .expect("store reachable")
        .expect("job present");
    assert!(!job.is_open());
}

#[tokio::test]
async fn approve_route_maps_supervisor_capacity_to_conflict() {
    let (service, _, _) = build_service();
    supervisor_approved(&service, "s-1", "job-1", "sup-2");
    let waiting = submitted(&service, "s-2", "job-1", "sup-2");
    let service = Arc::new(service);

    let response = crate::workflows::placement::router::supervisor_approve_handler(
        State(service),
        Path(waiting.application_id.0.clone()),
        axum::Json(SupervisorApproveRequest {
            supervisor_id: sup("sup-2"),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "capacity_exceeded");
}

#[tokio::test]
async fn reconcile_route_reports_clean_state() {
    let (service, _, _) = build_service();
    supervisor_approved(&service, "s-1", "job-1", "sup-1");
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/v1/placements/reconcile")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "supervisors": [], "jobs": [] }));
}
