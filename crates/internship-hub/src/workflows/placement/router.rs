use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationView, CompanyId, HiringStatus, InterviewDetails, ReviewDecision,
    StudentId, SupervisorId,
};
use super::engine::{ChangeRequest, ResubmissionPatch, SubmitApplication};
use super::error::WorkflowError;
use super::notifications::NotificationDispatcher;
use super::service::{PlacementWorkflowService, WorkflowReceipt};
use super::store::ApplicationStore;

type SharedService<S, N> = Arc<PlacementWorkflowService<S, N>>;

/// Router builder exposing the workflow operations over HTTP.
pub fn placement_router<S, N>(service: SharedService<S, N>) -> Router
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/placements/applications",
            post(submit_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id",
            get(fetch_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/supervisor-review",
            post(supervisor_review_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/supervisor-feedback",
            post(supervisor_feedback_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/supervisor-approve",
            post(supervisor_approve_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/resubmit",
            post(resubmit_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/company-review",
            post(company_review_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/interview",
            post(interview_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/applications/:application_id/status",
            post(status_handler::<S, N>),
        )
        .route(
            "/api/v1/placements/reconcile",
            post(reconcile_handler::<S, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SupervisorReviewRequest {
    pub(crate) supervisor_id: SupervisorId,
    pub(crate) decision: ReviewDecision,
    #[serde(default)]
    pub(crate) comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SupervisorFeedbackRequest {
    pub(crate) supervisor_id: SupervisorId,
    #[serde(flatten)]
    pub(crate) feedback: ChangeRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SupervisorApproveRequest {
    pub(crate) supervisor_id: SupervisorId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResubmitRequest {
    pub(crate) student_id: StudentId,
    #[serde(default)]
    pub(crate) patch: ResubmissionPatch,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompanyReviewRequest {
    pub(crate) company_id: CompanyId,
    pub(crate) decision: ReviewDecision,
    #[serde(default)]
    pub(crate) comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InterviewRequest {
    pub(crate) company_id: CompanyId,
    pub(crate) details: InterviewDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) company_id: CompanyId,
    pub(crate) status: HiringStatus,
    #[serde(default)]
    pub(crate) note: Option<String>,
}

/// Response body for committed transitions.
#[derive(Debug, Serialize)]
pub(crate) struct ReceiptView {
    pub(crate) application: ApplicationView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) warnings: Vec<String>,
}

impl From<WorkflowReceipt> for ReceiptView {
    fn from(receipt: WorkflowReceipt) -> Self {
        Self {
            application: receipt.application.view(),
            warnings: receipt.warnings,
        }
    }
}

pub(crate) fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::InvalidState { .. }
        | WorkflowError::Conflict(_)
        | WorkflowError::CapacityExceeded(_) => StatusCode::CONFLICT,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<WorkflowReceipt, WorkflowError>, success: StatusCode) -> Response {
    match result {
        Ok(receipt) => (success, axum::Json(ReceiptView::from(receipt))).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: WorkflowError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    axum::Json(request): axum::Json<SubmitApplication>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(service.submit(request), StatusCode::CREATED)
}

pub(crate) async fn fetch_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, axum::Json(application.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn supervisor_review_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<SupervisorReviewRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.supervisor_review(
        &ApplicationId(application_id),
        &request.supervisor_id,
        request.decision,
        request.comments,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn supervisor_feedback_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<SupervisorFeedbackRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.supervisor_reject_with_feedback(
        &ApplicationId(application_id),
        &request.supervisor_id,
        request.feedback,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn supervisor_approve_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<SupervisorApproveRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result =
        service.supervisor_approve(&ApplicationId(application_id), &request.supervisor_id);
    respond(result, StatusCode::OK)
}

pub(crate) async fn resubmit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ResubmitRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.resubmit(
        &ApplicationId(application_id),
        &request.student_id,
        request.patch,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn company_review_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<CompanyReviewRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.company_review(
        &ApplicationId(application_id),
        &request.company_id,
        request.decision,
        request.comments,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn interview_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<InterviewRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.schedule_interview(
        &ApplicationId(application_id),
        &request.company_id,
        request.details,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn status_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.set_application_status(
        &ApplicationId(application_id),
        &request.company_id,
        request.status,
        request.note,
    );
    respond(result, StatusCode::OK)
}

pub(crate) async fn reconcile_handler<S, N>(
    State(service): State<SharedService<S, N>>,
) -> Response
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.reconcile_capacity() {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}
