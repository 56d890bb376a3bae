//! Notification contract consumed after a workflow transition commits.
//!
//! Dispatch is best-effort: failures are logged and reported back as warnings, never
//! as the failure of the transition that produced the event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::domain::ApplicationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationSubmitted,
    SupervisorApproved,
    SupervisorRejected,
    ChangesRequested,
    ApplicationResubmitted,
    ForwardedToCompany,
    CompanyApproved,
    CompanyRejected,
    InterviewScheduled,
    StatusUpdated,
    Hired,
    ApplicationSuperseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub target_user_id: String,
    pub application_id: ApplicationId,
    pub kind: NotificationKind,
    pub actor_name: String,
    pub job_title: String,
    pub company_name: String,
    pub message: String,
}

/// Entry point the workflow service calls once per event.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError>;
}

/// Final delivery hop (e-mail, in-app inbox, ...).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    QueueClosed,
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Hands events to a background worker over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::Sender<NotificationEvent>,
}

impl ChannelDispatcher {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for ChannelDispatcher {
    fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::QueueClosed,
        })
    }
}

/// Drain the queue into `sink` until every sender is dropped.
pub async fn run_dispatch_worker<S>(mut receiver: mpsc::Receiver<NotificationEvent>, sink: Arc<S>)
where
    S: NotificationSink + ?Sized,
{
    while let Some(event) = receiver.recv().await {
        if let Err(err) = sink.deliver(&event) {
            warn!(
                application_id = %event.application_id,
                target = %event.target_user_id,
                kind = ?event.kind,
                error = %err,
                "notification delivery failed"
            );
        }
    }
}

/// Sink that only records deliveries in the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), DispatchError> {
        info!(
            application_id = %event.application_id,
            target = %event.target_user_id,
            kind = ?event.kind,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Dispatch every event, converting failures into warning strings.
pub fn dispatch_all<N>(dispatcher: &N, events: Vec<NotificationEvent>) -> Vec<String>
where
    N: NotificationDispatcher + ?Sized,
{
    let mut warnings = Vec::new();
    for event in events {
        let application_id = event.application_id.clone();
        let target = event.target_user_id.clone();
        if let Err(err) = dispatcher.dispatch(event) {
            warn!(%application_id, %target, error = %err, "notification dispatch failed");
            warnings.push(format!("notification to {target} not sent: {err}"));
        }
    }
    warnings
}
