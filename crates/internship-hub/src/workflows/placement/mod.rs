//! Internship placement workflow: student submission, supervisor review, and company
//! review/interview/hire, with the capacity rules and revision ledger that go with it.

pub mod capacity;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notifications;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use capacity::{CapacityError, CapacityGuard, JobDrift, ReconciliationPlan, SupervisorDrift};
pub use domain::{
    Actor, Application, ApplicationId, ApplicationStage, ApplicationView, CompanyId,
    CompanyProgress, FileReference, HiringStatus, InterviewDetails, InterviewKind, JobId,
    JobPosting, JobStatus, OverallStatus, RejectionFeedback, RejectionSource, ReviewDecision,
    ReviewStatus, StatusChange, StudentId, StudentProfile, StudentProfileSnapshot,
    SupervisorAccount, SupervisorId, UserRole,
};
pub use engine::{
    ChangeRequest, ResubmissionPatch, SubmitApplication, WorkflowEngine,
    SUPERSEDED_BY_HIRE_COMMENT,
};
pub use error::WorkflowError;
pub use ledger::{FieldChange, RevisionEntry, RevisionKind, RevisionLedger};
pub use notifications::{
    run_dispatch_worker, ChannelDispatcher, DispatchError, NotificationDispatcher,
    NotificationEvent, NotificationKind, NotificationSink, TracingSink,
};
pub use router::placement_router;
pub use service::{PlacementWorkflowService, ReconciliationReport, WorkflowReceipt};
pub use store::{ApplicationStore, InMemoryApplicationStore, RepositoryError, StoreTransaction};
