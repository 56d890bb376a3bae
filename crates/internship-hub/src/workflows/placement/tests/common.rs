use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::placement::domain::{
    Application, ApplicationId, CompanyId, FileReference, JobId, JobPosting, JobStatus,
    StudentId, StudentProfile, SupervisorAccount, SupervisorId, UserRole,
};
use crate::workflows::placement::engine::{SubmitApplication, WorkflowEngine};
use crate::workflows::placement::error::WorkflowError;
use crate::workflows::placement::notifications::{
    DispatchError, NotificationDispatcher, NotificationEvent,
};
use crate::workflows::placement::service::PlacementWorkflowService;
use crate::workflows::placement::store::{
    ApplicationStore, InMemoryApplicationStore, RepositoryError, StoreTransaction,
};

pub(super) type TestService = PlacementWorkflowService<InMemoryApplicationStore, MemoryNotifier>;

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 14, 10, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn engine() -> WorkflowEngine {
    WorkflowEngine::with_clock(fixed_now)
}

pub(super) fn cv(name: &str) -> FileReference {
    FileReference {
        filename: format!("{name}.pdf"),
        original_name: format!("{name} CV.pdf"),
        path: format!("uploads/cv/{name}.pdf"),
        size: 48_213,
        uploaded_at: fixed_now(),
    }
}

pub(super) fn student(id: &str, name: &str) -> StudentProfile {
    StudentProfile {
        student_id: StudentId(id.to_string()),
        name: name.to_string(),
        roll_number: format!("CS-2022-{id}"),
        department: "Computer Science".to_string(),
        semester: 6,
        cgpa: 8.1,
        attendance: 88.5,
        backlogs: 1,
        cv: Some(cv(id)),
        certificates: Vec::new(),
    }
}

pub(super) fn supervisor(id: &str, max_students: u32) -> SupervisorAccount {
    SupervisorAccount {
        supervisor_id: SupervisorId(id.to_string()),
        name: format!("Dr. {id}"),
        role: UserRole::Supervisor,
        max_students,
        current_assigned_students: 0,
    }
}

pub(super) fn job(id: &str, company: &str, hiring_limit: u32) -> JobPosting {
    JobPosting {
        job_id: JobId(id.to_string()),
        company_id: CompanyId(company.to_string()),
        company_name: format!("{company} Labs"),
        title: format!("Backend Intern ({id})"),
        hiring_limit,
        hired_count: 0,
        status: JobStatus::Open,
    }
}

pub(super) fn sid(id: &str) -> StudentId {
    StudentId(id.to_string())
}

pub(super) fn sup(id: &str) -> SupervisorId {
    SupervisorId(id.to_string())
}

pub(super) fn company(id: &str) -> CompanyId {
    CompanyId(id.to_string())
}

pub(super) fn jid(id: &str) -> JobId {
    JobId(id.to_string())
}

pub(super) fn seeded_store() -> Arc<InMemoryApplicationStore> {
    let store = Arc::new(InMemoryApplicationStore::default());
    for (id, name) in [("s-1", "Asha"), ("s-2", "Bilal"), ("s-3", "Chen")] {
        store.register_student(student(id, name)).expect("student");
    }
    store.register_supervisor(supervisor("sup-1", 5)).expect("supervisor");
    store.register_supervisor(supervisor("sup-2", 1)).expect("supervisor");
    store.register_job(job("job-1", "acme", 2)).expect("job");
    store.register_job(job("job-2", "globex", 1)).expect("job");
    store.register_job(job("job-3", "initech", 1)).expect("job");
    store
}

pub(super) fn build_service() -> (TestService, Arc<InMemoryApplicationStore>, Arc<MemoryNotifier>) {
    let store = seeded_store();
    let notifier = Arc::new(MemoryNotifier::default());
    let service =
        PlacementWorkflowService::with_engine(store.clone(), notifier.clone(), engine());
    (service, store, notifier)
}

pub(super) fn submit_request(student: &str, job: &str, supervisor: &str) -> SubmitApplication {
    SubmitApplication {
        student_id: sid(student),
        job_id: jid(job),
        supervisor_id: sup(supervisor),
        cover_letter: Some("I build reliable backend services.".to_string()),
    }
}

pub(super) fn submitted(service: &TestService, student: &str, job: &str, supervisor: &str) -> Application {
    service
        .submit(submit_request(student, job, supervisor))
        .expect("submission succeeds")
        .application
}

/// Submit and walk the application through supervisor approval.
pub(super) fn supervisor_approved(
    service: &TestService,
    student: &str,
    job: &str,
    supervisor: &str,
) -> ApplicationId {
    let application = submitted(service, student, job, supervisor);
    service
        .supervisor_approve(&application.application_id, &sup(supervisor))
        .expect("supervisor approval succeeds");
    application.application_id
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn clear(&self) {
        self.events.lock().expect("notifier mutex poisoned").clear();
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationDispatcher for FailingNotifier {
    fn dispatch(&self, _event: NotificationEvent) -> Result<(), DispatchError> {
        Err(DispatchError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl ApplicationStore for UnavailableStore {
    fn transaction<T, F>(&self, _op: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> Result<T, WorkflowError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
