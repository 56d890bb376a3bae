use chrono::{DateTime, Utc};
use internship_hub::workflows::placement::{
    CompanyId, DispatchError, FileReference, InMemoryApplicationStore, JobId, JobPosting,
    JobStatus, NotificationDispatcher, NotificationEvent, RepositoryError, StudentId,
    StudentProfile, SupervisorAccount, SupervisorId, UserRole,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notification dispatcher that keeps every event in memory for the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryOutbox {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl NotificationDispatcher for InMemoryOutbox {
    fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| DispatchError::Transport("outbox mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }
}

impl InMemoryOutbox {
    /// Remove and return everything dispatched so far.
    pub(crate) fn drain(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub(crate) const DEMO_STUDENTS: [(&str, &str, &str); 3] = [
    ("stu-1001", "Asha Verma", "CSE-21-014"),
    ("stu-1002", "Bilal Khan", "CSE-21-027"),
    ("stu-1003", "Chen Li", "ECE-21-008"),
];

pub(crate) const BACKEND_JOB: &str = "job-backend";
pub(crate) const DATA_JOB: &str = "job-data";
pub(crate) const LEAD_SUPERVISOR: &str = "sup-201";

fn demo_cv(student_id: &str, uploaded_at: DateTime<Utc>) -> FileReference {
    FileReference {
        filename: format!("{student_id}-cv.pdf"),
        original_name: "curriculum-vitae.pdf".to_string(),
        path: format!("uploads/cv/{student_id}-cv.pdf"),
        size: 182_404,
        uploaded_at,
    }
}

/// Register the sample students, supervisors, and postings used by `serve --seed-demo`
/// and the CLI demo.
pub(crate) fn seed_directory(store: &InMemoryApplicationStore) -> Result<(), RepositoryError> {
    let now = Utc::now();

    for (index, (id, name, roll_number)) in DEMO_STUDENTS.iter().enumerate() {
        store.register_student(StudentProfile {
            student_id: StudentId(id.to_string()),
            name: name.to_string(),
            roll_number: roll_number.to_string(),
            department: if roll_number.starts_with("ECE") {
                "Electronics".to_string()
            } else {
                "Computer Science".to_string()
            },
            semester: 6,
            cgpa: 7.6 + index as f32 * 0.4,
            attendance: 86.0,
            backlogs: 0,
            cv: Some(demo_cv(id, now)),
            certificates: Vec::new(),
        })?;
    }

    store.register_supervisor(SupervisorAccount {
        supervisor_id: SupervisorId(LEAD_SUPERVISOR.to_string()),
        name: "Dr. Meera Nair".to_string(),
        role: UserRole::Supervisor,
        max_students: 4,
        current_assigned_students: 0,
    })?;
    store.register_supervisor(SupervisorAccount {
        supervisor_id: SupervisorId("sup-202".to_string()),
        name: "Dr. Omar Haddad".to_string(),
        role: UserRole::Supervisor,
        max_students: 2,
        current_assigned_students: 0,
    })?;

    store.register_job(JobPosting {
        job_id: JobId(BACKEND_JOB.to_string()),
        company_id: CompanyId("comp-northwind".to_string()),
        company_name: "Northwind Systems".to_string(),
        title: "Backend Engineering Intern".to_string(),
        hiring_limit: 1,
        hired_count: 0,
        status: JobStatus::Open,
    })?;
    store.register_job(JobPosting {
        job_id: JobId(DATA_JOB.to_string()),
        company_id: CompanyId("comp-lumen".to_string()),
        company_name: "Lumen Analytics".to_string(),
        title: "Data Science Intern".to_string(),
        hiring_limit: 2,
        hired_count: 0,
        status: JobStatus::Open,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use internship_hub::workflows::placement::{ApplicationId, NotificationKind};

    #[test]
    fn seeded_directory_exposes_demo_postings() {
        let store = InMemoryApplicationStore::default();
        seed_directory(&store).expect("seed succeeds");

        let backend = store
            .job(&JobId(BACKEND_JOB.to_string()))
            .expect("store reachable")
            .expect("backend job seeded");
        assert_eq!(backend.hiring_limit, 1);
        assert!(backend.is_open());

        let supervisor = store
            .supervisor(&SupervisorId(LEAD_SUPERVISOR.to_string()))
            .expect("store reachable")
            .expect("supervisor seeded");
        assert_eq!(supervisor.current_assigned_students, 0);
    }

    #[test]
    fn outbox_drain_empties_the_queue() {
        let outbox = InMemoryOutbox::default();
        outbox
            .dispatch(NotificationEvent {
                target_user_id: LEAD_SUPERVISOR.to_string(),
                application_id: ApplicationId("app-000001".to_string()),
                kind: NotificationKind::ApplicationSubmitted,
                actor_name: "Asha Verma".to_string(),
                job_title: "Backend Engineering Intern".to_string(),
                company_name: "Northwind Systems".to_string(),
                message: "Asha Verma applied".to_string(),
            })
            .expect("dispatch succeeds");

        assert_eq!(outbox.drain().len(), 1);
        assert!(outbox.drain().is_empty());
    }
}
