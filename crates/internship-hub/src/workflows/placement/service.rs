use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::capacity::{CapacityGuard, ReconciliationPlan};
use super::domain::{
    Application, ApplicationId, CompanyId, HiringStatus, InterviewDetails, JobId, JobPosting,
    ReviewDecision, StudentId, SupervisorAccount, SupervisorId,
};
use super::engine::{
    ChangeRequest, ResubmissionPatch, SiblingApplication, SubmitApplication, WorkflowEngine,
};
use super::error::WorkflowError;
use super::notifications::{dispatch_all, NotificationDispatcher, NotificationEvent};
use super::store::{ApplicationStore, StoreTransaction};

/// Result of a committed transition. Warnings describe notifications that could not
/// be handed off; they never indicate that the transition itself failed.
#[derive(Debug, Clone)]
pub struct WorkflowReceipt {
    pub application: Application,
    pub warnings: Vec<String>,
}

/// Corrections applied by [`PlacementWorkflowService::reconcile_capacity`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    #[serde(flatten)]
    pub corrections: ReconciliationPlan,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }
}

/// Facade running each workflow operation as one store transaction followed by
/// best-effort notification dispatch.
pub struct PlacementWorkflowService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    engine: WorkflowEngine,
}

impl<S, N> PlacementWorkflowService<S, N>
where
    S: ApplicationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self::with_engine(store, notifier, WorkflowEngine::new())
    }

    pub fn with_engine(store: Arc<S>, notifier: Arc<N>, engine: WorkflowEngine) -> Self {
        Self {
            store,
            notifier,
            engine,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn submit(&self, request: SubmitApplication) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let student = tx
                .student(&request.student_id)
                .ok_or_else(|| WorkflowError::not_found("student", &request.student_id))?;
            let job = load_job(tx, &request.job_id)?;
            let supervisor = load_supervisor(tx, &request.supervisor_id)?;
            let active = tx.active_application_for(&request.student_id);
            let application_id = tx.next_application_id();

            let (application, events) = self.engine.submit(
                application_id,
                request,
                &student,
                &job,
                &supervisor,
                active.as_ref(),
            )?;
            tx.insert_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("submit", application, events))
    }

    pub fn supervisor_review(
        &self,
        application_id: &ApplicationId,
        supervisor_id: &SupervisorId,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let mut supervisor = load_supervisor(tx, supervisor_id)?;
            let job = load_job(tx, &application.job_id)?;
            let assigned_before = supervisor.current_assigned_students;

            let events = self.engine.supervisor_review(
                &mut application,
                &mut supervisor,
                &job,
                decision,
                comments,
            )?;
            if supervisor.current_assigned_students != assigned_before {
                tx.put_supervisor(supervisor);
            }
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("supervisor_review", application, events))
    }

    pub fn supervisor_reject_with_feedback(
        &self,
        application_id: &ApplicationId,
        supervisor_id: &SupervisorId,
        request: ChangeRequest,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let supervisor = load_supervisor(tx, supervisor_id)?;
            let job = load_job(tx, &application.job_id)?;

            let events = self.engine.supervisor_reject_with_feedback(
                &mut application,
                &supervisor,
                &job,
                request,
            )?;
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("supervisor_reject_with_feedback", application, events))
    }

    pub fn resubmit(
        &self,
        application_id: &ApplicationId,
        student_id: &StudentId,
        patch: ResubmissionPatch,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let student = tx
                .student(student_id)
                .ok_or_else(|| WorkflowError::not_found("student", student_id))?;
            let job = load_job(tx, &application.job_id)?;

            let events = self
                .engine
                .resubmit(&mut application, &student, &job, patch)?;
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("resubmit", application, events))
    }

    pub fn supervisor_approve(
        &self,
        application_id: &ApplicationId,
        supervisor_id: &SupervisorId,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let mut supervisor = load_supervisor(tx, supervisor_id)?;
            let job = load_job(tx, &application.job_id)?;

            let events =
                self.engine
                    .supervisor_approve(&mut application, &mut supervisor, &job)?;
            tx.put_supervisor(supervisor);
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("supervisor_approve", application, events))
    }

    pub fn company_review(
        &self,
        application_id: &ApplicationId,
        company_id: &CompanyId,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let job = load_job(tx, &application.job_id)?;

            let events = self.engine.company_review(
                &mut application,
                &job,
                company_id,
                decision,
                comments,
            )?;
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("company_review", application, events))
    }

    pub fn schedule_interview(
        &self,
        application_id: &ApplicationId,
        company_id: &CompanyId,
        details: InterviewDetails,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let job = load_job(tx, &application.job_id)?;

            let events =
                self.engine
                    .schedule_interview(&mut application, &job, company_id, details)?;
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("schedule_interview", application, events))
    }

    pub fn set_application_status(
        &self,
        application_id: &ApplicationId,
        company_id: &CompanyId,
        status: HiringStatus,
        note: Option<String>,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        let (application, events) = self.store.transaction(|tx| {
            let mut application = load_application(tx, application_id)?;
            let mut job = load_job(tx, &application.job_id)?;

            let mut siblings = Vec::new();
            if status == HiringStatus::Hired {
                for other in tx.applications_for_student(&application.student_id) {
                    if other.application_id == application.application_id {
                        continue;
                    }
                    let other_job = load_job(tx, &other.job_id)?;
                    siblings.push(SiblingApplication {
                        application: other,
                        job_title: other_job.title,
                        company_name: other_job.company_name,
                    });
                }
            }
            let hired_before = job.hired_count;

            let events = self.engine.set_application_status(
                &mut application,
                &mut job,
                company_id,
                status,
                note,
                &mut siblings,
            )?;

            // Superseded siblings go first so the hired snapshot never sits beside
            // another active application of the same student.
            for sibling in siblings {
                tx.put_application(sibling.application)?;
            }
            if job.hired_count != hired_before {
                if !job.is_open() {
                    info!(job_id = %job.job_id, hired = job.hired_count, "job reached its hiring limit and closed");
                }
                tx.put_job(job);
            }
            tx.put_application(application.clone())?;
            Ok((application, events))
        })?;

        Ok(self.finish("set_application_status", application, events))
    }

    /// Recompute supervisor and job counters from the stored applications and write
    /// back only the entries that drifted. Running it twice reports nothing the second time.
    pub fn reconcile_capacity(&self) -> Result<ReconciliationReport, WorkflowError> {
        self.store.transaction(|tx| {
            let applications = tx.applications();
            let supervisors = tx.supervisors();
            let jobs = tx.jobs();
            let plan = CapacityGuard::reconcile(&applications, &supervisors, &jobs);

            for drift in &plan.supervisors {
                warn!(
                    supervisor_id = %drift.supervisor_id,
                    recorded = drift.recorded,
                    actual = drift.actual,
                    "supervisor assignment counter drifted"
                );
                if let Some(mut supervisor) = tx.supervisor(&drift.supervisor_id) {
                    supervisor.current_assigned_students = drift.actual;
                    tx.put_supervisor(supervisor);
                }
            }
            for drift in &plan.jobs {
                warn!(
                    job_id = %drift.job_id,
                    recorded = drift.recorded,
                    actual = drift.actual,
                    "job hired counter drifted"
                );
                if let Some(mut job) = tx.job(&drift.job_id) {
                    job.hired_count = drift.actual;
                    job.status = drift.status;
                    tx.put_job(job);
                }
            }

            Ok(ReconciliationReport { corrections: plan })
        })
    }

    /// Fetch a single application.
    pub fn get(&self, application_id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.store
            .fetch(application_id)?
            .ok_or_else(|| WorkflowError::not_found("application", application_id))
    }

    fn finish(
        &self,
        action: &'static str,
        application: Application,
        events: Vec<NotificationEvent>,
    ) -> WorkflowReceipt {
        info!(
            action,
            application_id = %application.application_id,
            overall_status = application.overall_status().label(),
            application_status = application.application_status().label(),
            "workflow transition committed"
        );
        let warnings = dispatch_all(self.notifier.as_ref(), events);
        WorkflowReceipt {
            application,
            warnings,
        }
    }
}

fn load_application(
    tx: &StoreTransaction<'_>,
    id: &ApplicationId,
) -> Result<Application, WorkflowError> {
    tx.application(id)
        .ok_or_else(|| WorkflowError::not_found("application", id))
}

fn load_job(tx: &StoreTransaction<'_>, id: &JobId) -> Result<JobPosting, WorkflowError> {
    tx.job(id).ok_or_else(|| WorkflowError::not_found("job", id))
}

fn load_supervisor(
    tx: &StoreTransaction<'_>,
    id: &SupervisorId,
) -> Result<SupervisorAccount, WorkflowError> {
    tx.supervisor(id)
        .ok_or_else(|| WorkflowError::not_found("supervisor", id))
}
