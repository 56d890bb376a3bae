//! Application lifecycle state machine.
//!
//! Every operation validates its preconditions before touching the application, so a
//! rejected call leaves its inputs untouched. Operations return the notification
//! events the caller should dispatch once the new snapshot is committed.
//!
//! Transition table (overall status):
//!
//! ```text
//! pending_supervisor ──approve──▶ supervisor_approved ──company approve──▶ approved ──hire──▶ (hired)
//!        │  ▲                         │                                        │
//!        │  └── resubmitted ◀─resubmit─ changes_requested                      │
//!        ├──request changes──────────▶┘                                        │
//!        └──reject──▶ rejected ◀──company reject / superseded by hire ◀────────┘
//! ```

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capacity::CapacityGuard;
use super::domain::{
    Actor, Application, ApplicationId, ApplicationStage, CompanyId, CompanyProgress,
    FileReference, HiringStatus, InterviewDetails, JobId, JobPosting, RejectionFeedback,
    RejectionSource, ReviewDecision, ReviewStatus, StudentId, StudentProfile,
    StudentProfileSnapshot, SupervisorAccount, SupervisorId, UserRole,
};
use super::error::WorkflowError;
use super::ledger::{FieldChange, RevisionLedger};
use super::notifications::{NotificationEvent, NotificationKind};

/// Comment written onto applications closed because the student was hired elsewhere.
pub const SUPERSEDED_BY_HIRE_COMMENT: &str =
    "Closed automatically: the student accepted another internship offer.";

pub type Clock = fn() -> DateTime<Utc>;

/// Student request to open a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub student_id: StudentId,
    pub job_id: JobId,
    pub supervisor_id: SupervisorId,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

/// Supervisor feedback requesting changes before re-review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub reason: String,
    pub details: String,
    #[serde(default)]
    pub requested_fixes: Vec<String>,
}

/// Partial update sent with a resubmission. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResubmissionPatch {
    pub cover_letter: Option<String>,
    pub department: Option<String>,
    pub semester: Option<u8>,
    pub cgpa: Option<f32>,
    pub attendance: Option<f32>,
    pub backlogs: Option<u32>,
    pub cv: Option<FileReference>,
    pub certificates: Option<Vec<FileReference>>,
    pub note: Option<String>,
}

impl ResubmissionPatch {
    fn apply_to(&self, snapshot: &mut StudentProfileSnapshot) {
        if let Some(department) = &self.department {
            snapshot.department = department.clone();
        }
        if let Some(semester) = self.semester {
            snapshot.semester = semester;
        }
        if let Some(cgpa) = self.cgpa {
            snapshot.cgpa = cgpa;
        }
        if let Some(attendance) = self.attendance {
            snapshot.attendance = attendance;
        }
        if let Some(backlogs) = self.backlogs {
            snapshot.backlogs = backlogs;
        }
        if let Some(cv) = &self.cv {
            snapshot.cv = Some(cv.clone());
        }
        if let Some(certificates) = &self.certificates {
            snapshot.certificates = certificates.clone();
        }
    }
}

/// Another application of the same student, with the labels needed to notify its owners.
#[derive(Debug, Clone)]
pub struct SiblingApplication {
    pub application: Application,
    pub job_title: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowEngine {
    clock: Clock,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn submit(
        &self,
        application_id: ApplicationId,
        request: SubmitApplication,
        student: &StudentProfile,
        job: &JobPosting,
        supervisor: &SupervisorAccount,
        active: Option<&Application>,
    ) -> Result<(Application, Vec<NotificationEvent>), WorkflowError> {
        if let Some(existing) = active {
            return Err(WorkflowError::Conflict(format!(
                "student {} already has active application {}",
                existing.student_id, existing.application_id
            )));
        }
        if supervisor.role != UserRole::Supervisor {
            return Err(WorkflowError::not_found(
                "supervisor",
                &supervisor.supervisor_id,
            ));
        }
        CapacityGuard::ensure_job_accepts_applications(job)?;

        let now = self.now();
        let cover_letter = request.cover_letter.and_then(non_blank);
        let snapshot = StudentProfileSnapshot::capture(student, now);
        let revisions = RevisionLedger::seeded(&snapshot, cover_letter.as_deref(), now);

        let mut application = Application {
            application_id,
            student_id: request.student_id,
            job_id: job.job_id.clone(),
            supervisor_id: supervisor.supervisor_id.clone(),
            company_id: job.company_id.clone(),
            stage: ApplicationStage::PendingSupervisor,
            student_profile_snapshot: snapshot,
            cover_letter,
            interview_details: None,
            rejection_feedback: None,
            supervisor_comments: None,
            company_comments: None,
            revisions,
            history: Vec::new(),
            hiring_date: None,
            is_currently_hired: false,
            submitted_at: now,
            updated_at: now,
        };
        application.advance(
            ApplicationStage::PendingSupervisor,
            Actor::Student(application.student_id.clone()),
            Some("submitted".to_string()),
            now,
        );

        let student_name = application.student_profile_snapshot.name.clone();
        let events = vec![notify(
            &application,
            job,
            &supervisor.supervisor_id,
            NotificationKind::ApplicationSubmitted,
            &student_name,
            format!(
                "{student_name} applied for {} at {} and is awaiting your review",
                job.title, job.company_name
            ),
        )];

        Ok((application, events))
    }

    /// Single-call supervisor decision. Approval takes a supervision slot exactly like
    /// [`WorkflowEngine::supervisor_approve`].
    pub fn supervisor_review(
        &self,
        application: &mut Application,
        supervisor: &mut SupervisorAccount,
        job: &JobPosting,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_supervisor_owner(application, supervisor)?;
        if !application.stage.awaiting_supervisor() {
            return Err(WorkflowError::invalid_state(
                "review",
                application.overall_status(),
            ));
        }

        match decision {
            ReviewDecision::Approved => self.approve(application, supervisor, job, comments),
            ReviewDecision::Rejected => {
                let now = self.now();
                let comments = comments.and_then(non_blank);
                application.supervisor_comments = comments.clone();
                application.advance(
                    ApplicationStage::Rejected {
                        source: RejectionSource::Supervisor,
                    },
                    Actor::Supervisor(supervisor.supervisor_id.clone()),
                    comments,
                    now,
                );

                Ok(vec![notify(
                    application,
                    job,
                    &application.student_id,
                    NotificationKind::SupervisorRejected,
                    &supervisor.name,
                    format!(
                        "{} rejected your application for {} at {}",
                        supervisor.name, job.title, job.company_name
                    ),
                )])
            }
        }
    }

    pub fn supervisor_approve(
        &self,
        application: &mut Application,
        supervisor: &mut SupervisorAccount,
        job: &JobPosting,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_supervisor_owner(application, supervisor)?;
        if !application.stage.awaiting_supervisor() {
            return Err(WorkflowError::invalid_state(
                "approve",
                application.overall_status(),
            ));
        }
        self.approve(application, supervisor, job, None)
    }

    fn approve(
        &self,
        application: &mut Application,
        supervisor: &mut SupervisorAccount,
        job: &JobPosting,
        comments: Option<String>,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        CapacityGuard::reserve_supervisor_slot(supervisor)?;

        let now = self.now();
        let comments = comments.and_then(non_blank);
        if comments.is_some() {
            application.supervisor_comments = comments.clone();
        }
        application.advance(
            ApplicationStage::SupervisorApproved {
                progress: CompanyProgress::Pending,
            },
            Actor::Supervisor(supervisor.supervisor_id.clone()),
            comments,
            now,
        );

        let student_name = application.student_profile_snapshot.name.clone();
        Ok(vec![
            notify(
                application,
                job,
                &application.student_id,
                NotificationKind::SupervisorApproved,
                &supervisor.name,
                format!(
                    "{} approved your application for {}; it has been forwarded to {}",
                    supervisor.name, job.title, job.company_name
                ),
            ),
            notify(
                application,
                job,
                &application.company_id,
                NotificationKind::ForwardedToCompany,
                &supervisor.name,
                format!(
                    "{student_name}'s application for {} was approved by their supervisor",
                    job.title
                ),
            ),
        ])
    }

    pub fn supervisor_reject_with_feedback(
        &self,
        application: &mut Application,
        supervisor: &SupervisorAccount,
        job: &JobPosting,
        request: ChangeRequest,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_supervisor_owner(application, supervisor)?;
        if !application.stage.awaiting_supervisor() {
            return Err(WorkflowError::invalid_state(
                "request changes",
                application.overall_status(),
            ));
        }
        let reason = non_blank(request.reason)
            .ok_or_else(|| WorkflowError::Validation("rejection reason is required".to_string()))?;
        let details = non_blank(request.details).ok_or_else(|| {
            WorkflowError::Validation("rejection details are required".to_string())
        })?;

        let now = self.now();
        let snapshot = application.student_profile_snapshot.clone();
        let cover_letter = application.cover_letter.clone();
        application
            .revisions
            .ensure_seeded(&snapshot, cover_letter.as_deref(), now);
        application.rejection_feedback = Some(RejectionFeedback {
            reason: reason.clone(),
            details,
            requested_fixes: request
                .requested_fixes
                .into_iter()
                .filter_map(non_blank)
                .collect(),
            reviewer_id: supervisor.supervisor_id.clone(),
            rejected_at: now,
        });
        application.advance(
            ApplicationStage::ChangesRequested,
            Actor::Supervisor(supervisor.supervisor_id.clone()),
            Some(reason.clone()),
            now,
        );

        Ok(vec![notify(
            application,
            job,
            &application.student_id,
            NotificationKind::ChangesRequested,
            &supervisor.name,
            format!(
                "{} requested changes to your application for {}: {reason}",
                supervisor.name, job.title
            ),
        )])
    }

    pub fn resubmit(
        &self,
        application: &mut Application,
        student: &StudentProfile,
        job: &JobPosting,
        patch: ResubmissionPatch,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        if application.student_id != student.student_id {
            return Err(WorkflowError::Forbidden(format!(
                "application {} does not belong to student {}",
                application.application_id, student.student_id
            )));
        }
        if application.stage != ApplicationStage::ChangesRequested {
            return Err(WorkflowError::invalid_state(
                "resubmit",
                application.overall_status(),
            ));
        }

        let now = self.now();
        let previous_snapshot = application.student_profile_snapshot.clone();
        let previous_cover_letter = application.cover_letter.clone();

        let mut snapshot = StudentProfileSnapshot::capture(student, now);
        patch.apply_to(&mut snapshot);
        let cover_letter = match patch.cover_letter.clone() {
            Some(letter) => non_blank(letter),
            None => previous_cover_letter.clone(),
        };

        let mut changes = snapshot_changes(&previous_snapshot, &snapshot);
        changes.extend(FieldChange::between(
            "cover_letter",
            &previous_cover_letter,
            &cover_letter,
        ));

        application.revisions.ensure_seeded(
            &previous_snapshot,
            previous_cover_letter.as_deref(),
            now,
        );
        let note = patch.note.and_then(non_blank);
        let addressed = application.rejection_feedback.take();
        application
            .revisions
            .append_resubmission(changes, note.clone(), addressed, now);

        application.student_profile_snapshot = snapshot;
        application.cover_letter = cover_letter;
        application.advance(
            ApplicationStage::ResubmittedToSupervisor,
            Actor::Student(student.student_id.clone()),
            note,
            now,
        );

        Ok(vec![notify(
            application,
            job,
            &application.supervisor_id,
            NotificationKind::ApplicationResubmitted,
            &student.name,
            format!(
                "{} resubmitted their application for {} after your feedback",
                student.name, job.title
            ),
        )])
    }

    pub fn company_review(
        &self,
        application: &mut Application,
        job: &JobPosting,
        company_id: &CompanyId,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_company_owner(application, company_id)?;
        let progress = match application.stage {
            ApplicationStage::SupervisorApproved { progress } => progress,
            other => {
                return Err(WorkflowError::invalid_state(
                    "review as company",
                    other.overall_status(),
                ))
            }
        };

        let now = self.now();
        let comments = comments.and_then(non_blank);
        application.company_comments = comments.clone();
        let actor = Actor::Company(company_id.clone());

        match decision {
            ReviewDecision::Approved => {
                application.advance(
                    ApplicationStage::CompanyApproved { progress },
                    actor,
                    comments,
                    now,
                );
                let student_name = application.student_profile_snapshot.name.clone();
                Ok(vec![
                    notify(
                        application,
                        job,
                        &application.student_id,
                        NotificationKind::CompanyApproved,
                        &job.company_name,
                        format!(
                            "{} approved your application for {}",
                            job.company_name, job.title
                        ),
                    ),
                    notify(
                        application,
                        job,
                        &application.supervisor_id,
                        NotificationKind::CompanyApproved,
                        &job.company_name,
                        format!(
                            "{} approved {student_name}'s application for {}",
                            job.company_name, job.title
                        ),
                    ),
                ])
            }
            ReviewDecision::Rejected => {
                application.advance(
                    ApplicationStage::Rejected {
                        source: RejectionSource::Company,
                    },
                    actor,
                    comments,
                    now,
                );
                Ok(vec![notify(
                    application,
                    job,
                    &application.student_id,
                    NotificationKind::CompanyRejected,
                    &job.company_name,
                    format!(
                        "{} declined your application for {}",
                        job.company_name, job.title
                    ),
                )])
            }
        }
    }

    pub fn schedule_interview(
        &self,
        application: &mut Application,
        job: &JobPosting,
        company_id: &CompanyId,
        details: InterviewDetails,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_company_owner(application, company_id)?;
        let next = match application.stage {
            ApplicationStage::SupervisorApproved { .. } => ApplicationStage::SupervisorApproved {
                progress: CompanyProgress::InterviewScheduled,
            },
            ApplicationStage::CompanyApproved { .. } => ApplicationStage::CompanyApproved {
                progress: CompanyProgress::InterviewScheduled,
            },
            stage if stage.is_terminal() => {
                return Err(WorkflowError::invalid_state(
                    "schedule an interview",
                    stage.overall_status(),
                ))
            }
            _ => {
                return Err(WorkflowError::Forbidden(
                    "interviews can only be scheduled after supervisor approval".to_string(),
                ))
            }
        };
        if let Some(field) = details.missing_field() {
            return Err(WorkflowError::Validation(format!(
                "interview details require {field}"
            )));
        }

        let now = self.now();
        let scheduled_at = details.scheduled_at;
        let notes = details.notes.clone();
        application.interview_details = Some(details);
        application.advance(next, Actor::Company(company_id.clone()), notes, now);

        Ok(vec![notify(
            application,
            job,
            &application.student_id,
            NotificationKind::InterviewScheduled,
            &job.company_name,
            format!(
                "{} scheduled an interview for {} on {}",
                job.company_name,
                job.title,
                scheduled_at.format("%Y-%m-%d %H:%M UTC")
            ),
        )])
    }

    /// Company-facing status update. `Hired` consumes a hiring slot on `job` and
    /// force-rejects every other active application in `siblings`.
    pub fn set_application_status(
        &self,
        application: &mut Application,
        job: &mut JobPosting,
        company_id: &CompanyId,
        status: HiringStatus,
        note: Option<String>,
        siblings: &mut [SiblingApplication],
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        ensure_company_owner(application, company_id)?;
        if application.stage.is_terminal() {
            return Err(WorkflowError::invalid_state(
                "update the hiring status",
                application.overall_status(),
            ));
        }
        let Some(current_progress) = application.stage.company_progress() else {
            return Err(WorkflowError::Forbidden(
                "hiring status can only change after supervisor approval".to_string(),
            ));
        };

        let now = self.now();
        let note = note.and_then(non_blank);
        let actor = Actor::Company(company_id.clone());

        let progress = match status {
            HiringStatus::Pending => CompanyProgress::Pending,
            HiringStatus::InterviewScheduled => CompanyProgress::InterviewScheduled,
            HiringStatus::InterviewDone => CompanyProgress::InterviewDone,
            HiringStatus::Rejected => {
                if note.is_some() {
                    application.company_comments = note.clone();
                }
                application.advance(
                    ApplicationStage::Rejected {
                        source: RejectionSource::Company,
                    },
                    actor,
                    note,
                    now,
                );
                return Ok(vec![notify(
                    application,
                    job,
                    &application.student_id,
                    NotificationKind::CompanyRejected,
                    &job.company_name,
                    format!(
                        "{} declined your application for {}",
                        job.company_name, job.title
                    ),
                )]);
            }
            HiringStatus::Hired => {
                return self.hire(application, job, actor, note, siblings, now);
            }
        };

        let next = match application.stage {
            ApplicationStage::CompanyApproved { .. } => ApplicationStage::CompanyApproved { progress },
            _ => ApplicationStage::SupervisorApproved { progress },
        };
        application.advance(next, actor, note, now);

        Ok(vec![notify(
            application,
            job,
            &application.student_id,
            NotificationKind::StatusUpdated,
            &job.company_name,
            format!(
                "{} moved your application for {} from {} to {}",
                job.company_name,
                job.title,
                HiringStatus::from(current_progress).label(),
                status.label()
            ),
        )])
    }

    fn hire(
        &self,
        application: &mut Application,
        job: &mut JobPosting,
        actor: Actor,
        note: Option<String>,
        siblings: &mut [SiblingApplication],
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationEvent>, WorkflowError> {
        if let Some(hired) = siblings.iter().find(|sibling| {
            sibling.application.application_id != application.application_id
                && sibling.application.stage == ApplicationStage::Hired
        }) {
            return Err(WorkflowError::Conflict(format!(
                "student {} is already hired through application {}",
                application.student_id, hired.application.application_id
            )));
        }
        CapacityGuard::reserve_hire(job)?;

        application.hiring_date = Some(now);
        application.is_currently_hired = true;
        application.advance(ApplicationStage::Hired, actor, note, now);

        let student_name = application.student_profile_snapshot.name.clone();
        let mut events = vec![
            notify(
                application,
                job,
                &application.student_id,
                NotificationKind::Hired,
                &job.company_name,
                format!(
                    "Congratulations! {} hired you for {}",
                    job.company_name, job.title
                ),
            ),
            notify(
                application,
                job,
                &application.supervisor_id,
                NotificationKind::Hired,
                &job.company_name,
                format!(
                    "{student_name} was hired by {} for {}",
                    job.company_name, job.title
                ),
            ),
        ];

        for sibling in siblings.iter_mut() {
            let other = &mut sibling.application;
            if other.application_id == application.application_id || !other.is_active() {
                continue;
            }

            let supervisor_approved = other.supervisor_status() == ReviewStatus::Approved;
            other.company_comments = Some(SUPERSEDED_BY_HIRE_COMMENT.to_string());
            other.advance(
                ApplicationStage::Rejected {
                    source: RejectionSource::SupersededByHire {
                        supervisor_approved,
                    },
                },
                Actor::System,
                Some(SUPERSEDED_BY_HIRE_COMMENT.to_string()),
                now,
            );

            let message = format!(
                "{student_name}'s application for {} at {} was closed because they accepted another offer",
                sibling.job_title, sibling.company_name
            );
            for target in [other.company_id.0.clone(), other.supervisor_id.0.clone()] {
                events.push(NotificationEvent {
                    target_user_id: target,
                    application_id: other.application_id.clone(),
                    kind: NotificationKind::ApplicationSuperseded,
                    actor_name: job.company_name.clone(),
                    job_title: sibling.job_title.clone(),
                    company_name: sibling.company_name.clone(),
                    message: message.clone(),
                });
            }
        }

        Ok(events)
    }
}

fn ensure_supervisor_owner(
    application: &Application,
    supervisor: &SupervisorAccount,
) -> Result<(), WorkflowError> {
    if application.supervisor_id != supervisor.supervisor_id {
        return Err(WorkflowError::Forbidden(format!(
            "supervisor {} is not assigned to application {}",
            supervisor.supervisor_id, application.application_id
        )));
    }
    Ok(())
}

fn ensure_company_owner(
    application: &Application,
    company_id: &CompanyId,
) -> Result<(), WorkflowError> {
    if &application.company_id != company_id {
        return Err(WorkflowError::Forbidden(format!(
            "company {company_id} does not own application {}",
            application.application_id
        )));
    }
    Ok(())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn snapshot_changes(
    previous: &StudentProfileSnapshot,
    current: &StudentProfileSnapshot,
) -> Vec<FieldChange> {
    [
        FieldChange::between("name", &previous.name, &current.name),
        FieldChange::between("roll_number", &previous.roll_number, &current.roll_number),
        FieldChange::between("department", &previous.department, &current.department),
        FieldChange::between("semester", &previous.semester, &current.semester),
        FieldChange::between("cgpa", &previous.cgpa, &current.cgpa),
        FieldChange::between("attendance", &previous.attendance, &current.attendance),
        FieldChange::between("backlogs", &previous.backlogs, &current.backlogs),
        FieldChange::between("cv", &previous.cv, &current.cv),
        FieldChange::between("certificates", &previous.certificates, &current.certificates),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn notify(
    application: &Application,
    job: &JobPosting,
    target: &impl Display,
    kind: NotificationKind,
    actor_name: &str,
    message: String,
) -> NotificationEvent {
    NotificationEvent {
        target_user_id: target.to_string(),
        application_id: application.application_id.clone(),
        kind,
        actor_name: actor_name.to_string(),
        job_title: job.title.clone(),
        company_name: job.company_name.clone(),
        message,
    }
}
