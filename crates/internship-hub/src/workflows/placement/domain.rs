use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::RevisionLedger;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupervisorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SupervisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account roles as reported by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Supervisor,
    Company,
    Admin,
}

/// Reference handed back by the file storage collaborator. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Live eligibility data owned by the student directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: StudentId,
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub semester: u8,
    pub cgpa: f32,
    pub attendance: f32,
    pub backlogs: u32,
    pub cv: Option<FileReference>,
    #[serde(default)]
    pub certificates: Vec<FileReference>,
}

/// Denormalized copy of the student's eligibility data frozen onto an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfileSnapshot {
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub semester: u8,
    pub cgpa: f32,
    pub attendance: f32,
    pub backlogs: u32,
    pub cv: Option<FileReference>,
    pub certificates: Vec<FileReference>,
    pub captured_at: DateTime<Utc>,
}

impl StudentProfileSnapshot {
    pub fn capture(profile: &StudentProfile, captured_at: DateTime<Utc>) -> Self {
        Self {
            name: profile.name.clone(),
            roll_number: profile.roll_number.clone(),
            department: profile.department.clone(),
            semester: profile.semester,
            cgpa: profile.cgpa,
            attendance: profile.attendance,
            backlogs: profile.backlogs,
            cv: profile.cv.clone(),
            certificates: profile.certificates.clone(),
            captured_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

/// Job directory entry. `hired_count` is a materialized cache kept in step with hires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub company_name: String,
    pub title: String,
    pub hiring_limit: u32,
    #[serde(default)]
    pub hired_count: u32,
    pub status: JobStatus,
}

impl JobPosting {
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

/// Supervisor directory entry. `current_assigned_students` is a materialized cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorAccount {
    pub supervisor_id: SupervisorId,
    pub name: String,
    pub role: UserRole,
    pub max_students: u32,
    #[serde(default)]
    pub current_assigned_students: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewKind {
    Online,
    OnSite,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewDetails {
    pub kind: InterviewKind,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl InterviewDetails {
    /// Online interviews need a meeting link and on-site ones a location.
    pub fn missing_field(&self) -> Option<&'static str> {
        let blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(|text| text.trim().is_empty())
                .unwrap_or(true)
        };

        match self.kind {
            InterviewKind::Online if blank(&self.meeting_link) => Some("meeting_link"),
            InterviewKind::OnSite if blank(&self.location) => Some("location"),
            _ => None,
        }
    }
}

/// Supervisor feedback attached when changes are requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionFeedback {
    pub reason: String,
    pub details: String,
    pub requested_fixes: Vec<String>,
    pub reviewer_id: SupervisorId,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// Projection shared by the supervisor and company review dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

/// Cross-stage workflow position as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    PendingSupervisor,
    SupervisorApproved,
    SupervisorChangesRequested,
    ResubmittedToSupervisor,
    Approved,
    Rejected,
}

impl OverallStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OverallStatus::PendingSupervisor => "pending_supervisor",
            OverallStatus::SupervisorApproved => "supervisor_approved",
            OverallStatus::SupervisorChangesRequested => "supervisor_changes_requested",
            OverallStatus::ResubmittedToSupervisor => "resubmitted_to_supervisor",
            OverallStatus::Approved => "approved",
            OverallStatus::Rejected => "rejected",
        }
    }
}

/// Company-facing coarse view of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiringStatus {
    Pending,
    InterviewScheduled,
    InterviewDone,
    Hired,
    Rejected,
}

impl HiringStatus {
    pub const fn label(self) -> &'static str {
        match self {
            HiringStatus::Pending => "pending",
            HiringStatus::InterviewScheduled => "interview_scheduled",
            HiringStatus::InterviewDone => "interview_done",
            HiringStatus::Hired => "hired",
            HiringStatus::Rejected => "rejected",
        }
    }
}

/// Interview progress tracked once the company can act on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyProgress {
    Pending,
    InterviewScheduled,
    InterviewDone,
}

impl From<CompanyProgress> for HiringStatus {
    fn from(progress: CompanyProgress) -> Self {
        match progress {
            CompanyProgress::Pending => HiringStatus::Pending,
            CompanyProgress::InterviewScheduled => HiringStatus::InterviewScheduled,
            CompanyProgress::InterviewDone => HiringStatus::InterviewDone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum RejectionSource {
    Supervisor,
    Company,
    /// Closed automatically because the student was hired through another application.
    SupersededByHire { supervisor_approved: bool },
}

/// Canonical workflow position. Every status dimension is a projection of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ApplicationStage {
    PendingSupervisor,
    ChangesRequested,
    ResubmittedToSupervisor,
    SupervisorApproved { progress: CompanyProgress },
    CompanyApproved { progress: CompanyProgress },
    Hired,
    Rejected { source: RejectionSource },
}

impl ApplicationStage {
    pub fn supervisor_status(self) -> ReviewStatus {
        match self {
            ApplicationStage::PendingSupervisor | ApplicationStage::ResubmittedToSupervisor => {
                ReviewStatus::Pending
            }
            ApplicationStage::ChangesRequested => ReviewStatus::Rejected,
            ApplicationStage::SupervisorApproved { .. }
            | ApplicationStage::CompanyApproved { .. }
            | ApplicationStage::Hired => ReviewStatus::Approved,
            ApplicationStage::Rejected { source } => match source {
                RejectionSource::Supervisor => ReviewStatus::Rejected,
                RejectionSource::Company => ReviewStatus::Approved,
                RejectionSource::SupersededByHire {
                    supervisor_approved: true,
                } => ReviewStatus::Approved,
                RejectionSource::SupersededByHire {
                    supervisor_approved: false,
                } => ReviewStatus::Rejected,
            },
        }
    }

    pub fn company_status(self) -> ReviewStatus {
        match self {
            ApplicationStage::CompanyApproved { .. } | ApplicationStage::Hired => {
                ReviewStatus::Approved
            }
            ApplicationStage::Rejected {
                source: RejectionSource::Company | RejectionSource::SupersededByHire { .. },
            } => ReviewStatus::Rejected,
            _ => ReviewStatus::Pending,
        }
    }

    pub fn overall_status(self) -> OverallStatus {
        match self {
            ApplicationStage::PendingSupervisor => OverallStatus::PendingSupervisor,
            ApplicationStage::ChangesRequested => OverallStatus::SupervisorChangesRequested,
            ApplicationStage::ResubmittedToSupervisor => OverallStatus::ResubmittedToSupervisor,
            ApplicationStage::SupervisorApproved { .. } => OverallStatus::SupervisorApproved,
            ApplicationStage::CompanyApproved { .. } | ApplicationStage::Hired => {
                OverallStatus::Approved
            }
            ApplicationStage::Rejected { .. } => OverallStatus::Rejected,
        }
    }

    pub fn application_status(self) -> HiringStatus {
        match self {
            ApplicationStage::SupervisorApproved { progress }
            | ApplicationStage::CompanyApproved { progress } => progress.into(),
            ApplicationStage::Hired => HiringStatus::Hired,
            ApplicationStage::Rejected { .. } => HiringStatus::Rejected,
            _ => HiringStatus::Pending,
        }
    }

    /// Waiting on a supervisor decision (first review or re-review).
    pub fn awaiting_supervisor(self) -> bool {
        matches!(
            self,
            ApplicationStage::PendingSupervisor | ApplicationStage::ResubmittedToSupervisor
        )
    }

    /// Counts towards the single-active-application rule. Hired applications stay active.
    pub fn is_active(self) -> bool {
        !matches!(self, ApplicationStage::Rejected { .. })
    }

    /// No further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStage::Rejected { .. } | ApplicationStage::Hired
        )
    }

    pub fn company_progress(self) -> Option<CompanyProgress> {
        match self {
            ApplicationStage::SupervisorApproved { progress }
            | ApplicationStage::CompanyApproved { progress } => Some(progress),
            _ => None,
        }
    }
}

/// Who performed a recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Student(StudentId),
    Supervisor(SupervisorId),
    Company(CompanyId),
    System,
}

/// One committed transition in the application's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OverallStatus,
    pub to: OverallStatus,
    pub application_status: HiringStatus,
    pub actor: Actor,
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

/// Application aggregate: one student's submission for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub job_id: JobId,
    pub supervisor_id: SupervisorId,
    pub company_id: CompanyId,
    pub stage: ApplicationStage,
    pub student_profile_snapshot: StudentProfileSnapshot,
    pub cover_letter: Option<String>,
    pub interview_details: Option<InterviewDetails>,
    pub rejection_feedback: Option<RejectionFeedback>,
    pub supervisor_comments: Option<String>,
    pub company_comments: Option<String>,
    #[serde(default)]
    pub revisions: RevisionLedger,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub hiring_date: Option<DateTime<Utc>>,
    pub is_currently_hired: bool,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn supervisor_status(&self) -> ReviewStatus {
        self.stage.supervisor_status()
    }

    pub fn company_status(&self) -> ReviewStatus {
        self.stage.company_status()
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.stage.overall_status()
    }

    pub fn application_status(&self) -> HiringStatus {
        self.stage.application_status()
    }

    pub fn is_active(&self) -> bool {
        self.stage.is_active()
    }

    /// Move to `next`, recording the change in the audit trail.
    pub(crate) fn advance(
        &mut self,
        next: ApplicationStage,
        actor: Actor,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) {
        let from = self.overall_status();
        self.stage = next;
        self.updated_at = at;
        self.history.push(StatusChange {
            from,
            to: next.overall_status(),
            application_status: next.application_status(),
            actor,
            comment,
            at,
        });
    }

    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            supervisor_status: self.supervisor_status(),
            company_status: self.company_status(),
            overall_status: self.overall_status(),
            application_status: self.application_status(),
            application: self.clone(),
        }
    }
}

/// Application with its derived status dimensions spelled out for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub supervisor_status: ReviewStatus,
    pub company_status: ReviewStatus,
    pub overall_status: OverallStatus,
    pub application_status: HiringStatus,
}
