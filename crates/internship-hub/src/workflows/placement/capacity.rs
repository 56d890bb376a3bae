use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{
    Application, HiringStatus, JobId, JobPosting, JobStatus, ReviewStatus, SupervisorAccount,
    SupervisorId,
};

/// Raised when a supervisor or job headcount limit would be exceeded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("supervisor {supervisor_id} already supervises the maximum of {max_students} student(s)")]
    SupervisorFull {
        supervisor_id: SupervisorId,
        max_students: u32,
    },
    #[error("job {job_id} is closed")]
    JobClosed { job_id: JobId },
    #[error("job {job_id} has reached its hiring limit of {hiring_limit}")]
    HiringLimitReached { job_id: JobId, hiring_limit: u32 },
}

/// Stateless headcount checks. Callers run these against the copies staged in the
/// same store transaction that commits the triggering transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityGuard;

impl CapacityGuard {
    pub fn ensure_supervisor_capacity(supervisor: &SupervisorAccount) -> Result<(), CapacityError> {
        if supervisor.current_assigned_students >= supervisor.max_students {
            return Err(CapacityError::SupervisorFull {
                supervisor_id: supervisor.supervisor_id.clone(),
                max_students: supervisor.max_students,
            });
        }
        Ok(())
    }

    /// Check and take one supervision slot.
    pub fn reserve_supervisor_slot(supervisor: &mut SupervisorAccount) -> Result<(), CapacityError> {
        Self::ensure_supervisor_capacity(supervisor)?;
        supervisor.current_assigned_students += 1;
        Ok(())
    }

    /// A job accepts submissions while it is open and below its hiring limit.
    pub fn ensure_job_accepts_applications(job: &JobPosting) -> Result<(), CapacityError> {
        if !job.is_open() {
            return Err(CapacityError::JobClosed {
                job_id: job.job_id.clone(),
            });
        }
        if job.hired_count >= job.hiring_limit {
            return Err(CapacityError::HiringLimitReached {
                job_id: job.job_id.clone(),
                hiring_limit: job.hiring_limit,
            });
        }
        Ok(())
    }

    /// Check and take one hiring slot, closing the job when the limit is reached.
    /// Returns `true` when this hire closed the job.
    pub fn reserve_hire(job: &mut JobPosting) -> Result<bool, CapacityError> {
        Self::ensure_job_accepts_applications(job)?;
        job.hired_count += 1;
        if job.hired_count >= job.hiring_limit {
            job.status = JobStatus::Closed;
            return Ok(true);
        }
        Ok(false)
    }

    /// Recompute both materialized counters from the authoritative applications and
    /// report only the entries that drifted.
    pub fn reconcile<'a>(
        applications: impl IntoIterator<Item = &'a Application>,
        supervisors: impl IntoIterator<Item = &'a SupervisorAccount>,
        jobs: impl IntoIterator<Item = &'a JobPosting>,
    ) -> ReconciliationPlan {
        let mut approved: BTreeMap<&SupervisorId, u32> = BTreeMap::new();
        let mut hired: BTreeMap<&JobId, u32> = BTreeMap::new();

        for application in applications {
            if application.supervisor_status() == ReviewStatus::Approved {
                *approved.entry(&application.supervisor_id).or_default() += 1;
            }
            if application.application_status() == HiringStatus::Hired {
                *hired.entry(&application.job_id).or_default() += 1;
            }
        }

        let supervisors = supervisors
            .into_iter()
            .filter_map(|supervisor| {
                let actual = approved
                    .get(&supervisor.supervisor_id)
                    .copied()
                    .unwrap_or(0);
                (actual != supervisor.current_assigned_students).then(|| SupervisorDrift {
                    supervisor_id: supervisor.supervisor_id.clone(),
                    recorded: supervisor.current_assigned_students,
                    actual,
                })
            })
            .collect();

        let jobs = jobs
            .into_iter()
            .filter_map(|job| {
                let actual = hired.get(&job.job_id).copied().unwrap_or(0);
                // A job closed by its owner stays closed; only the limit closes it here.
                let status = if actual >= job.hiring_limit {
                    JobStatus::Closed
                } else {
                    job.status
                };
                (actual != job.hired_count || status != job.status).then(|| JobDrift {
                    job_id: job.job_id.clone(),
                    recorded: job.hired_count,
                    actual,
                    status,
                })
            })
            .collect();

        ReconciliationPlan { supervisors, jobs }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorDrift {
    pub supervisor_id: SupervisorId,
    pub recorded: u32,
    pub actual: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDrift {
    pub job_id: JobId,
    pub recorded: u32,
    pub actual: u32,
    pub status: JobStatus,
}

/// Corrections produced by [`CapacityGuard::reconcile`]. Empty when nothing drifted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub supervisors: Vec<SupervisorDrift>,
    pub jobs: Vec<JobDrift>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty() && self.jobs.is_empty()
    }
}
