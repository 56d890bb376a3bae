use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    Application, ApplicationId, JobId, JobPosting, StudentId, StudentProfile, SupervisorAccount,
    SupervisorId,
};
use super::error::WorkflowError;

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for the application aggregate and the directory read models
/// whose counters change alongside it.
///
/// `transaction` is the unit of atomicity: the closure observes a consistent snapshot,
/// stages writes, and either every staged write is committed or none is.
pub trait ApplicationStore: Send + Sync {
    fn transaction<T, F>(&self, op: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> Result<T, WorkflowError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
}

/// Committed contents of a store.
#[derive(Debug, Clone, Default)]
pub struct PlacementState {
    applications: BTreeMap<ApplicationId, Application>,
    by_student: BTreeMap<StudentId, BTreeSet<ApplicationId>>,
    jobs: BTreeMap<JobId, JobPosting>,
    supervisors: BTreeMap<SupervisorId, SupervisorAccount>,
    students: BTreeMap<StudentId, StudentProfile>,
    application_sequence: u64,
}

impl PlacementState {
    fn apply(&mut self, writes: PlacementState) {
        for application in writes.applications.into_values() {
            self.put_application(application);
        }
        self.jobs.extend(writes.jobs);
        self.supervisors.extend(writes.supervisors);
        self.students.extend(writes.students);
        self.application_sequence = self.application_sequence.max(writes.application_sequence);
    }

    fn put_application(&mut self, application: Application) {
        if let Some(sequence) = sequence_of(&application.application_id) {
            self.application_sequence = self.application_sequence.max(sequence);
        }
        if let Some(previous) = self.applications.get(&application.application_id) {
            if previous.student_id != application.student_id {
                if let Some(ids) = self.by_student.get_mut(&previous.student_id) {
                    ids.remove(&application.application_id);
                }
            }
        }
        self.by_student
            .entry(application.student_id.clone())
            .or_default()
            .insert(application.application_id.clone());
        self.applications
            .insert(application.application_id.clone(), application);
    }

    fn student_applications<'s>(
        &'s self,
        student_id: &StudentId,
    ) -> impl Iterator<Item = &'s Application> + 's {
        self.by_student
            .get(student_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.applications.get(id))
    }
}

const APPLICATION_ID_PREFIX: &str = "app-";

fn sequence_of(id: &ApplicationId) -> Option<u64> {
    id.0.strip_prefix(APPLICATION_ID_PREFIX)?.parse().ok()
}

/// Read-your-writes view over a committed state plus the writes staged so far.
pub struct StoreTransaction<'a> {
    base: &'a PlacementState,
    staged: PlacementState,
}

impl<'a> StoreTransaction<'a> {
    pub fn new(base: &'a PlacementState) -> Self {
        Self {
            base,
            staged: PlacementState::default(),
        }
    }

    pub fn application(&self, id: &ApplicationId) -> Option<Application> {
        self.staged
            .applications
            .get(id)
            .or_else(|| self.base.applications.get(id))
            .cloned()
    }

    pub fn job(&self, id: &JobId) -> Option<JobPosting> {
        self.staged
            .jobs
            .get(id)
            .or_else(|| self.base.jobs.get(id))
            .cloned()
    }

    pub fn supervisor(&self, id: &SupervisorId) -> Option<SupervisorAccount> {
        self.staged
            .supervisors
            .get(id)
            .or_else(|| self.base.supervisors.get(id))
            .cloned()
    }

    pub fn student(&self, id: &StudentId) -> Option<StudentProfile> {
        self.staged
            .students
            .get(id)
            .or_else(|| self.base.students.get(id))
            .cloned()
    }

    pub fn applications(&self) -> Vec<Application> {
        merged(&self.base.applications, &self.staged.applications)
    }

    pub fn jobs(&self) -> Vec<JobPosting> {
        merged(&self.base.jobs, &self.staged.jobs)
    }

    pub fn supervisors(&self) -> Vec<SupervisorAccount> {
        merged(&self.base.supervisors, &self.staged.supervisors)
    }

    /// Staged copies win over committed ones. Committed records are reached through the
    /// per-student index.
    fn student_applications<'s>(
        &'s self,
        student_id: &'s StudentId,
    ) -> impl Iterator<Item = &'s Application> + 's {
        let staged_writes: &'s BTreeMap<ApplicationId, Application> = &self.staged.applications;
        let base: &'s PlacementState = self.base;
        let staged = staged_writes
            .values()
            .filter(move |application| &application.student_id == student_id);
        let committed = base
            .student_applications(student_id)
            .filter(move |application| !staged_writes.contains_key(&application.application_id));
        staged.chain(committed)
    }

    pub fn applications_for_student(&self, student_id: &StudentId) -> Vec<Application> {
        let mut applications: Vec<Application> =
            self.student_applications(student_id).cloned().collect();
        applications.sort_by(|left, right| left.application_id.cmp(&right.application_id));
        applications
    }

    pub fn active_application_for(&self, student_id: &StudentId) -> Option<Application> {
        self.student_applications(student_id)
            .filter(|application| application.is_active())
            .min_by(|left, right| left.application_id.cmp(&right.application_id))
            .cloned()
    }

    fn contains_application(&self, id: &ApplicationId) -> bool {
        self.staged.applications.contains_key(id) || self.base.applications.contains_key(id)
    }

    /// Allocate the next `app-NNNNNN` identifier. Identifiers already present, for
    /// example imported records, are skipped.
    pub fn next_application_id(&mut self) -> ApplicationId {
        let mut sequence = self
            .base
            .application_sequence
            .max(self.staged.application_sequence);
        loop {
            sequence += 1;
            let id = ApplicationId(format!("{APPLICATION_ID_PREFIX}{sequence:06}"));
            if !self.contains_application(&id) {
                self.staged.application_sequence = sequence;
                return id;
            }
        }
    }

    /// Stage a new application. Refuses a second active application for the student.
    pub fn insert_application(&mut self, application: Application) -> Result<(), WorkflowError> {
        if self.contains_application(&application.application_id) {
            return Err(RepositoryError::Conflict.into());
        }
        self.ensure_single_active(&application)?;
        self.staged
            .applications
            .insert(application.application_id.clone(), application);
        Ok(())
    }

    /// Stage a new snapshot of an existing application.
    pub fn put_application(&mut self, application: Application) -> Result<(), WorkflowError> {
        if !self.contains_application(&application.application_id) {
            return Err(RepositoryError::NotFound.into());
        }
        self.ensure_single_active(&application)?;
        self.staged
            .applications
            .insert(application.application_id.clone(), application);
        Ok(())
    }

    pub fn put_job(&mut self, job: JobPosting) {
        self.staged.jobs.insert(job.job_id.clone(), job);
    }

    pub fn put_supervisor(&mut self, supervisor: SupervisorAccount) {
        self.staged
            .supervisors
            .insert(supervisor.supervisor_id.clone(), supervisor);
    }

    fn ensure_single_active(&self, application: &Application) -> Result<(), WorkflowError> {
        if !application.is_active() {
            return Ok(());
        }

        let clash = self
            .student_applications(&application.student_id)
            .find(|other| other.application_id != application.application_id && other.is_active());

        match clash {
            Some(other) => Err(WorkflowError::Conflict(format!(
                "student {} already has active application {}",
                application.student_id, other.application_id
            ))),
            None => Ok(()),
        }
    }

    pub fn into_writes(self) -> PlacementState {
        self.staged
    }
}

fn merged<K: Ord, V: Clone>(base: &BTreeMap<K, V>, staged: &BTreeMap<K, V>) -> Vec<V> {
    let mut combined: BTreeMap<&K, &V> = base.iter().collect();
    combined.extend(staged.iter());
    combined.into_values().cloned().collect()
}

/// Process-local store. One mutex serializes every transaction, so concurrent writers
/// on the same application or the same capacity counter observe each other's commits.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    state: Mutex<PlacementState>,
}

impl InMemoryApplicationStore {
    fn lock(&self) -> Result<MutexGuard<'_, PlacementState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn register_job(&self, job: JobPosting) -> Result<(), RepositoryError> {
        self.lock()?.jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    pub fn register_supervisor(&self, supervisor: SupervisorAccount) -> Result<(), RepositoryError> {
        self.lock()?
            .supervisors
            .insert(supervisor.supervisor_id.clone(), supervisor);
        Ok(())
    }

    pub fn register_student(&self, profile: StudentProfile) -> Result<(), RepositoryError> {
        self.lock()?
            .students
            .insert(profile.student_id.clone(), profile);
        Ok(())
    }

    pub fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    pub fn supervisor(&self, id: &SupervisorId) -> Result<Option<SupervisorAccount>, RepositoryError> {
        Ok(self.lock()?.supervisors.get(id).cloned())
    }

    pub fn applications_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .lock()?
            .student_applications(student_id)
            .cloned()
            .collect())
    }

    /// Overwrite a stored application without any workflow checks. Used to load
    /// legacy records and to simulate counter drift.
    pub fn import_application(&self, application: Application) -> Result<(), RepositoryError> {
        self.lock()?.put_application(application);
        Ok(())
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn transaction<T, F>(&self, op: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> Result<T, WorkflowError>,
    {
        let mut state = self.lock()?;
        let (output, writes) = {
            let mut tx = StoreTransaction::new(&*state);
            let output = op(&mut tx)?;
            (output, tx.into_writes())
        };
        state.apply(writes);
        Ok(output)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }
}
