//! Append-only revision ledger attached to each application.
//!
//! Entries are numbered in write order and never edited or removed. Supervisors and
//! companies read the ledger to see what changed between a change request and the
//! student's resubmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{RejectionFeedback, StudentProfileSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Initial,
    Resubmission,
}

/// A single field difference carried by a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub previous: Value,
    pub current: Value,
}

impl FieldChange {
    /// Returns `None` when both sides serialize to the same JSON value.
    pub fn between<T: Serialize + ?Sized>(field: &str, previous: &T, current: &T) -> Option<Self> {
        let previous = to_json(previous);
        let current = to_json(current);
        if previous == current {
            return None;
        }

        Some(Self {
            field: field.to_string(),
            previous,
            current,
        })
    }

    fn introduced<T: Serialize + ?Sized>(field: &str, current: &T) -> Self {
        Self {
            field: field.to_string(),
            previous: Value::Null,
            current: to_json(current),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub sequence: u32,
    pub kind: RevisionKind,
    pub changes: Vec<FieldChange>,
    pub note: Option<String>,
    /// Change request this resubmission answers, kept after it is cleared from the
    /// application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressed_feedback: Option<RejectionFeedback>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionLedger {
    entries: Vec<RevisionEntry>,
}

impl RevisionLedger {
    /// Start a ledger with the initial submission entry.
    pub fn seeded(
        snapshot: &StudentProfileSnapshot,
        cover_letter: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let mut ledger = Self::default();
        ledger.seed(snapshot, cover_letter, recorded_at);
        ledger
    }

    /// Seed the initial entry if nothing has been written yet. Returns whether it seeded.
    pub fn ensure_seeded(
        &mut self,
        snapshot: &StudentProfileSnapshot,
        cover_letter: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> bool {
        if !self.entries.is_empty() {
            return false;
        }
        self.seed(snapshot, cover_letter, recorded_at);
        true
    }

    fn seed(
        &mut self,
        snapshot: &StudentProfileSnapshot,
        cover_letter: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) {
        let changes = vec![
            FieldChange::introduced("student_profile_snapshot", snapshot),
            FieldChange::introduced("cover_letter", &cover_letter),
        ];
        self.push(RevisionKind::Initial, changes, None, None, recorded_at);
    }

    pub fn append_resubmission(
        &mut self,
        changes: Vec<FieldChange>,
        note: Option<String>,
        addressed_feedback: Option<RejectionFeedback>,
        recorded_at: DateTime<Utc>,
    ) -> &RevisionEntry {
        self.push(
            RevisionKind::Resubmission,
            changes,
            note,
            addressed_feedback,
            recorded_at,
        )
    }

    fn push(
        &mut self,
        kind: RevisionKind,
        changes: Vec<FieldChange>,
        note: Option<String>,
        addressed_feedback: Option<RejectionFeedback>,
        recorded_at: DateTime<Utc>,
    ) -> &RevisionEntry {
        let sequence = self
            .entries
            .last()
            .map(|entry| entry.sequence + 1)
            .unwrap_or(0);
        self.entries.push(RevisionEntry {
            sequence,
            kind,
            changes,
            note,
            addressed_feedback,
            recorded_at,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[RevisionEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&RevisionEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: RevisionKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> StudentProfileSnapshot {
        StudentProfileSnapshot {
            name: "Asha Verma".to_string(),
            roll_number: "CS-2021-044".to_string(),
            department: "Computer Science".to_string(),
            semester: 7,
            cgpa: 8.4,
            attendance: 91.0,
            backlogs: 0,
            cv: None,
            certificates: Vec::new(),
            captured_at: at(0),
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        let base = Utc
            .with_ymd_and_hms(2025, 7, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        base + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn seeded_ledger_starts_with_initial_entry() {
        let ledger = RevisionLedger::seeded(&snapshot(), Some("Keen on backend work"), at(1));

        assert_eq!(ledger.len(), 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.kind, RevisionKind::Initial);
        assert_eq!(entry.sequence, 0);
        assert!(entry
            .changes
            .iter()
            .any(|change| change.field == "cover_letter"
                && change.current == Value::from("Keen on backend work")));
    }

    #[test]
    fn ensure_seeded_only_writes_once() {
        let mut ledger = RevisionLedger::default();
        assert!(ledger.ensure_seeded(&snapshot(), None, at(1)));
        assert!(!ledger.ensure_seeded(&snapshot(), None, at(2)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn entries_keep_write_order_even_with_clock_skew() {
        let mut ledger = RevisionLedger::seeded(&snapshot(), None, at(10));
        ledger.append_resubmission(Vec::new(), Some("fixed CV".to_string()), None, at(5));
        ledger.append_resubmission(Vec::new(), None, None, at(1));

        let sequences: Vec<u32> = ledger.entries().iter().map(|entry| entry.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(ledger.count(RevisionKind::Resubmission), 2);
        assert_eq!(
            ledger.entries()[1].note.as_deref(),
            Some("fixed CV"),
            "notes stay attached to their entry"
        );
    }

    #[test]
    fn field_change_skips_identical_values() {
        assert!(FieldChange::between("cgpa", &8.4_f32, &8.4_f32).is_none());
        let change = FieldChange::between("backlogs", &2_u32, &0_u32).expect("values differ");
        assert_eq!(change.previous, Value::from(2));
        assert_eq!(change.current, Value::from(0));
    }
}
