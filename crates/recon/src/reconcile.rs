//! Error status of records against the per-student resolution ledger.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::config::RuleConfig;
use crate::error::ReconError;
use crate::model::{
    BillingRecord, ErrorKind, ErrorStats, Resolution, ResolvedEntry, StudentId,
    StudentResolutions, Unit,
};

/// Raw and unresolved error flags for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStatus {
    pub date_error: bool,
    pub value_error: bool,
    /// Date error with no date resolution.
    pub date_unresolved: bool,
    /// Value error with no value resolution.
    pub value_unresolved: bool,
}

impl RecordStatus {
    pub fn has_any_error(&self) -> bool {
        self.date_error || self.value_error
    }

    pub fn has_unresolved(&self) -> bool {
        self.date_unresolved || self.value_unresolved
    }

    pub fn unresolved(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Date => self.date_unresolved,
            ErrorKind::Value => self.value_unresolved,
        }
    }

    /// Had at least one error and every one is resolved.
    pub fn is_fully_resolved(&self) -> bool {
        self.has_any_error() && !self.has_unresolved()
    }
}

/// Evaluate one record against its own unit's ledger entry.
pub fn evaluate(
    record: &BillingRecord,
    ledger: Option<&StudentResolutions>,
    rules: &RuleConfig,
) -> RecordStatus {
    let date_error = rules.has_due_date_error(record);
    let value_error = rules.has_value_error(record);
    let resolved = |kind| ledger.is_some_and(|l| l.is_resolved(kind));

    RecordStatus {
        date_error,
        value_error,
        date_unresolved: date_error && !resolved(ErrorKind::Date),
        value_unresolved: value_error && !resolved(ErrorKind::Value),
    }
}

/// A single resolution leaf to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionWrite {
    pub unit_id: String,
    pub student_id: StudentId,
    pub kind: ErrorKind,
    pub resolution: Resolution,
}

impl ResolutionWrite {
    /// Set the leaf on an in-memory unit, overwriting any previous one.
    pub fn apply(&self, unit: &mut Unit) {
        unit.resolutions
            .entry(self.student_id.clone())
            .or_default()
            .set(self.kind, self.resolution.clone());
    }
}

/// Build the resolution write for a student of `unit`.
///
/// No check is made that the student currently has an error of `kind`.
pub fn resolve(
    unit: &Unit,
    student_name: &str,
    note: &str,
    kind: ErrorKind,
    now: DateTime<Utc>,
) -> Result<ResolutionWrite, ReconError> {
    let student_id = unit
        .students
        .id_for(student_name)
        .ok_or_else(|| ReconError::UnknownStudent {
            unit_id: unit.id.clone(),
            name: student_name.trim().to_string(),
        })?;

    Ok(ResolutionWrite {
        unit_id: unit.id.clone(),
        student_id,
        kind,
        resolution: Resolution {
            note: note.to_string(),
            resolved_at: now,
        },
    })
}

/// Statuses for `records`, each looked up in its own unit's ledger.
pub fn statuses<'a>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
    units: &[Unit],
    rules: &RuleConfig,
) -> Vec<RecordStatus> {
    let by_id: BTreeMap<&str, &Unit> = units.iter().map(|u| (u.id.as_str(), u)).collect();
    records
        .into_iter()
        .map(|r| {
            let ledger = by_id
                .get(r.unit_id.as_str())
                .and_then(|u| u.ledger(&r.student_id));
            evaluate(r, ledger, rules)
        })
        .collect()
}

/// Unresolved error counts over `records`, plus the number of distinct
/// students among them with any resolution.
pub fn error_stats<'a>(
    records: impl IntoIterator<Item = &'a BillingRecord>,
    units: &[Unit],
    rules: &RuleConfig,
) -> ErrorStats {
    let by_id: BTreeMap<&str, &Unit> = units.iter().map(|u| (u.id.as_str(), u)).collect();
    let mut stats = ErrorStats::default();
    let mut resolved_students: BTreeSet<(&str, &StudentId)> = BTreeSet::new();

    for record in records {
        let ledger = by_id
            .get(record.unit_id.as_str())
            .and_then(|u| u.ledger(&record.student_id));
        let status = evaluate(record, ledger, rules);

        if status.date_unresolved {
            stats.invalid_due_date_count += 1;
        }
        if status.value_unresolved {
            stats.low_value_count += 1;
        }
        if ledger.is_some_and(|l| !l.is_empty()) {
            resolved_students.insert((record.unit_id.as_str(), &record.student_id));
        }
    }

    stats.resolved_count = resolved_students.len();
    stats
}

/// Every resolution in `units`, newest first.
pub fn resolved_entries(units: &[Unit]) -> Vec<ResolvedEntry> {
    let mut entries: Vec<ResolvedEntry> = units
        .iter()
        .flat_map(|unit| {
            unit.resolutions.iter().flat_map(move |(student_id, ledger)| {
                ErrorKind::ALL.into_iter().filter_map(move |kind| {
                    ledger.get(kind).map(|res| ResolvedEntry {
                        name: unit
                            .students
                            .name_of(student_id)
                            .unwrap_or(student_id.as_str())
                            .to_string(),
                        unit_id: unit.id.clone(),
                        kind,
                        note: res.note.clone(),
                        resolved_at: res.resolved_at,
                    })
                })
            })
        })
        .collect();

    entries.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
    entries
}
