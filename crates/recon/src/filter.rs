//! Free-text search and the error filter.

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{BillingRecord, ErrorKind};
use crate::normalize::number_text;
use crate::reconcile::RecordStatus;

/// Case-insensitive substring match over every field of the record.
/// An empty query matches everything.
pub fn matches_search(record: &BillingRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();

    let numbers = [
        record.billed,
        record.minimum,
        record.diff_abs,
        record.diff_percent,
    ];

    [
        record.student_name.as_str(),
        record.guardian_name.as_str(),
        record.grade.as_str(),
        record.unit_id.as_str(),
    ]
    .into_iter()
    .map(str::to_string)
    .chain(std::iter::once(record.due_date.to_display_string()))
    .chain(numbers.into_iter().map(number_text))
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Error filter state. When inactive every record passes; when active a
/// record passes if any enabled kind is still unresolved for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorFilter {
    pub active: bool,
    pub date: bool,
    pub value: bool,
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self { active: false, date: true, value: true }
    }
}

impl ErrorFilter {
    pub fn toggle_active(&mut self) {
        self.active = !self.active;
    }

    pub fn enabled(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Date => self.date,
            ErrorKind::Value => self.value,
        }
    }

    /// Flip one kind. Refused, leaving the state as it was, when it would
    /// disable both kinds.
    pub fn toggle(&mut self, kind: ErrorKind) -> Result<(), ReconError> {
        let mut next = *self;
        match kind {
            ErrorKind::Date => next.date = !next.date,
            ErrorKind::Value => next.value = !next.value,
        }
        if !next.date && !next.value {
            return Err(ReconError::EmptyErrorFilter);
        }
        *self = next;
        Ok(())
    }

    /// Set both kinds at once; at least one must stay enabled.
    pub fn set_kinds(&mut self, date: bool, value: bool) -> Result<(), ReconError> {
        if !date && !value {
            return Err(ReconError::EmptyErrorFilter);
        }
        self.date = date;
        self.value = value;
        Ok(())
    }

    pub fn passes(&self, status: &RecordStatus) -> bool {
        if !self.active {
            return true;
        }
        (self.date && status.date_unresolved) || (self.value && status.value_unresolved)
    }
}
