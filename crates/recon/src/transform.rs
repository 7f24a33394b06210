//! Raw grid → canonical billing records.
//!
//! Row 0 is a header. Data columns are positional (zero-based):
//!
//! | col | field          |
//! |-----|----------------|
//! | 2   | student name   |
//! | 3   | guardian       |
//! | 9   | grade          |
//! | 11  | due date (raw) |
//! | 14  | billed         |
//! | 16  | minimum        |

use chrono::{DateTime, Utc};

use crate::identity::{unit_id_for, StudentRegistry};
use crate::model::{BillingRecord, CellValue, Unit};
use crate::normalize::{finite_or_zero, parse_currency, round_to};

pub const COL_STUDENT: usize = 2;
pub const COL_GUARDIAN: usize = 3;
pub const COL_GRADE: usize = 9;
pub const COL_DUE_DATE: usize = 11;
pub const COL_BILLED: usize = 14;
pub const COL_MINIMUM: usize = 16;

/// Every column read from a row.
pub const CONTRACT_COLUMNS: [usize; 6] =
    [COL_STUDENT, COL_GUARDIAN, COL_GRADE, COL_DUE_DATE, COL_BILLED, COL_MINIMUM];

/// Width of a row that carries every contract column.
pub const CONTRACT_WIDTH: usize = COL_MINIMUM + 1;

/// Placeholder for missing text cells.
pub const NOT_AVAILABLE: &str = "N/A";

/// A transformed upload, ready for a dataset write.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDataset {
    pub unit_id: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
    pub records: Vec<BillingRecord>,
    /// Existing registry plus any names first seen in this upload.
    pub students: StudentRegistry,
}

impl UnitDataset {
    /// Apply onto a stored unit: records and timestamp are replaced, registry
    /// entries are added, resolutions are left alone.
    pub fn apply_to(&self, unit: &mut Unit) {
        unit.id = self.unit_id.clone();
        unit.name = self.name.clone();
        unit.last_updated = Some(self.last_updated);
        unit.records = self.records.clone();
        unit.students.merge(&self.students);
    }
}

fn cell(row: &[CellValue], col: usize) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    row.get(col).unwrap_or(&EMPTY)
}

fn text_or_na(value: &CellValue) -> String {
    if value.is_falsy() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_display_string()
    }
}

/// Header columns that no record field reads.
fn ignored_columns(width: usize) -> usize {
    (0..width).filter(|i| !CONTRACT_COLUMNS.contains(i)).count()
}

/// Build one record from a data row. `student_id` and `unit_id` are left
/// empty; `transform_rows` fills them in.
pub fn record_from_row(row: &[CellValue]) -> BillingRecord {
    let billed = parse_currency(cell(row, COL_BILLED));
    // Billed stays as parsed: a non-finite billed amount drops the row
    let minimum = finite_or_zero(parse_currency(cell(row, COL_MINIMUM)));

    let diff = finite_or_zero(billed - minimum);
    let diff_percent = if billed > 0.0 { finite_or_zero(diff / billed * 100.0) } else { 0.0 };

    let due_raw = cell(row, COL_DUE_DATE);
    let due_date = if due_raw.is_falsy() {
        CellValue::text(NOT_AVAILABLE)
    } else {
        due_raw.clone()
    };

    BillingRecord {
        student_name: text_or_na(cell(row, COL_STUDENT)),
        guardian_name: text_or_na(cell(row, COL_GUARDIAN)),
        grade: text_or_na(cell(row, COL_GRADE)),
        due_date,
        billed,
        minimum,
        diff_abs: round_to(diff, 2),
        diff_percent: round_to(diff_percent, 1),
        student_id: Default::default(),
        unit_id: String::new(),
    }
}

/// Transform a grid for one unit, issuing student ids from `registry`.
///
/// Rows without a student name or with a non-finite billed amount are
/// dropped. Order is preserved.
pub fn transform_rows(
    unit_id: &str,
    grid: &[Vec<CellValue>],
    registry: &mut StudentRegistry,
) -> Vec<BillingRecord> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };

    if header.len() < CONTRACT_WIDTH {
        log::warn!(
            "Header has {} columns, expected at least {}; missing columns default",
            header.len(),
            CONTRACT_WIDTH
        );
    }

    let ignored = ignored_columns(header.len());
    if ignored > 0 {
        log::debug!("Ignoring {} columns outside the billing contract", ignored);
    }

    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        let mut record = record_from_row(row);
        if record.student_name == NOT_AVAILABLE || !record.billed.is_finite() {
            dropped += 1;
            continue;
        }
        record.student_id = registry.issue(&record.student_name);
        record.unit_id = unit_id.to_string();
        records.push(record);
    }

    if dropped > 0 {
        log::debug!("Dropped {} rows without a student name", dropped);
    }

    records
}

/// Turn an uploaded grid into a dataset for `unit_name`.
///
/// `existing` is the stored unit with the same id, when there is one; its
/// registry is reused so returning students keep their ids.
pub fn prepare_upload(
    existing: Option<&Unit>,
    unit_name: &str,
    grid: &[Vec<CellValue>],
    now: DateTime<Utc>,
) -> UnitDataset {
    let unit_id = unit_id_for(unit_name);
    let mut students = existing.map(|u| u.students.clone()).unwrap_or_default();
    let before = students.len();

    let records = transform_rows(&unit_id, grid, &mut students);

    log::info!(
        "Prepared {} records for unit '{}' ({} new students)",
        records.len(),
        unit_id,
        students.len() - before
    );

    UnitDataset {
        unit_id,
        name: unit_name.trim().to_string(),
        last_updated: now,
        records,
        students,
    }
}
