use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::identity::StudentRegistry;
use crate::normalize::number_text;

// ---------------------------------------------------------------------------
// Raw cells
// ---------------------------------------------------------------------------

/// A raw spreadsheet cell as handed over by the reader.
///
/// Serialized untagged so a persisted due date keeps its original shape
/// (serial number or text).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    #[default]
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Empty, blank text, zero, NaN or `false`: cells the column contract
    /// replaces with a default.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(n) => *n == 0.0 || n.is_nan(),
            Self::Bool(b) => !b,
        }
    }

    /// String coercion used for display and search.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => number_text(*n),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque student identifier, unique within a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    /// Issue a fresh identifier.
    pub fn issue() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Billing records
// ---------------------------------------------------------------------------

/// One canonical billing row. Immutable once transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRecord {
    pub student_name: String,
    pub guardian_name: String,
    pub grade: String,
    pub due_date: CellValue,
    pub billed: f64,
    pub minimum: f64,
    pub diff_abs: f64,
    pub diff_percent: f64,
    #[serde(default)]
    pub student_id: StudentId,
    #[serde(default)]
    pub unit_id: String,
}

// ---------------------------------------------------------------------------
// Resolutions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Due date outside the billing calendar.
    Date,
    /// Billed or minimum amount below the expected floor.
    Value,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 2] = [ErrorKind::Date, ErrorKind::Value];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "value" => Ok(Self::Value),
            other => Err(ReconError::UnknownErrorKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub note: String,
    pub resolved_at: DateTime<Utc>,
}

/// Per-student ledger: at most one resolution per error kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentResolutions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Resolution>,
}

impl StudentResolutions {
    pub fn get(&self, kind: ErrorKind) -> Option<&Resolution> {
        match kind {
            ErrorKind::Date => self.date.as_ref(),
            ErrorKind::Value => self.value.as_ref(),
        }
    }

    pub fn set(&mut self, kind: ErrorKind, resolution: Resolution) {
        match kind {
            ErrorKind::Date => self.date = Some(resolution),
            ErrorKind::Value => self.value = Some(resolution),
        }
    }

    pub fn is_resolved(&self, kind: ErrorKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.value.is_none()
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// One campus/branch. The store key is the id; everything else is the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, rename = "data")]
    pub records: Vec<BillingRecord>,
    #[serde(default)]
    pub students: StudentRegistry,
    #[serde(default)]
    pub resolutions: BTreeMap<StudentId, StudentResolutions>,
}

impl Unit {
    /// Re-attach the store key after deserialization. Records always carry
    /// the id of the unit that owns them.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        for record in &mut self.records {
            record.unit_id = self.id.clone();
        }
        self
    }

    pub fn ledger(&self, student_id: &StudentId) -> Option<&StudentResolutions> {
        self.resolutions.get(student_id)
    }
}

/// Build a unit list from a `{unit_id: unit}` map, in key order.
pub fn units_from_map(map: BTreeMap<String, Unit>) -> Vec<Unit> {
    map.into_iter().map(|(id, unit)| unit.with_id(id)).collect()
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateInfo {
    pub name: String,
    pub count: usize,
}

/// One bar of the discount histogram: records whose `diff_percent` falls in
/// `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionBin {
    /// `0-5%`, ..., `50-100%`, `>100%`
    pub range: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_rows: usize,
    pub duplicate_count: usize,
    pub duplicates: Vec<DuplicateInfo>,
    pub avg_diff: f64,
    pub avg_percent: f64,
    pub total_billed: f64,
    pub total_min: f64,
    /// Billed minus minimum over all rows: the scholarship share of the total.
    pub total_discount: f64,
    pub distribution: Vec<DistributionBin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub invalid_due_date_count: usize,
    pub low_value_count: usize,
    pub resolved_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntry {
    pub name: String,
    pub unit_id: String,
    pub kind: ErrorKind,
    pub note: String,
    pub resolved_at: DateTime<Utc>,
}
