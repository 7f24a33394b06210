//! `tuition-recon`: tuition billing reconciliation engine.
//!
//! Pure engine crate: receives raw spreadsheet grids and store snapshots,
//! returns canonical records, error status and summary statistics.
//! No CLI, network or file IO.

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod due_date;
pub mod error;
pub mod filter;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod transform;

pub use config::RuleConfig;
pub use dashboard::{AnalysisStatus, Dashboard};
pub use error::ReconError;
pub use model::{
    BillingRecord, CellValue, DistributionBin, ErrorKind, Resolution, StudentId, StudentResolutions,
    SummaryStats, Unit,
};
pub use transform::{prepare_upload, UnitDataset};
