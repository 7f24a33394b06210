// Spreadsheet I/O: billing grids in, reports out

pub mod csv;
pub mod report;
pub mod xlsx;

mod error;

use std::path::Path;

use tuition_recon::CellValue;

pub use error::ReadError;
pub use report::write_report;

/// Raw cells of the first sheet, row-major. Row 0 is the header.
pub type Grid = Vec<Vec<CellValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// xlsx/xlsm/xls/xlsb/ods, read through calamine.
    Workbook,
    /// Delimiter-separated text.
    Delimited,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, ReadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Workbook),
            "csv" | "tsv" | "txt" => Ok(Self::Delimited),
            _ => Err(ReadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Read the first sheet of a billing spreadsheet.
pub fn read_grid(path: &Path) -> Result<Grid, ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(path.display().to_string()));
    }

    let grid = match SourceFormat::from_path(path)? {
        SourceFormat::Workbook => xlsx::read_first_sheet(path)?,
        SourceFormat::Delimited => csv::read(path)?,
    };

    log::info!("Read {} rows from {}", grid.len(), path.display());
    Ok(grid)
}
