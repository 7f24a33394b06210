use std::fmt;

#[derive(Debug)]
pub enum ReadError {
    /// Input path does not exist.
    NotFound(String),
    /// Extension is not a known spreadsheet or text format.
    UnsupportedFormat(String),
    /// Filesystem error.
    Io(std::io::Error),
    /// calamine could not open or decode the workbook.
    Workbook(String),
    /// Workbook has no sheets.
    NoSheets,
    /// Malformed delimited text.
    Csv(String),
    /// Report export failed.
    Export(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {path}"),
            Self::UnsupportedFormat(path) => write!(
                f,
                "unsupported file type: {path} (expected xlsx, xls, xlsb, ods, csv or tsv)"
            ),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Workbook(msg) => write!(f, "failed to read workbook: {msg}"),
            Self::NoSheets => write!(f, "workbook contains no sheets"),
            Self::Csv(msg) => write!(f, "failed to parse delimited file: {msg}"),
            Self::Export(msg) => write!(f, "failed to write report: {msg}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
