use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Rule config validation error (bad base day, negative threshold, etc.).
    ConfigValidation(String),
    /// Unit id not present in the current snapshot.
    UnknownUnit(String),
    /// Student name never seen in the unit's registry.
    UnknownStudent { unit_id: String, name: String },
    /// Unrecognized error kind label.
    UnknownErrorKind(String),
    /// Error filter toggle would leave no kind enabled.
    EmptyErrorFilter,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "rule config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "rule config validation error: {msg}"),
            Self::UnknownUnit(id) => write!(f, "unknown unit: {id}"),
            Self::UnknownStudent { unit_id, name } => {
                write!(f, "unit '{unit_id}': unknown student '{name}'")
            }
            Self::UnknownErrorKind(kind) => {
                write!(f, "unknown error kind: \"{kind}\" (expected \"date\" or \"value\")")
            }
            Self::EmptyErrorFilter => {
                write!(f, "error filter needs at least one of 'date' or 'value' enabled")
            }
        }
    }
}

impl std::error::Error for ReconError {}
