use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the hard failures that can occur when the tool reads,
/// converts, or writes an inventory. Recoverable findings are reported as
/// [`Issue`](crate::seaf::convert::model::Issue)s instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when a temporary output file could not be moved into place.
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised when JSON serialization of the report fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a YAML document or the configuration file cannot be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a YAML document does not have the namespace → entities shape.
    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// Raised when the CLI receives an unsupported conversion request.
    #[error("unsupported conversion from {from:?} to {to:?}")]
    UnsupportedConversion { from: String, to: String },

    /// Raised when the registry has no descriptor for a requested kind.
    #[error("schema registry has no descriptor for {0}")]
    UnknownKind(String),

    /// Raised when the configuration is incomplete or contradictory.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
