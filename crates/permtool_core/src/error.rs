use thiserror::Error;

/// Recoverable failures surfaced by the core operations. Each one maps to
/// bad caller input; none is fatal to the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermError {
    #[error("unknown permission type: {0}")]
    UnknownPermissionType(String),
    #[error("CSV must contain a header row and at least one data row")]
    MalformedCsv,
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("permission set name must not be empty")]
    MissingName,
    #[error("custom API name must not be empty")]
    MissingApiName,
    #[error("no input content supplied")]
    EmptyInput,
}
