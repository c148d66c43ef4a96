use thiserror::Error;

/// The sales report could not be turned into line items at all.
///
/// Problems with individual rows never surface here; they are recorded in
/// the run summary as skipped lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(
        "sales report is missing required column(s): {} (found: {})",
        .missing.join(", "),
        found_list(.found)
    )]
    MissingColumns { missing: Vec<String>, found: Vec<String> },

    #[error("sales report is unreadable: {0}")]
    Unreadable(String),
}

fn found_list(found: &[String]) -> String {
    if found.is_empty() {
        "no header row".into()
    } else {
        found.join(", ")
    }
}

/// Failures at the store boundary. A failed write never leaves a partial table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport, permission, or missing-resource failure.
    #[error("machine table unavailable: {0}")]
    Unavailable(String),

    /// The payload violates the table's shape (empty or duplicate locations).
    #[error("machine table rejected the write: {0}")]
    Rejected(String),

    /// A stored row cannot be decoded into a machine record.
    #[error("machine table row {row} is malformed: {message}")]
    Malformed { row: usize, message: String },

    /// The table changed between snapshot and commit.
    #[error("machine table changed since it was read (expected version {expected}, found {found})")]
    Conflict { expected: String, found: String },
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Wraps the underlying store failure.
    #[error("reconciliation aborted: {0}")]
    Reconciliation(#[from] StoreError),

    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("no machine at location '{0}'")]
    UnknownMachine(String),

    #[error("a machine at location '{0}' already exists")]
    DuplicateMachine(String),

    #[error("invalid location: {0}")]
    InvalidLocation(String),
}
