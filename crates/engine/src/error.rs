use paydown_graph::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Selection limit count must be positive, got {0}")]
    InvalidLimit(i64),

    #[error("Unknown limit kind '{0}' (expected file|violation)")]
    UnknownLimitKind(String),

    #[error("Invalid file glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Dependency scope is configured but no reachable file set was resolved")]
    ScopeNotResolved,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Dependency analysis error: {0}")]
    Graph(#[from] GraphError),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Violation count for rule '{rule}' in '{file}' must be positive, got {count}")]
    NonPositiveCount {
        file: String,
        rule: String,
        count: i64,
    },

    #[error("Ledger contains an empty file path")]
    EmptyPath,

    #[error("Ledger contains an empty rule id for '{0}'")]
    EmptyRule(String),
}
