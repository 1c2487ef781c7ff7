use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid project root: {0}")]
    InvalidRoot(String),

    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Dependency analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Dependency analysis produced no modules under {0}")]
    NoModules(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
