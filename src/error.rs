use std::path::PathBuf;

use thiserror::Error;

/// Failures the migration engine can classify. Transport and I/O problems
/// travel as plain `anyhow` errors; these are the ones an operator acts on.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed ledger {}: {reason}", path.display())]
    MalformedLedger { path: PathBuf, reason: String },

    #[error("attempted to mark {category}.{source_id} as {new} but it is already mapped to {existing}")]
    DuplicateMark {
        category: String,
        source_id: String,
        existing: u64,
        new: u64,
    },

    #[error("creating {category}.{source_id} failed with status {status}: {body}")]
    RemoteCreate {
        category: String,
        source_id: String,
        status: u16,
        body: String,
    },

    #[error("response for {category}.{source_id} has no positive integer `{field}`: {body}")]
    MalformedResponse {
        category: String,
        source_id: String,
        field: String,
        body: String,
    },

    #[error("{category}.{source_id} has not been migrated yet")]
    ReferenceResolution { category: String, source_id: String },

    #[error("cannot find source card number #{0}")]
    UnknownCardNumber(String),

    #[error("cannot resolve member {0} to a target login")]
    UnmappedAuthor(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl MigrationError {
    /// Whether rerunning the pipeline unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MigrationError::RemoteCreate { .. })
    }
}
