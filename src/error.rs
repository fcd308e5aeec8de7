//! Error types for the run-state store.

use thiserror::Error;

/// Main error type for checkpoint and recovery operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A snapshot cannot be turned back into a live run: unknown action kind
    /// or a malformed cross-reference between snapshot parts. Fatal to the
    /// restart attempt; no partial run is produced.
    #[error("Cannot reconstruct run: {0}")]
    Reconstruction(String),

    /// A step that completed is missing from the step list built at run start.
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// The manager was asked to update before any run was saved or loaded.
    #[error("No run state to update")]
    NoStateInfo,

    /// The storage handle carries no cached state objects; `save` or
    /// `load_objects` must run before incremental updates.
    #[error("No state objects attached to storage handle")]
    NoStateObjects,

    #[error("Storage directory is locked by another operator")]
    Locked,
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            StateError::Io(e.into())
        } else {
            StateError::Serialization(e.to_string())
        }
    }
}

/// Result type for run-state operations.
pub type Result<T> = std::result::Result<T, StateError>;
