//! Participant store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No participant at index {index} (store holds {len})")]
    NotFound { index: usize, len: usize },

    #[error("Phone number {0} is already registered")]
    DuplicatePhone(String),
}
