//! Raffle participant registry.
//!
//! Participants live in a single JSON array on disk. Writes are serialized
//! by one process-wide lock and always re-read the file before mutating;
//! reads go through a short-lived cache.

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::ParticipantStore;
pub use types::*;
