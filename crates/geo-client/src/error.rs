//! Geolocation lookup errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Lookup failed: {0}")]
    Lookup(String),
}
