//! Time-bounded caches with an injectable clock.
//!
//! Caches own their data and their TTL and read time through a [`Clock`],
//! so expiry can be driven by a [`ManualClock`] in tests.

mod cache;
mod clock;

pub use cache::{TtlCache, TtlCell};
pub use clock::{Clock, ManualClock, SystemClock};
