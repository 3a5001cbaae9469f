//! Cache module for API responses kept in memory
//!
//! This module provides a fetch cache that sits in front of the HTTP transport
//! and answers repeated lookups from memory within a caller-supplied TTL.
//! Entries live for the process lifetime; expired ones are refreshed lazily on
//! the next read of their key.

mod clock;
mod manager;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheStats, FetchCache, StalePolicy};
pub use transport::{FetchError, FetchRequest, HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT};
