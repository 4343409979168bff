//! qaboard Cache
//!
//! Keyed, timestamped snapshot store used by read paths to avoid redundant
//! transport calls and to degrade gracefully.
//!
//! # Read pattern
//!
//! ```text
//! read(key, fresh_ttl) ── hit ──▶ serve
//!        │ miss
//!        ▼
//!   transport ── ok ──▶ write(key, payload) ──▶ serve
//!        │ exhausted
//!        ▼
//! read(key, fallback_ttl) ── hit ──▶ serve stale
//!        │ miss
//!        ▼
//!   surface error
//! ```
//!
//! The fallback read is the caller's job; the store only answers
//! "is there an entry younger than this".

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{CacheKey, CollectionKind, ViewerRole};
pub use store::{CacheConfig, CacheEntry, CacheStats, CacheStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
