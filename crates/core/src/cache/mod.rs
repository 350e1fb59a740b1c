//! Tiered search cache.
//!
//! Search results are cached under the canonical criteria key in two layers:
//!
//! - A volatile in-process store (primary)
//! - A SQLite durable store via tokio-rusqlite (fallback)
//!
//! [`CacheTier`] composes the two. Both layers are optional and every layer
//! failure degrades to pass-through; caching never decides whether a search
//! succeeds.

pub mod connection;
pub mod hash;
pub mod listings;
pub mod migrations;
pub mod pattern;
pub mod search;
pub mod store;
pub mod tier;
pub mod volatile;

pub use crate::Error;

pub use connection::CacheDb;
pub use pattern::KeyPattern;
pub use store::{CacheEntry, CacheStore, StoreStats};
pub use tier::{CacheHealth, CacheStatsSnapshot, CacheTier, HealthStatus, TierHealth, TierStats};
pub use volatile::VolatileStore;
