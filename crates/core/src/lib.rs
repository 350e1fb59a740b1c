//! Core types and shared functionality for rentwire.
//!
//! This crate provides:
//! - The canonical listing data model and search criteria
//! - Tiered search cache (in-memory volatile store + SQLite durable store)
//! - Unified error types
//! - Configuration structures
//! - A clock abstraction so delays and expiry can be simulated in tests

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{
    CacheDb, CacheEntry, CacheHealth, CacheStatsSnapshot, CacheStore, CacheTier, HealthStatus, KeyPattern, VolatileStore,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{
    CriteriaKey, Features, Listing, Portal, Price, PropertyType, PropertyTypeFilter, RawListing, SearchCriteria,
};
