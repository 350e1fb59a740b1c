//! Cache layer contract and stored entry type.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::KeyPattern;
use crate::Error;
use crate::model::Listing;

/// A cached search result.
///
/// `expires_at` is fixed at creation; reads bump `access_count` and
/// `last_accessed` but never extend it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub listings: Vec<Listing>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, listings: Vec<Listing>, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
        Self {
            key: key.into(),
            listings,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Entry counts reported by a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: u64,
    pub expired_entries: u64,
    pub total_access: u64,
}

/// One cache layer.
///
/// Implementations report every failure as an `Err`; the tier decides how to
/// degrade. Expired entries must never be returned from `get`.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Short layer name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Fetch a live entry, recording the access.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error>;

    /// Insert or replace an entry (last write wins).
    async fn put(&self, entry: CacheEntry) -> Result<(), Error>;

    /// Delete every entry whose key matches `pattern`.
    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64, Error>;

    /// Delete entries expired at `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// Check that the layer answers.
    async fn health_check(&self) -> Result<(), Error>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry::new("search:{}", vec![], now, Duration::from_secs(1800));

        assert_eq!(entry.expires_at - entry.created_at, chrono::Duration::seconds(1800));
        assert!(!entry.is_expired(now + chrono::Duration::seconds(1799)));
        assert!(entry.is_expired(now + chrono::Duration::seconds(1800)));
        assert_eq!(entry.access_count, 0);
    }
}
