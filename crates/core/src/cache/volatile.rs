//! In-process volatile cache layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::pattern::KeyPattern;
use super::store::{CacheEntry, CacheStore, StoreStats};
use crate::Error;

/// Shared in-memory map of cache entries.
///
/// Cloning shares the underlying map. Expired entries are dropped lazily on
/// read and eagerly by `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct VolatileStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for VolatileStore {
    fn name(&self) -> &'static str {
        "volatile"
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed = Some(now);
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), Error> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !pattern.matches(key));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats, Error> {
        let entries = self.entries.read().await;
        let expired = entries.values().filter(|e| e.is_expired(now)).count() as u64;
        let total_access = entries.values().map(|e| e.access_count).sum();
        Ok(StoreStats { entries: entries.len() as u64, expired_entries: expired, total_access })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = VolatileStore::new();
        store.put(CacheEntry::new("search:a", vec![], t0(), Duration::from_secs(60))).await.unwrap();

        let entry = store.get("search:a", t0()).await.unwrap().unwrap();
        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.last_accessed, Some(t0()));

        let entry = store.get("search:a", t0()).await.unwrap().unwrap();
        assert_eq!(entry.access_count, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_dropped_on_read() {
        let store = VolatileStore::new();
        store.put(CacheEntry::new("search:a", vec![], t0(), Duration::from_secs(60))).await.unwrap();

        let later = t0() + chrono::Duration::seconds(61);
        assert!(store.get("search:a", later).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reads_do_not_extend_expiry() {
        let store = VolatileStore::new();
        store.put(CacheEntry::new("search:a", vec![], t0(), Duration::from_secs(60))).await.unwrap();

        let read = store.get("search:a", t0() + chrono::Duration::seconds(59)).await.unwrap().unwrap();
        assert_eq!(read.expires_at, t0() + chrono::Duration::seconds(60));
        assert!(store.get("search:a", t0() + chrono::Duration::seconds(60)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_matching() {
        let store = VolatileStore::new();
        for key in [r#"search:{"city":"berlin"}"#, r#"search:{"city":"berlin","min_rooms":2}"#, r#"search:{"city":"hamburg"}"#] {
            store.put(CacheEntry::new(key, vec![], t0(), Duration::from_secs(60))).await.unwrap();
        }

        let deleted = store.delete_matching(&KeyPattern::new("search:*berlin*").unwrap()).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_and_stats() {
        let store = VolatileStore::new();
        store.put(CacheEntry::new("search:short", vec![], t0(), Duration::from_secs(10))).await.unwrap();
        store.put(CacheEntry::new("search:long", vec![], t0(), Duration::from_secs(3600))).await.unwrap();

        let later = t0() + chrono::Duration::seconds(30);
        let stats = store.stats(later).await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}
