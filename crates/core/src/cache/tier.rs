//! Two-tier cache composition.
//!
//! Reads and writes prefer the volatile layer and fall back to the durable
//! one. A durable hit is promoted into the volatile layer with its original
//! expiry. Layer failures are logged and counted, never returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::pattern::KeyPattern;
use super::store::{CacheEntry, CacheStore, StoreStats};
use crate::Error;
use crate::clock::Clock;
use crate::model::{CriteriaKey, Listing};

/// Overall cache health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every configured layer answers its health check.
    Healthy,
    /// At least one configured layer fails, but another one works.
    Degraded,
    /// No layer is usable; the cache is pass-through.
    Unavailable,
}

/// Health of a single layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TierHealth {
    pub name: String,
    pub available: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub tiers: Vec<TierHealth>,
}

/// Counters and entry statistics for one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TierStats {
    pub name: String,
    pub hits: u64,
    pub writes: u64,
    pub errors: u64,
    pub entries: Option<u64>,
    pub expired_entries: Option<u64>,
    pub total_access: Option<u64>,
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub tiers: Vec<TierStats>,
}

#[derive(Debug, Default)]
struct LayerCounters {
    hits: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug)]
struct Layer {
    store: Arc<dyn CacheStore>,
    counters: LayerCounters,
}

impl Layer {
    fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store, counters: LayerCounters::default() }
    }

    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn failed(&self, op: &str, key: &str, err: &Error) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(tier = self.name(), op, key, error = %err, "Cache layer unavailable");
    }
}

/// Search-result cache with a volatile primary and a durable fallback.
///
/// Either layer may be absent. With no usable layer `get` returns `None` and
/// `set` stores nothing.
#[derive(Debug)]
pub struct CacheTier {
    volatile: Option<Layer>,
    durable: Option<Layer>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    misses: AtomicU64,
    promotions: AtomicU64,
}

impl CacheTier {
    pub fn new(
        volatile: Option<Arc<dyn CacheStore>>, durable: Option<Arc<dyn CacheStore>>, clock: Arc<dyn Clock>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            volatile: volatile.map(Layer::new),
            durable: durable.map(Layer::new),
            clock,
            default_ttl,
            misses: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.volatile.iter().chain(self.durable.iter())
    }

    /// Look up cached listings for `key`.
    pub async fn get(&self, key: &CriteriaKey) -> Option<Vec<Listing>> {
        let now = self.clock.now();
        let key = key.as_str();

        if let Some(volatile) = &self.volatile {
            match volatile.store.get(key, now).await {
                Ok(Some(entry)) => {
                    volatile.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(tier = volatile.name(), key, "Cache hit");
                    return Some(entry.listings);
                }
                Ok(None) => {}
                Err(e) => volatile.failed("get", key, &e),
            }
        }

        if let Some(durable) = &self.durable {
            match durable.store.get(key, now).await {
                Ok(Some(entry)) => {
                    durable.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(tier = durable.name(), key, "Cache hit");
                    self.promote(&entry).await;
                    return Some(entry.listings);
                }
                Ok(None) => {}
                Err(e) => durable.failed("get", key, &e),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "Cache miss");
        None
    }

    async fn promote(&self, entry: &CacheEntry) {
        let Some(volatile) = &self.volatile else { return };

        let promoted = CacheEntry { access_count: 0, last_accessed: None, ..entry.clone() };
        match volatile.store.put(promoted).await {
            Ok(()) => {
                self.promotions.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => volatile.failed("promote", &entry.key, &e),
        }
    }

    /// Store `listings` under `key` for `ttl` (default TTL when `None`).
    ///
    /// Writes go to the volatile layer; the durable layer is used only when
    /// the volatile one is absent or fails. Returns the layer that took the
    /// write, or `None` if nothing stored it.
    pub async fn set(&self, key: &CriteriaKey, listings: Vec<Listing>, ttl: Option<Duration>) -> Option<&'static str> {
        let entry = CacheEntry::new(key.as_str(), listings, self.clock.now(), ttl.unwrap_or(self.default_ttl));

        for layer in self.layers() {
            match layer.store.put(entry.clone()).await {
                Ok(()) => {
                    layer.counters.writes.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(tier = layer.name(), key = %key, count = entry.listings.len(), "Cached search");
                    return Some(layer.name());
                }
                Err(e) => layer.failed("set", key.as_str(), &e),
            }
        }

        None
    }

    /// Delete every entry matching the `*`-wildcard `pattern` in all layers.
    ///
    /// Best-effort: failing layers are skipped. Returns the number of
    /// entries removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the pattern is empty.
    pub async fn invalidate(&self, pattern: &str) -> Result<u64, Error> {
        let pattern = KeyPattern::new(pattern)?;
        let mut removed = 0;

        for layer in self.layers() {
            match layer.store.delete_matching(&pattern).await {
                Ok(n) => removed += n,
                Err(e) => layer.failed("invalidate", pattern.as_str(), &e),
            }
        }

        tracing::info!(pattern = pattern.as_str(), removed, "Invalidated cache entries");
        Ok(removed)
    }

    /// Remove expired entries from all layers; returns the count removed.
    pub async fn purge_expired(&self) -> u64 {
        let now = self.clock.now();
        let mut removed = 0;

        for layer in self.layers() {
            match layer.store.purge_expired(now).await {
                Ok(n) => removed += n,
                Err(e) => layer.failed("purge_expired", "*", &e),
            }
        }

        removed
    }

    /// Check every configured layer.
    pub async fn health_check(&self) -> CacheHealth {
        let mut tiers = Vec::new();
        for layer in self.layers() {
            let check = layer.store.health_check().await;
            tiers.push(TierHealth {
                name: layer.name().to_string(),
                available: check.is_ok(),
                error: check.err().map(|e| e.to_string()),
            });
        }

        let available = tiers.iter().filter(|t| t.available).count();
        let status = if available == 0 {
            HealthStatus::Unavailable
        } else if available < tiers.len() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        CacheHealth { status, tiers }
    }

    /// Snapshot of counters plus per-layer entry statistics.
    pub async fn stats(&self) -> CacheStatsSnapshot {
        let now = self.clock.now();
        let mut tiers = Vec::new();
        let mut hits = 0;

        for layer in self.layers() {
            let store_stats: Option<StoreStats> = match layer.store.stats(now).await {
                Ok(s) => Some(s),
                Err(e) => {
                    layer.failed("stats", "*", &e);
                    None
                }
            };
            let layer_hits = layer.counters.hits.load(Ordering::Relaxed);
            hits += layer_hits;

            tiers.push(TierStats {
                name: layer.name().to_string(),
                hits: layer_hits,
                writes: layer.counters.writes.load(Ordering::Relaxed),
                errors: layer.counters.errors.load(Ordering::Relaxed),
                entries: store_stats.map(|s| s.entries),
                expired_entries: store_stats.map(|s| s.expired_entries),
                total_access: store_stats.map(|s| s.total_access),
            });
        }

        CacheStatsSnapshot {
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            tiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDb, VolatileStore};
    use crate::clock::ManualClock;
    use crate::model::{Features, Portal, PropertyType, SearchCriteria};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    /// Layer that fails every operation.
    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str, _now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn put(&self, _entry: CacheEntry) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn delete_matching(&self, _pattern: &KeyPattern) -> Result<u64, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn health_check(&self) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn stats(&self, _now: DateTime<Utc>) -> Result<StoreStats, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()))
    }

    fn key(city: &str) -> CriteriaKey {
        SearchCriteria::for_city(city).cache_key()
    }

    fn listings() -> Vec<Listing> {
        vec![Listing {
            id: "wg-gesucht:0123456789abcdef".into(),
            source: Portal::WgGesucht,
            external_id: Some("42".into()),
            url: "https://www.wg-gesucht.de/42.html".into(),
            title: "WG-Zimmer in Kreuzberg".into(),
            price: None,
            area_sqm: None,
            main_image: None,
            location: Some("Berlin Kreuzberg".into()),
            property_type: PropertyType::Room,
            published_at: None,
            rooms: Some(1),
            features: Features::default(),
            description: None,
        }]
    }

    async fn both_tiers(clock: Arc<ManualClock>) -> (CacheTier, VolatileStore, CacheDb) {
        let volatile = VolatileStore::new();
        let durable = CacheDb::open_in_memory().await.unwrap();
        let tier = CacheTier::new(
            Some(Arc::new(volatile.clone())),
            Some(Arc::new(durable.clone())),
            clock,
            Duration::from_secs(1800),
        );
        (tier, volatile, durable)
    }

    #[tokio::test]
    async fn test_round_trip_and_ttl() {
        let clock = clock();
        let (tier, _, _) = both_tiers(clock.clone()).await;

        assert_eq!(tier.set(&key("Berlin"), listings(), Some(Duration::from_secs(60))).await, Some("volatile"));
        assert_eq!(tier.get(&key("Berlin")).await, Some(listings()));

        clock.advance(Duration::from_secs(60));
        assert_eq!(tier.get(&key("Berlin")).await, None);
    }

    #[tokio::test]
    async fn test_write_prefers_volatile() {
        let (tier, volatile, durable) = both_tiers(clock()).await;
        tier.set(&key("Berlin"), listings(), None).await;

        assert_eq!(volatile.len().await, 1);
        assert_eq!(durable.stats(Utc::now()).await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_write_falls_back_to_durable() {
        let clock = clock();
        let durable = CacheDb::open_in_memory().await.unwrap();
        let tier = CacheTier::new(
            Some(Arc::new(BrokenStore)),
            Some(Arc::new(durable.clone())),
            clock.clone(),
            Duration::from_secs(1800),
        );

        assert_eq!(tier.set(&key("Berlin"), listings(), None).await, Some("durable"));
        assert_eq!(tier.get(&key("Berlin")).await, Some(listings()));

        let stats = tier.stats().await;
        assert_eq!(stats.tiers[0].name, "broken");
        assert!(stats.tiers[0].errors >= 2);
        assert_eq!(stats.tiers[1].hits, 1);
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted_with_original_expiry() {
        let clock = clock();
        let (tier, volatile, durable) = both_tiers(clock.clone()).await;
        let k = key("Hamburg");
        durable.put(CacheEntry::new(k.as_str(), listings(), clock.now(), Duration::from_secs(100))).await.unwrap();

        clock.advance(Duration::from_secs(40));
        assert_eq!(tier.get(&k).await, Some(listings()));
        assert_eq!(volatile.len().await, 1);

        let promoted = volatile.get(k.as_str(), clock.now()).await.unwrap().unwrap();
        assert_eq!(promoted.expires_at, promoted.created_at + chrono::Duration::seconds(100));
        assert_eq!(tier.stats().await.promotions, 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(tier.get(&k).await, None);
    }

    #[tokio::test]
    async fn test_no_tiers_is_pass_through() {
        let tier = CacheTier::new(None, None, clock(), Duration::from_secs(1800));

        assert_eq!(tier.set(&key("Berlin"), listings(), None).await, None);
        assert_eq!(tier.get(&key("Berlin")).await, None);
        assert_eq!(tier.health_check().await.status, HealthStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_all_tiers_broken_degrades_silently() {
        let tier = CacheTier::new(
            Some(Arc::new(BrokenStore)),
            Some(Arc::new(BrokenStore)),
            clock(),
            Duration::from_secs(1800),
        );

        assert_eq!(tier.set(&key("Berlin"), listings(), None).await, None);
        assert_eq!(tier.get(&key("Berlin")).await, None);
        assert_eq!(tier.invalidate("search:*berlin*").await.unwrap(), 0);
        assert_eq!(tier.purge_expired().await, 0);
        assert_eq!(tier.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_health_degraded_when_one_tier_fails() {
        let tier = CacheTier::new(
            Some(Arc::new(VolatileStore::new())),
            Some(Arc::new(BrokenStore)),
            clock(),
            Duration::from_secs(1800),
        );

        let health = tier.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(health.tiers[0].available);
        assert!(!health.tiers[1].available);
        assert!(health.tiers[1].error.as_deref().unwrap_or_default().contains("CACHE_UNAVAILABLE"));
    }

    #[tokio::test]
    async fn test_health_healthy() {
        let (tier, _, _) = both_tiers(clock()).await;
        assert_eq!(tier.health_check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_invalidate_spans_both_tiers() {
        let clock = clock();
        let (tier, volatile, durable) = both_tiers(clock.clone()).await;
        let berlin_rooms = SearchCriteria { min_rooms: Some(2), ..SearchCriteria::for_city("Berlin") }.cache_key();

        tier.set(&key("Berlin"), listings(), None).await;
        tier.set(&key("Hamburg"), listings(), None).await;
        durable
            .put(CacheEntry::new(berlin_rooms.as_str(), listings(), clock.now(), Duration::from_secs(60)))
            .await
            .unwrap();

        let removed = tier.invalidate(&CriteriaKey::city_pattern("Berlin")).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(volatile.len().await, 1);
        assert_eq!(tier.get(&key("Hamburg")).await, Some(listings()));
    }

    #[tokio::test]
    async fn test_mixed_case_pattern_clears_both_tiers() {
        let clock = clock();
        let (tier, volatile, durable) = both_tiers(clock.clone()).await;

        tier.set(&key("Berlin"), listings(), None).await;
        durable
            .put(CacheEntry::new(key("Berlin").as_str(), listings(), clock.now(), Duration::from_secs(60)))
            .await
            .unwrap();

        let removed = tier.invalidate("search:*Berlin*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(volatile.is_empty().await);
        assert_eq!(tier.get(&key("Berlin")).await, None);
    }

    #[tokio::test]
    async fn test_purge_expired_counts_both_tiers() {
        let clock = clock();
        let (tier, _, durable) = both_tiers(clock.clone()).await;

        tier.set(&key("Berlin"), listings(), Some(Duration::from_secs(10))).await;
        durable.put(CacheEntry::new("search:old", vec![], clock.now(), Duration::from_secs(10))).await.unwrap();
        tier.set(&key("Hamburg"), listings(), Some(Duration::from_secs(3600))).await;

        clock.advance(Duration::from_secs(11));
        assert_eq!(tier.purge_expired().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_set_same_key_last_write_wins() {
        let (tier, volatile, _) = both_tiers(clock()).await;
        let tier = Arc::new(tier);
        let k = key("Berlin");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tier = tier.clone();
            let k = k.clone();
            handles.push(tokio::spawn(async move { tier.set(&k, listings(), None).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        assert_eq!(volatile.len().await, 1);
        assert_eq!(tier.get(&k).await, Some(listings()));
    }
}
