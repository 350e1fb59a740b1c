//! Aggregation service: the entry point composing cache, connectors,
//! orchestrator and normalizer.
//!
//! ```text
//! criteria -> cache lookup -> (miss) orchestrator fan-out -> normalizer
//!          -> merge + sort -> cache write -> paginate -> response
//! ```

pub mod types;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rentwire_core::{AppConfig, CacheDb, CacheTier, Clock, CriteriaKey, Error, Listing, Portal, SearchCriteria};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::connectors::Connector;
use crate::normalize::Normalizer;
use crate::orchestrator::{Orchestrator, SourceOutcome};
use crate::translate::Translator;

pub use types::{
    CacheReport, CacheStatus, ConnectorReport, ConnectorStatus, Pagination, RefreshReport, SearchRequest,
    SearchResponse, ServiceStats, SourceReport,
};

/// Tunables of [`AggregationService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub concurrency_limit: usize,
    pub inter_batch_delay: Duration,
    pub search_deadline: Option<Duration>,
    pub cache_ttl: Duration,
    /// Cap applied to every request's `max_results_per_source`.
    pub max_results_per_source: u16,
    /// Language of incoming city terms.
    pub source_lang: String,
    /// Language the portals expect.
    pub target_lang: String,
    pub persist_listings: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            inter_batch_delay: config.inter_batch_delay(),
            search_deadline: Some(config.search_deadline()),
            cache_ttl: config.cache_ttl(),
            max_results_per_source: config.max_results_per_source,
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            persist_listings: config.persist_listings,
        }
    }
}

/// Merged, sorted output of one live fan-out.
struct Fetched {
    listings: Vec<Listing>,
    sources: BTreeMap<Portal, SourceReport>,
    dropped: usize,
}

#[derive(Debug)]
pub struct AggregationService {
    connectors: Vec<Arc<dyn Connector>>,
    cache: Arc<CacheTier>,
    normalizer: Normalizer,
    orchestrator: Orchestrator,
    translator: Option<Arc<dyn Translator>>,
    listing_store: Option<CacheDb>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
    status: RwLock<HashMap<Portal, ConnectorStatus>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl AggregationService {
    /// # Errors
    ///
    /// Returns `Error::Internal` if the normalizer rule tables fail to compile.
    pub fn new(
        connectors: Vec<Arc<dyn Connector>>, cache: Arc<CacheTier>, clock: Arc<dyn Clock>, settings: ServiceSettings,
    ) -> Result<Self, Error> {
        let mut orchestrator = Orchestrator::new(settings.concurrency_limit, settings.inter_batch_delay, clock.clone());
        if let Some(deadline) = settings.search_deadline {
            orchestrator = orchestrator.with_deadline(deadline);
        }

        Ok(Self {
            connectors,
            cache,
            normalizer: Normalizer::new(clock.clone())?,
            orchestrator,
            translator: None,
            listing_store: None,
            clock,
            settings,
            status: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
        })
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Database receiving fetched listings when `persist_listings` is set.
    pub fn with_listing_store(mut self, db: CacheDb) -> Self {
        self.listing_store = Some(db);
        self
    }

    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    /// Run one paginated search.
    ///
    /// Portal and cache failures never fail the search; they show up as
    /// missing results and per-source errors.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` or `Error::InvalidCriteria` for a
    /// request rejected before any fetch.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, Error> {
        request.validate()?;
        let started = Instant::now();

        let mut criteria = request.criteria.clone();
        criteria.max_results_per_source = criteria.max_results_per_source.min(self.settings.max_results_per_source);
        let key = criteria.cache_key();

        if !request.force_refresh
            && let Some(listings) = self.cache.get(&key).await
        {
            tracing::debug!(key = %key, total = listings.len(), "Serving search from cache");
            return Ok(respond(&request, listings, CacheStatus::Hit, BTreeMap::new(), 0, started));
        }

        let localized = self.localize(&criteria).await;
        let fetched = self.fetch(&localized).await;

        if !fetched.listings.is_empty() {
            self.cache.set(&key, fetched.listings.clone(), Some(self.settings.cache_ttl)).await;
            self.persist(&fetched.listings).await;
        }

        let status = if request.force_refresh { CacheStatus::Refreshed } else { CacheStatus::Miss };
        let response = respond(&request, fetched.listings, status, fetched.sources, fetched.dropped, started);

        tracing::info!(
            key = %key,
            total = response.pagination.total_results,
            dropped = response.normalization_dropped,
            elapsed_ms = response.duration_ms,
            "Search completed"
        );
        Ok(response)
    }

    /// Drop cached results mentioning `city` and fetch it again.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCriteria` for an invalid city.
    pub async fn refresh(&self, city: &str) -> Result<RefreshReport, Error> {
        let city = city.trim();
        let criteria = SearchCriteria::for_city(city);
        criteria.validate()?;

        let invalidated = self.cache.invalidate(&CriteriaKey::city_pattern(city)).await?;
        let request = SearchRequest { force_refresh: true, ..SearchRequest::new(criteria) };
        let response = self.search(request).await?;

        *self.last_refresh.write().await = Some(self.clock.now());
        tracing::info!(city, invalidated, total = response.pagination.total_results, "City refreshed");

        Ok(RefreshReport {
            city: city.to_string(),
            invalidated,
            total_results: response.pagination.total_results,
            sources: response.sources,
            duration_ms: response.duration_ms,
        })
    }

    /// Remove cached searches matching a wildcard `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> Result<u64, Error> {
        self.cache.invalidate(pattern).await
    }

    /// Delete expired entries from every cache layer.
    pub async fn purge_expired(&self) -> u64 {
        self.cache.purge_expired().await
    }

    /// Connector health and status, cache health and counters.
    pub async fn stats(&self) -> ServiceStats {
        let mut checks = JoinSet::new();
        for (i, connector) in self.connectors.iter().enumerate() {
            let connector = Arc::clone(connector);
            checks.spawn(async move { (i, connector.health_check().await) });
        }

        let mut healthy = vec![false; self.connectors.len()];
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((i, ok)) => healthy[i] = ok,
                Err(e) => tracing::warn!(error = %e, "Connector health check aborted"),
            }
        }

        let status = self.status.read().await;
        let connectors = self
            .connectors
            .iter()
            .zip(healthy)
            .map(|(connector, healthy)| ConnectorReport {
                info: connector.describe(),
                healthy,
                status: status.get(&connector.portal()).cloned().unwrap_or_default(),
            })
            .collect();
        drop(status);

        let stored_listings = match &self.listing_store {
            Some(db) => match db.count_listings(None).await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to count stored listings");
                    None
                }
            },
            None => None,
        };

        ServiceStats {
            connectors,
            cache: CacheReport { health: self.cache.health_check().await, stats: self.cache.stats().await },
            last_refresh: *self.last_refresh.read().await,
            stored_listings,
        }
    }

    /// Translate the city term; any failure keeps the original.
    async fn localize(&self, criteria: &SearchCriteria) -> SearchCriteria {
        let (Some(translator), Some(city)) = (&self.translator, criteria.city.as_deref()) else {
            return criteria.clone();
        };

        let translated = match translator.translate(city, &self.settings.source_lang, &self.settings.target_lang).await {
            Ok(text) if !text.trim().is_empty() => criteria.with_city(text.trim()),
            Ok(_) => return criteria.clone(),
            Err(e) => {
                tracing::warn!(city, error = %e, "Translation failed, using original city");
                return criteria.clone();
            }
        };

        match translated.validate() {
            Ok(()) => translated,
            Err(e) => {
                tracing::warn!(city, error = %e, "Translated city rejected, using original");
                criteria.clone()
            }
        }
    }

    async fn fetch(&self, criteria: &SearchCriteria) -> Fetched {
        let outcomes = self.orchestrator.run(criteria, &self.connectors).await;
        let now = self.clock.now();

        let mut listings = Vec::new();
        let mut sources = BTreeMap::new();
        let mut dropped = 0;
        let mut status = self.status.write().await;

        for SourceOutcome { portal, listings: raws, error, elapsed_ms } in outcomes {
            let batch = self.normalizer.normalize_batch(&raws, portal);
            dropped += batch.dropped;

            let entry = status.entry(portal).or_default();
            entry.last_raw = raws.len();
            entry.last_normalized = batch.listings.len();
            match &error {
                Some(e) => {
                    entry.last_error = Some(e.to_string());
                    entry.last_error_at = Some(now);
                }
                None => entry.last_success = Some(now),
            }

            sources.insert(
                portal,
                SourceReport {
                    raw: raws.len(),
                    normalized: batch.listings.len(),
                    dropped: batch.dropped,
                    elapsed_ms,
                    error: error.map(|e| e.to_string()),
                },
            );
            listings.extend(batch.listings);
        }
        drop(status);

        sort_by_published(&mut listings);
        Fetched { listings, sources, dropped }
    }

    async fn persist(&self, listings: &[Listing]) {
        if !self.settings.persist_listings {
            return;
        }
        let Some(db) = &self.listing_store else { return };

        match db.upsert_listings(listings, self.clock.now()).await {
            Ok(count) => tracing::debug!(count, "Persisted listings"),
            Err(e) => tracing::warn!(error = %e, "Failed to persist listings"),
        }
    }
}

/// Newest first; undated listings last. Stable otherwise.
fn sort_by_published(listings: &mut [Listing]) {
    listings.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn respond(
    request: &SearchRequest, listings: Vec<Listing>, cache_status: CacheStatus, sources: BTreeMap<Portal, SourceReport>,
    normalization_dropped: usize, started: Instant,
) -> SearchResponse {
    let pagination = Pagination::new(request.page, request.page_size, listings.len());
    let results = listings.get(pagination.range()).map(<[Listing]>::to_vec).unwrap_or_default();

    SearchResponse {
        results,
        pagination,
        cache_status,
        sources,
        normalization_dropped,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ConnectorError;
    use crate::fetch::{FetchCause, FetchError};
    use crate::testing::{MockConnector, raw_listing};
    use crate::translate::TranslateError;
    use async_trait::async_trait;
    use rentwire_core::model::raw::field;
    use rentwire_core::{CacheStore, HealthStatus, ManualClock, PropertyTypeFilter, RawListing, VolatileStore};

    #[derive(Debug)]
    struct FixedTranslator(Result<String, TranslateError>);

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, _text: &str, _from: &str, _to: &str) -> Result<String, TranslateError> {
            self.0.clone()
        }
    }

    struct Harness {
        service: AggregationService,
        cache: Arc<CacheTier>,
    }

    fn harness(connectors: Vec<Arc<dyn Connector>>, settings: ServiceSettings) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let volatile: Arc<dyn CacheStore> = Arc::new(VolatileStore::new());
        let cache = Arc::new(CacheTier::new(Some(volatile), None, clock.clone(), Duration::from_secs(1800)));
        let service = AggregationService::new(connectors, cache.clone(), clock, settings).unwrap();
        Harness { service, cache }
    }

    fn settings() -> ServiceSettings {
        ServiceSettings { inter_batch_delay: Duration::ZERO, search_deadline: None, ..Default::default() }
    }

    fn berlin_rooms() -> SearchCriteria {
        SearchCriteria {
            property_type: PropertyTypeFilter::Room,
            max_budget: Some(700.0),
            ..SearchCriteria::for_city("Berlin")
        }
    }

    fn outage() -> ConnectorError {
        ConnectorError::Fetch(FetchError::fatal("https://www.wg-gesucht.de/", FetchCause::Status(503), 3))
    }

    #[test]
    fn test_settings_take_languages_from_config() {
        let config = AppConfig { source_lang: "en".into(), target_lang: "de".into(), ..Default::default() };
        let settings = ServiceSettings::from(&config);
        assert_eq!(settings.source_lang, "en");
        assert_eq!(settings.target_lang, "de");
        assert_eq!(ServiceSettings::default().source_lang, "es");
    }

    #[tokio::test]
    async fn test_end_to_end_berlin_rooms() {
        let wg = Arc::new(MockConnector::returning(
            Portal::WgGesucht,
            vec![
                raw_listing(1, Some("10.03.2024")),
                raw_listing(2, None),
                RawListing::new().with(field::URL, "/angebot.3.html").with(field::PRICE, "500 €"),
            ],
        ));
        let is24 = Arc::new(MockConnector::returning(
            Portal::ImmobilienScout24,
            vec![raw_listing(4, Some("12.03.2024")), raw_listing(5, Some("01.03.2024"))],
        ));
        let h = harness(vec![wg.clone(), is24.clone()], settings());

        let first = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();

        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.pagination.total_results, 4);
        assert_eq!(first.normalization_dropped, 1);
        let titles: Vec<&str> = first.results.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Zimmer 4", "Zimmer 1", "Zimmer 5", "Zimmer 2"]);
        assert_eq!(first.sources[&Portal::WgGesucht].dropped, 1);
        assert_eq!(first.sources[&Portal::ImmobilienScout24].normalized, 2);

        let cached = h.cache.get(&berlin_rooms().cache_key()).await.unwrap();
        assert_eq!(cached.len(), 4);

        let second = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.results, first.results);
        assert_eq!((wg.calls(), is24.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_equivalent_criteria_share_cache_entry() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let h = harness(vec![wg.clone()], settings());

        h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();
        let shouting = SearchCriteria { city: Some("  BERLIN ".into()), ..berlin_rooms() };
        let response = h.service.search(SearchRequest::new(shouting)).await.unwrap();

        assert_eq!(response.cache_status, CacheStatus::Hit);
        assert_eq!(wg.calls(), 1);
    }

    #[tokio::test]
    async fn test_pagination_over_merged_results() {
        let raws = (1..=25).map(|i| raw_listing(i, None)).collect();
        let h = harness(vec![Arc::new(MockConnector::returning(Portal::WgGesucht, raws))], settings());

        let page = |n| SearchRequest { page: n, page_size: 6, ..SearchRequest::new(berlin_rooms()) };

        let first = h.service.search(page(1)).await.unwrap();
        assert_eq!(first.results.len(), 6);
        assert_eq!(first.results[0].title, "Zimmer 1");
        assert_eq!(first.pagination.total_pages, 5);
        assert!(first.pagination.has_next_page);

        let last = h.service.search(page(5)).await.unwrap();
        assert_eq!(last.cache_status, CacheStatus::Hit);
        assert_eq!(last.results.len(), 1);
        assert_eq!(last.results[0].title, "Zimmer 25");
        assert!(!last.pagination.has_next_page);
        assert!(last.pagination.has_prev_page);
    }

    #[tokio::test]
    async fn test_partial_failure_returns_healthy_sources() {
        let down = Arc::new(MockConnector::failing(Portal::WgGesucht, outage()));
        let up = Arc::new(MockConnector::returning(
            Portal::ImmobilienScout24,
            vec![raw_listing(1, None), raw_listing(2, None)],
        ));
        let h = harness(vec![down, up], settings());

        let response = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();

        assert_eq!(response.pagination.total_results, 2);
        assert!(response.results.iter().all(|l| l.source == Portal::ImmobilienScout24));
        assert!(response.sources[&Portal::WgGesucht].error.is_some());
        assert!(response.sources[&Portal::ImmobilienScout24].error.is_none());

        let stats = h.service.stats().await;
        assert!(stats.connectors[0].status.last_error.is_some());
        assert!(!stats.connectors[0].healthy);
        assert_eq!(stats.connectors[1].status.last_normalized, 2);
        assert!(stats.connectors[1].status.last_success.is_some());
    }

    #[tokio::test]
    async fn test_empty_result_not_cached() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![]));
        let h = harness(vec![wg.clone()], settings());

        let first = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();
        let second = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();

        assert_eq!(first.pagination.total_results, 0);
        assert_eq!(second.cache_status, CacheStatus::Miss);
        assert_eq!(wg.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let h = harness(vec![wg.clone()], settings());

        h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();
        let forced = SearchRequest { force_refresh: true, ..SearchRequest::new(berlin_rooms()) };
        let response = h.service.search(forced).await.unwrap();

        assert_eq!(response.cache_status, CacheStatus::Refreshed);
        assert_eq!(wg.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_never_fetches() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let h = harness(vec![wg.clone()], settings());

        let bad_budget = SearchCriteria { max_budget: Some(20.0), ..berlin_rooms() };
        let err = h.service.search(SearchRequest::new(bad_budget)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCriteria(_)));

        let bad_page = SearchRequest { page: 101, ..SearchRequest::new(berlin_rooms()) };
        assert!(matches!(h.service.search(bad_page).await, Err(Error::InvalidInput(_))));
        assert_eq!(wg.calls(), 0);
    }

    #[tokio::test]
    async fn test_translation_applies_to_fetch_not_key() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let mut h = harness(vec![wg.clone()], settings());
        h.service = h.service.with_translator(Arc::new(FixedTranslator(Ok("München".into()))));

        let criteria = SearchCriteria::for_city("Múnich");
        h.service.search(SearchRequest::new(criteria.clone())).await.unwrap();

        assert_eq!(wg.last_criteria().and_then(|c| c.city), Some("München".into()));
        assert!(h.cache.get(&criteria.cache_key()).await.is_some());
    }

    #[tokio::test]
    async fn test_translation_failure_falls_back_to_original() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let mut h = harness(vec![wg.clone()], settings());
        let unavailable = TranslateError::Unavailable("quota exceeded".into());
        h.service = h.service.with_translator(Arc::new(FixedTranslator(Err(unavailable))));

        let response = h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();

        assert_eq!(response.pagination.total_results, 1);
        assert_eq!(wg.last_criteria().and_then(|c| c.city), Some("Berlin".into()));
    }

    #[tokio::test]
    async fn test_refresh_invalidates_and_refetches_city() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None)]));
        let h = harness(vec![wg.clone()], settings());

        h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();
        let report = h.service.refresh("Berlin").await.unwrap();

        assert_eq!(report.city, "Berlin");
        assert_eq!(report.invalidated, 1);
        assert_eq!(report.total_results, 1);
        assert!(h.cache.get(&berlin_rooms().cache_key()).await.is_none());
        assert!(h.cache.get(&SearchCriteria::for_city("Berlin").cache_key()).await.is_some());
        assert!(h.service.stats().await.last_refresh.is_some());
        assert_eq!(wg.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_rejects_invalid_city() {
        let h = harness(vec![], settings());
        assert!(matches!(h.service.refresh("B").await, Err(Error::InvalidCriteria(_))));
    }

    #[tokio::test]
    async fn test_persists_listings_when_enabled() {
        let wg = Arc::new(MockConnector::returning(Portal::WgGesucht, vec![raw_listing(1, None), raw_listing(2, None)]));
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut h = harness(vec![wg], ServiceSettings { persist_listings: true, ..settings() });
        h.service = h.service.with_listing_store(db.clone());

        h.service.search(SearchRequest::new(berlin_rooms())).await.unwrap();

        assert_eq!(db.count_listings(Some(Portal::WgGesucht)).await.unwrap(), 2);
        assert_eq!(h.service.stats().await.stored_listings, Some(2));
    }

    #[tokio::test]
    async fn test_stats_reports_cache_health() {
        let h = harness(vec![Arc::new(MockConnector::returning(Portal::WgGesucht, vec![]))], settings());
        let stats = h.service.stats().await;

        assert_eq!(stats.cache.health.status, HealthStatus::Healthy);
        assert_eq!(stats.connectors.len(), 1);
        assert!(stats.connectors[0].healthy);
        assert_eq!(stats.last_refresh, None);
        assert_eq!(stats.stored_listings, None);
    }
}
