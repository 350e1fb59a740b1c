//! robots.txt compliance with caching.
//!
//! Fetches robots.txt through the shared transport and caches the parsed
//! rules per origin for 24 hours.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rentwire_core::Clock;
use robotstxt_rs::RobotsTxt;
use tokio::sync::RwLock;
use url::Url;

use super::transport::{HttpRequest, HttpTransport};

/// Default TTL for robots.txt cache (24 hours).
const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout for the robots.txt request itself.
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum size of robots.txt to honour (1MB).
const MAX_ROBOTS_SIZE: usize = 1024 * 1024;

/// Cached robots.txt entry with timestamp.
struct CachedRobots {
    robots: RobotsTxt,
    fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.fetched_at).to_std().map(|age| age > ROBOTS_TTL).unwrap_or(false)
    }
}

/// Per-origin robots.txt rules.
///
/// Unreachable or broken robots.txt files are treated as allow-all and not
/// cached, so the next request retries them.
pub struct RobotsGate {
    cache: Arc<RwLock<HashMap<String, CachedRobots>>>,
    user_agent: String,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RobotsGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotsGate").field("user_agent", &self.user_agent).finish_non_exhaustive()
    }
}

impl RobotsGate {
    pub fn new(user_agent: impl Into<String>, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        Self { cache: Arc::new(RwLock::new(HashMap::new())), user_agent: user_agent.into(), transport, clock }
    }

    /// Check if a URL is allowed by its origin's robots.txt.
    ///
    /// Fetches and caches robots.txt for the origin if not already cached.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let robots_url = format!("{}/robots.txt", url.origin().ascii_serialization());
        let now = self.clock.now();

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&robots_url)
                && !cached.is_expired(now)
            {
                let allowed = cached.robots.can_fetch(&self.user_agent, url.as_str());
                tracing::debug!(robots_url, allowed, "robots.txt cache hit");
                return allowed;
            }
        }

        let Some(robots) = self.fetch_robots(&robots_url).await else {
            return true;
        };
        let allowed = robots.can_fetch(&self.user_agent, url.as_str());

        self.cache.write().await.insert(robots_url, CachedRobots { robots, fetched_at: now });

        allowed
    }

    /// Fetch robots.txt; `None` means "could not be determined".
    async fn fetch_robots(&self, robots_url: &str) -> Option<RobotsTxt> {
        let url = Url::parse(robots_url).ok()?;
        let request = HttpRequest {
            url,
            headers: vec![("User-Agent".into(), self.user_agent.clone())],
            timeout: ROBOTS_TIMEOUT,
        };

        match self.transport.get(&request).await {
            Ok(response) if response.is_success() => {
                if response.body.len() > MAX_ROBOTS_SIZE {
                    tracing::warn!(robots_url, "robots.txt too large, allowing all");
                    return None;
                }
                Some(RobotsTxt::parse(&response.body))
            }
            Ok(response) if (400..500).contains(&response.status) => {
                tracing::debug!(robots_url, status = response.status, "robots.txt not found, allowing all");
                Some(RobotsTxt::parse(""))
            }
            Ok(response) => {
                tracing::debug!(robots_url, status = response.status, "robots.txt unavailable, allowing");
                None
            }
            Err(cause) => {
                tracing::debug!(robots_url, error = %cause, "robots.txt fetch failed, allowing");
                None
            }
        }
    }

    /// Clear expired entries from the cache.
    pub async fn cleanup_expired(&self) {
        let now = self.clock.now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, cached| !cached.is_expired(now));
    }
}
