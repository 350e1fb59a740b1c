//! Generic connector driven by a portal profile.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rentwire_core::{Clock, Portal, RawListing, SearchCriteria};
use url::Url;

use super::extract::{CompiledTable, ExtractContext, SelectorTable};
use super::{Connector, ConnectorError, ConnectorInfo, ConnectorSettings};
use crate::fetch::{RateLimiter, RequestExecutor, RetryPolicy};

/// Upper bound for the health check timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything portal-specific, as data.
#[derive(Debug, Clone, Copy)]
pub struct PortalProfile {
    pub portal: Portal,
    /// Minimum spacing between requests; also the backoff base.
    pub rate_limit: Duration,
    /// Cap on structured records per page.
    pub max_items: usize,
    /// Cap on link-heuristic records per page.
    pub max_fallback_items: usize,
    pub selectors: &'static SelectorTable,
    /// Pure request builder.
    pub build_url: fn(&SearchCriteria) -> Result<Url, ConnectorError>,
}

/// Connector for any portal described by a [`PortalProfile`].
#[derive(Debug)]
pub struct PortalConnector {
    profile: PortalProfile,
    table: CompiledTable,
    executor: Arc<RequestExecutor>,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl PortalConnector {
    /// Compile the profile's selectors and wire the shared executor.
    pub fn new(
        profile: PortalProfile, executor: Arc<RequestExecutor>, clock: Arc<dyn Clock>, settings: ConnectorSettings,
    ) -> Result<Self, ConnectorError> {
        let table = CompiledTable::compile(profile.selectors)?;
        let policy =
            RetryPolicy { max_attempts: settings.max_attempts, base_delay: profile.rate_limit, timeout: settings.timeout };

        Ok(Self { profile, table, executor, limiter: RateLimiter::new(profile.rate_limit, clock), policy })
    }

    pub fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    /// Request URL for `criteria`.
    pub fn build_url(&self, criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
        (self.profile.build_url)(criteria)
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".into(), "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into()),
            ("Accept-Language".into(), "de-DE,de;q=0.9,en;q=0.8".into()),
            ("Referer".into(), self.profile.portal.base_url().into()),
        ]
    }
}

#[async_trait]
impl Connector for PortalConnector {
    fn portal(&self) -> Portal {
        self.profile.portal
    }

    fn describe(&self) -> ConnectorInfo {
        ConnectorInfo {
            name: self.profile.portal.id().to_string(),
            portal: self.profile.portal,
            base_url: self.profile.portal.base_url().to_string(),
            rate_limit_ms: self.profile.rate_limit.as_millis() as u64,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawListing>, ConnectorError> {
        criteria.validate().map_err(|e| ConnectorError::InvalidCriteria(e.to_string()))?;
        let url = self.build_url(criteria)?;

        self.limiter.acquire().await;
        let response = self.executor.get(&url, &self.headers(), &self.policy).await?;

        let ctx = ExtractContext {
            limit: self.profile.max_items.min(usize::from(criteria.max_results_per_source)),
            fallback_limit: self.profile.max_fallback_items,
            city: criteria.city.as_deref(),
            type_hint: criteria.property_type.as_type().map(|t| t.as_str()),
        };
        let extraction = self.table.extract(&response.body, &ctx);

        tracing::debug!(
            portal = self.profile.portal.id(),
            url = %url,
            strategy = ?extraction.strategy,
            count = extraction.listings.len(),
            "Extracted raw listings"
        );

        Ok(extraction.listings)
    }

    async fn health_check(&self) -> bool {
        let Ok(url) = Url::parse(self.profile.portal.base_url()) else {
            return false;
        };
        let policy =
            RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO, timeout: self.policy.timeout.min(HEALTH_TIMEOUT) };

        match self.executor.get(&url, &self.headers(), &policy).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(portal = self.profile.portal.id(), error = %e, "Health check failed");
                false
            }
        }
    }
}
