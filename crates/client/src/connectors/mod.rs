//! Source connectors: one per external portal.
//!
//! Every connector implements [`Connector`]. Concrete portals are described
//! as data ([`PortalProfile`]: URL builder plus selector table) and run by
//! the shared [`PortalConnector`].

pub mod extract;
pub mod immonet;
pub mod immoscout;
pub mod immowelt;
pub mod kleinanzeigen;
pub mod portal;
pub mod wg_gesucht;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rentwire_core::{AppConfig, Clock, Portal, RawListing, SearchCriteria};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetch::{FetchError, RequestExecutor};

pub use extract::{CompiledTable, ExtractContext, Extraction, FieldRule, SelectorTable, Source, Strategy};
pub use portal::{PortalConnector, PortalProfile};

/// Errors a connector reports for one search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// Network or HTTP failure after the executor gave up.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Criteria rejected at the connector boundary.
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Broken static configuration (selectors, patterns).
    #[error("connector setup failed: {0}")]
    Setup(String),

    /// The connector task panicked or broke its contract.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The search deadline elapsed before the connector finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Static description of a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectorInfo {
    pub name: String,
    pub portal: Portal,
    pub base_url: String,
    pub rate_limit_ms: u64,
}

/// Capability contract of a portal adapter.
///
/// Implementations hold only static configuration and must be safe to call
/// concurrently. An empty result is a valid outcome, not an error.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    fn portal(&self) -> Portal;

    fn describe(&self) -> ConnectorInfo;

    /// Fetch and extract raw listings for `criteria`.
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawListing>, ConnectorError>;

    /// Whether the portal answers at all.
    async fn health_check(&self) -> bool;
}

/// Retry settings shared by all portal connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self { max_attempts: 3, timeout: Duration::from_millis(15_000) }
    }
}

impl From<&AppConfig> for ConnectorSettings {
    fn from(config: &AppConfig) -> Self {
        Self { max_attempts: config.max_attempts, timeout: config.timeout() }
    }
}

/// Profile of `portal`.
pub fn profile_for(portal: Portal) -> PortalProfile {
    match portal {
        Portal::WgGesucht => wg_gesucht::profile(),
        Portal::ImmobilienScout24 => immoscout::profile(),
        Portal::Immowelt => immowelt::profile(),
        Portal::Kleinanzeigen => kleinanzeigen::profile(),
        Portal::Immonet => immonet::profile(),
    }
}

/// City as a URL path segment: lowercase, umlauts transliterated, words
/// joined by hyphens.
pub(crate) fn city_slug(city: &str) -> String {
    let mut slug = String::with_capacity(city.len());
    for word in city.split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            match c {
                'ä' => slug.push_str("ae"),
                'ö' => slug.push_str("oe"),
                'ü' => slug.push_str("ue"),
                'ß' => slug.push_str("ss"),
                c => slug.push(c),
            }
        }
    }
    slug
}

/// Base URL of `portal` joined with `path`.
pub(crate) fn portal_url(portal: Portal, path: &str) -> Result<Url, ConnectorError> {
    Url::parse(portal.base_url())
        .and_then(|base| base.join(path))
        .map_err(|e| ConnectorError::Setup(e.to_string()))
}

/// Build connectors for `portals` in the given order.
///
/// # Errors
///
/// Returns `ConnectorError::Setup` if a portal profile fails to compile.
pub fn build_connectors(
    portals: &[Portal], executor: Arc<RequestExecutor>, clock: Arc<dyn Clock>, settings: ConnectorSettings,
) -> Result<Vec<Arc<dyn Connector>>, ConnectorError> {
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::with_capacity(portals.len());

    for portal in portals {
        let connector = PortalConnector::new(profile_for(*portal), executor.clone(), clock.clone(), settings)?;
        connectors.push(Arc::new(connector));
    }

    Ok(connectors)
}
