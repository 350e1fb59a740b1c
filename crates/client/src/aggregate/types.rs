//! Request, response and status shapes of the aggregation service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rentwire_core::{CacheHealth, CacheStatsSnapshot, Error, Listing, Portal, SearchCriteria};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::connectors::ConnectorInfo;

pub const MAX_PAGE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 12;

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// One paginated search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub criteria: SearchCriteria,

    /// 1-based page number (1-100, default 1).
    #[serde(default = "default_page")]
    pub page: u32,

    /// Results per page (1-50, default 12).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Skip the cache lookup and fetch live.
    #[serde(default)]
    pub force_refresh: bool,
}

impl SearchRequest {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self { criteria, page: default_page(), page_size: default_page_size(), force_refresh: false }
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an out-of-range page or page size and
    /// `Error::InvalidCriteria` for invalid criteria.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_PAGE).contains(&self.page) {
            return Err(Error::InvalidInput(format!("page must be between 1 and {MAX_PAGE}")));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidInput(format!("page_size must be between 1 and {MAX_PAGE_SIZE}")));
        }
        self.criteria.validate()
    }
}

/// Where the result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Fetched live because the caller forced a refresh.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total_results: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_results: usize) -> Self {
        let size = page_size.max(1) as usize;
        let total_pages = total_results.div_ceil(size);
        Self {
            current_page: page,
            page_size,
            total_results,
            total_pages,
            has_next_page: (page as usize) < total_pages,
            has_prev_page: page > 1,
        }
    }

    /// Index range of the current page within the full result list.
    pub fn range(&self) -> std::ops::Range<usize> {
        let size = self.page_size.max(1) as usize;
        let start = (self.current_page.max(1) as usize - 1).saturating_mul(size).min(self.total_results);
        let end = start.saturating_add(size).min(self.total_results);
        start..end
    }
}

/// Per-portal contribution to a live fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceReport {
    pub raw: usize,
    pub normalized: usize,
    pub dropped: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub results: Vec<Listing>,
    pub pagination: Pagination,
    pub cache_status: CacheStatus,
    /// Empty on a cache hit.
    pub sources: BTreeMap<Portal, SourceReport>,
    pub normalization_dropped: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RefreshReport {
    pub city: String,
    /// Cache entries removed before the fetch.
    pub invalidated: u64,
    pub total_results: usize,
    pub sources: BTreeMap<Portal, SourceReport>,
    pub duration_ms: u64,
}

/// What the service remembers about a connector's last live fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectorStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_raw: usize,
    pub last_normalized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectorReport {
    pub info: ConnectorInfo,
    pub healthy: bool,
    pub status: ConnectorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheReport {
    pub health: CacheHealth,
    pub stats: CacheStatsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceStats {
    pub connectors: Vec<ConnectorReport>,
    pub cache: CacheReport,
    pub last_refresh: Option<DateTime<Utc>>,
    /// Rows in the listings table, when persistence is configured.
    pub stored_listings: Option<u64>,
}
