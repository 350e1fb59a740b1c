//! listing_search tool implementation.
//!
//! Searches all enabled portals through the aggregation service.

use rentwire_client::{AggregationService, SearchRequest};
use rentwire_core::{PropertyTypeFilter, SearchCriteria};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for the listing_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListingSearchParams {
    /// City or locality name (e.g., "Berlin").
    #[serde(default)]
    pub city: Option<String>,

    /// Property type: apartment, room, house, studio or any (default).
    #[serde(default)]
    pub property_type: PropertyTypeFilter,

    /// Minimum number of rooms (0-10).
    #[serde(default)]
    pub min_rooms: Option<u8>,

    /// Maximum monthly rent in EUR (100-5000).
    #[serde(default)]
    pub max_budget: Option<f64>,

    /// Raw results taken from each portal (1-100, default 50).
    #[serde(default)]
    pub max_results_per_source: Option<u16>,

    /// 1-based page number (1-100, default 1).
    #[serde(default)]
    pub page: Option<u32>,

    /// Results per page (1-50, default 12).
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Force a refresh, bypassing the cache.
    #[serde(default)]
    pub force_refresh: bool,
}

impl ListingSearchParams {
    pub fn into_request(self) -> SearchRequest {
        let defaults = SearchCriteria::default();
        let criteria = SearchCriteria {
            city: self.city,
            property_type: self.property_type,
            min_rooms: self.min_rooms,
            max_budget: self.max_budget,
            max_results_per_source: self.max_results_per_source.unwrap_or(defaults.max_results_per_source),
        };
        let base = SearchRequest::new(criteria);

        SearchRequest {
            page: self.page.unwrap_or(base.page),
            page_size: self.page_size.unwrap_or(base.page_size),
            force_refresh: self.force_refresh,
            ..base
        }
    }
}

/// Implementation of the listing_search tool.
pub async fn search_impl(service: &AggregationService, params: ListingSearchParams) -> Result<CallToolResult, McpError> {
    let response = service.search(params.into_request()).await?;
    json_result(&response)
}
