//! listing_refresh tool implementation.

use rentwire_client::AggregationService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the listing_refresh tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListingRefreshParams {
    /// City whose cached searches are dropped and fetched again.
    pub city: String,
}

pub async fn refresh_impl(service: &AggregationService, params: ListingRefreshParams) -> Result<CallToolResult, McpError> {
    let report = service.refresh(&params.city).await?;
    json_result(&report)
}
