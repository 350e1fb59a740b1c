//! cache_invalidate tool implementation.
//!
//! Removes cached search results by wildcard key pattern or by city.

use rentwire_client::AggregationService;
use rentwire_core::CriteriaKey;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_invalidate tool. Exactly one of `pattern` or
/// `city` is expected; `pattern` wins when both are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateParams {
    /// Key pattern where `*` matches any run of characters (e.g. "search:*berlin*").
    #[serde(default)]
    pub pattern: Option<String>,

    /// Drop every cached search mentioning this city.
    #[serde(default)]
    pub city: Option<String>,
}

/// Output of cache_invalidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateOutput {
    pub pattern: String,
    pub removed: u64,
}

impl CacheInvalidateParams {
    fn resolve(&self) -> Result<String, ToolError> {
        let pattern = self.pattern.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty());

        match (pattern, city) {
            (Some(pattern), _) => Ok(pattern.to_string()),
            (None, Some(city)) => Ok(CriteriaKey::city_pattern(city)),
            (None, None) => Err(ToolError::InvalidInput("either pattern or city is required".into())),
        }
    }
}

pub async fn invalidate_impl(
    service: &AggregationService, params: CacheInvalidateParams,
) -> Result<CallToolResult, McpError> {
    let pattern = params.resolve()?;
    let removed = service.invalidate(&pattern).await?;

    json_result(&InvalidateOutput { pattern, removed })
}
