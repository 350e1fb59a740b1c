//! MCP tool implementations.
//!
//! This module contains all tools exposed by the rentwire server.

pub mod cache;
pub mod refresh;
pub mod search;
pub mod stats;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use cache::{CacheInvalidateParams, invalidate_impl};
pub use refresh::{ListingRefreshParams, refresh_impl};
pub use search::{ListingSearchParams, search_impl};
pub use stats::stats_impl;

/// Pretty-printed JSON text result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
