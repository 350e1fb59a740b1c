//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the aggregation service.

use std::sync::Arc;

use rentwire_client::AggregationService;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::{
    CacheInvalidateParams, ListingRefreshParams, ListingSearchParams, invalidate_impl, refresh_impl, search_impl,
    stats_impl,
};

/// The main MCP server handler for rentwire.
#[derive(Clone)]
pub struct RentwireServer {
    service: Arc<AggregationService>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl RentwireServer {
    /// Create a new server handler around a shared service.
    pub fn new(service: Arc<AggregationService>) -> Self {
        Self { service, tool_router: Self::tool_router() }
    }

    /// Search rental listings across all enabled portals.
    ///
    /// Served from cache when a fresh result for equivalent criteria exists.
    #[tool(
        description = "Search rental listings (rooms, apartments, houses) across German portals. Returns normalized listings, pagination, cache status and per-portal statistics."
    )]
    async fn listing_search(&self, params: Parameters<ListingSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.service, params.0).await
    }

    #[tool(description = "Report connector health and status plus cache health and hit/miss counters.")]
    async fn listing_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.service).await
    }

    /// Drop cached results for a city and fetch it again.
    #[tool(description = "Invalidate cached searches for a city and fetch fresh listings from every portal.")]
    async fn listing_refresh(&self, params: Parameters<ListingRefreshParams>) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.service, params.0).await
    }

    #[tool(
        description = "Remove cached search results by key pattern (`*` wildcard) or by city. Returns the number of entries removed."
    )]
    async fn cache_invalidate(&self, params: Parameters<CacheInvalidateParams>) -> Result<CallToolResult, McpError> {
        invalidate_impl(&self.service, params.0).await
    }
}

impl ServerHandler for RentwireServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "rentwire".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::service;

    #[test]
    fn test_tools_registered() {
        let server = RentwireServer::new(service(vec![]));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(names, vec!["cache_invalidate", "listing_refresh", "listing_search", "listing_stats"]);
    }

    #[test]
    fn test_server_info() {
        let server = RentwireServer::new(service(vec![]));
        let info = server.get_info();
        assert_eq!(info.server_info.name, "rentwire");
        assert!(info.capabilities.tools.is_some());
    }
}
