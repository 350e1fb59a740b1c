//! listing_stats tool implementation.

use rentwire_client::AggregationService;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;

/// Connector health and status plus cache health and counters.
pub async fn stats_impl(service: &AggregationService) -> Result<CallToolResult, McpError> {
    json_result(&service.stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{output, service};
    use rentwire_client::ServiceStats;
    use rentwire_core::HealthStatus;

    #[tokio::test]
    async fn test_stats_output() {
        let service = service(vec![]);
        let stats: ServiceStats = output(&stats_impl(&service).await.unwrap());

        assert_eq!(stats.connectors.len(), 1);
        assert_eq!(stats.connectors[0].info.name, "static");
        assert!(stats.connectors[0].healthy);
        assert_eq!(stats.cache.health.status, HealthStatus::Healthy);
        assert_eq!(stats.cache.stats.hits, 0);
    }
}
