//! Search pipeline for rentwire.
//!
//! This crate provides the request executor, portal connectors, the
//! normalizer, the fetch orchestrator and the aggregation service built on
//! top of them.

pub mod aggregate;
pub mod connectors;
pub mod fetch;
pub mod normalize;
pub mod orchestrator;
pub mod translate;

#[cfg(test)]
mod testing;

pub use aggregate::{
    AggregationService, CacheStatus, Pagination, RefreshReport, SearchRequest, SearchResponse, ServiceSettings,
    ServiceStats, SourceReport,
};
pub use connectors::{Connector, ConnectorError, ConnectorInfo, ConnectorSettings, build_connectors};
pub use fetch::{FetchCause, FetchError, RequestExecutor, RetryPolicy, ReqwestTransport, TransportConfig};
pub use normalize::{NormalizedBatch, Normalizer};
pub use orchestrator::{Orchestrator, SourceOutcome};
pub use translate::{TranslateError, Translator};
