//! rentwire server entry point.
//!
//! Boots the aggregation service, starts the background scheduler and serves
//! MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rentwire_client::{
    AggregationService, ConnectorSettings, ReqwestTransport, RequestExecutor, ServiceSettings, TransportConfig,
    build_connectors,
};
use rentwire_core::{AppConfig, CacheDb, CacheStore, CacheTier, Clock, SystemClock, VolatileStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod scheduler;
mod tools;

async fn open_db(config: &AppConfig) -> Option<CacheDb> {
    if !config.durable_cache_enabled && !config.persist_listings {
        return None;
    }

    match CacheDb::open(&config.db_path).await {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::warn!(path = %config.db_path.display(), error = %e, "Durable store unavailable, continuing without it");
            None
        }
    }
}

async fn build_service(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<AggregationService> {
    let transport = ReqwestTransport::new(&TransportConfig { user_agent: config.user_agent.clone(), ..Default::default() })?;
    let mut executor = RequestExecutor::new(Arc::new(transport), clock.clone());
    if config.respect_robots {
        executor = executor.with_robots(config.user_agent.clone());
    }

    let connectors =
        build_connectors(&config.enabled_portals, Arc::new(executor), clock.clone(), ConnectorSettings::from(config))?;

    let db = open_db(config).await;
    let volatile: Option<Arc<dyn CacheStore>> =
        config.volatile_cache_enabled.then(|| Arc::new(VolatileStore::new()) as Arc<dyn CacheStore>);
    let durable: Option<Arc<dyn CacheStore>> = match &db {
        Some(db) if config.durable_cache_enabled => Some(Arc::new(db.clone())),
        _ => None,
    };
    let cache = Arc::new(CacheTier::new(volatile, durable, clock.clone(), config.cache_ttl()));

    let mut service = AggregationService::new(connectors, cache, clock, ServiceSettings::from(config))?;
    if let Some(db) = db.filter(|_| config.persist_listings) {
        service = service.with_listing_store(db);
    }

    Ok(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    tracing::info!(portals = ?config.enabled_portals, "Starting rentwire server on stdio transport");

    let service = Arc::new(build_service(&config, clock.clone()).await?);

    let cancel = CancellationToken::new();
    let jobs = scheduler::Scheduler::from_config(service.clone(), clock, &config).spawn(cancel.clone());

    let handler = handler::RentwireServer::new(service);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    cancel.cancel();
    for job in jobs {
        job.await?;
    }

    Ok(())
}
