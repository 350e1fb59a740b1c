//! Background refresh and sweep jobs.
//!
//! Two loops run until cancelled: one refreshes the configured cities, the
//! other purges expired cache entries. Both wait through the [`Clock`] so
//! tests can drive them without real delays.

use std::sync::Arc;
use std::time::Duration;

use rentwire_client::AggregationService;
use rentwire_core::{AppConfig, Clock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause between two cities of one refresh run.
const CITY_PAUSE: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Scheduler {
    service: Arc<AggregationService>,
    clock: Arc<dyn Clock>,
    cities: Vec<String>,
    refresh_interval: Duration,
    sweep_interval: Duration,
}

impl Scheduler {
    pub fn new(
        service: Arc<AggregationService>, clock: Arc<dyn Clock>, cities: Vec<String>, refresh_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self { service, clock, cities, refresh_interval, sweep_interval }
    }

    pub fn from_config(service: Arc<AggregationService>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self::new(service, clock, config.refresh_cities.clone(), config.refresh_interval(), config.sweep_interval())
    }

    /// Refresh every configured city once; returns how many succeeded.
    ///
    /// A failing city is logged and skipped.
    pub async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;

        for (i, city) in self.cities.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(CITY_PAUSE).await;
            }

            match self.service.refresh(city).await {
                Ok(report) => {
                    refreshed += 1;
                    tracing::info!(city = %report.city, total = report.total_results, "Scheduled refresh done");
                }
                Err(e) => tracing::error!(city = %city, error = %e, "Scheduled refresh failed"),
            }
        }

        refreshed
    }

    /// Purge expired cache entries; returns the count removed.
    pub async fn sweep(&self) -> u64 {
        let removed = self.service.purge_expired().await;
        if removed > 0 {
            tracing::info!(removed, "Expired cache entries purged");
        } else {
            tracing::debug!("No expired cache entries");
        }
        removed
    }

    async fn refresh_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            cities = self.cities.len(),
            interval_secs = self.refresh_interval.as_secs(),
            "Refresh job started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.refresh_interval) => {
                    let refreshed = self.refresh_all().await;
                    let next_run = self.clock.now() + chrono::Duration::seconds(self.refresh_interval.as_secs() as i64);
                    tracing::info!(refreshed, next_run = %next_run, "Refresh run finished");
                }
            }
        }

        tracing::info!("Refresh job stopping");
    }

    async fn sweep_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.sweep_interval.as_secs(), "Sweep job started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.sweep_interval) => {
                    self.sweep().await;
                }
            }
        }

        tracing::info!("Sweep job stopping");
    }

    /// Start both loops. They stop once `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let scheduler = Arc::new(self);
        let mut handles = Vec::with_capacity(2);

        if !scheduler.cities.is_empty() {
            handles.push(tokio::spawn(scheduler.clone().refresh_loop(cancel.clone())));
        }
        handles.push(tokio::spawn(scheduler.sweep_loop(cancel)));

        handles
    }
}
