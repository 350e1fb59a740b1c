//! Batched, deadline-bounded fan-out across connectors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rentwire_core::{AppConfig, Clock, Portal, RawListing, SearchCriteria};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};

use crate::connectors::{Connector, ConnectorError};

/// What one connector contributed to a run.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub portal: Portal,
    /// Raw records in the portal's own order; empty on error.
    pub listings: Vec<RawListing>,
    pub error: Option<ConnectorError>,
    pub elapsed_ms: u64,
}

impl SourceOutcome {
    fn failed(portal: Portal, error: ConnectorError, elapsed: Duration) -> Self {
        Self { portal, listings: Vec::new(), error: Some(error), elapsed_ms: elapsed.as_millis() as u64 }
    }
}

/// Runs connectors in sequential batches of parallel tasks.
///
/// Failures and panics are isolated per connector. The orchestrator never
/// retries; that is the request executor's job.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    concurrency_limit: usize,
    inter_batch_delay: Duration,
    deadline: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(concurrency_limit: usize, inter_batch_delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { concurrency_limit: concurrency_limit.max(1), inter_batch_delay, deadline: None, clock }
    }

    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.concurrency_limit, config.inter_batch_delay(), clock).with_deadline(config.search_deadline())
    }

    /// Abort whatever is still running once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Invoke every connector once; one outcome per connector, in input order.
    pub async fn run(&self, criteria: &SearchCriteria, connectors: &[Arc<dyn Connector>]) -> Vec<SourceOutcome> {
        let started = Instant::now();
        let deadline = self.deadline.map(|d| started + d);
        let mut outcomes: Vec<Option<SourceOutcome>> = connectors.iter().map(|_| None).collect();

        'batches: for (batch_no, batch) in connectors.chunks(self.concurrency_limit).enumerate() {
            if batch_no > 0 && !self.inter_batch_delay.is_zero() {
                let pause = self.clock.sleep(self.inter_batch_delay);
                match deadline {
                    Some(at) => {
                        if timeout_at(at, pause).await.is_err() {
                            break 'batches;
                        }
                    }
                    None => pause.await,
                }
            }
            if deadline.is_some_and(|at| Instant::now() >= at) {
                break;
            }

            let offset = batch_no * self.concurrency_limit;
            let mut tasks = JoinSet::new();
            let mut slots = HashMap::new();

            for (i, connector) in batch.iter().enumerate() {
                let connector = Arc::clone(connector);
                let criteria = criteria.clone();
                let handle = tasks.spawn(async move {
                    let begun = Instant::now();
                    let result = connector.search(&criteria).await;
                    (result, begun.elapsed())
                });
                slots.insert(handle.id(), offset + i);
            }

            loop {
                let joined = match deadline {
                    Some(at) => match timeout_at(at, tasks.join_next_with_id()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            tasks.abort_all();
                            break 'batches;
                        }
                    },
                    None => tasks.join_next_with_id().await,
                };
                let Some(joined) = joined else { break };

                let (slot, outcome) = match joined {
                    Ok((id, (result, elapsed))) => {
                        let Some(&slot) = slots.get(&id) else { continue };
                        let portal = connectors[slot].portal();
                        let outcome = match result {
                            Ok(listings) => {
                                SourceOutcome { portal, listings, error: None, elapsed_ms: elapsed.as_millis() as u64 }
                            }
                            Err(error) => {
                                tracing::warn!(portal = portal.id(), error = %error, "Connector failed");
                                SourceOutcome::failed(portal, error, elapsed)
                            }
                        };
                        (slot, outcome)
                    }
                    Err(join_error) => {
                        let Some(&slot) = slots.get(&join_error.id()) else { continue };
                        let portal = connectors[slot].portal();
                        let reason = if join_error.is_panic() { "connector task panicked" } else { "connector task cancelled" };
                        tracing::error!(portal = portal.id(), error = %join_error, "Connector contract violation");
                        let error = ConnectorError::ContractViolation(reason.into());
                        (slot, SourceOutcome::failed(portal, error, started.elapsed()))
                    }
                };
                outcomes[slot] = Some(outcome);
            }
        }

        let elapsed = started.elapsed();
        outcomes
            .into_iter()
            .zip(connectors)
            .map(|(outcome, connector)| {
                outcome.unwrap_or_else(|| {
                    tracing::warn!(portal = connector.portal().id(), "Search deadline exceeded");
                    SourceOutcome::failed(connector.portal(), ConnectorError::DeadlineExceeded, elapsed)
                })
            })
            .collect()
    }
}
