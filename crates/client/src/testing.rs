//! In-memory doubles for the HTTP transport and connectors.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rentwire_core::model::raw::field;
use rentwire_core::{Portal, RawListing, SearchCriteria};

use crate::connectors::{Connector, ConnectorError, ConnectorInfo};
use crate::fetch::{FetchCause, HttpRequest, HttpResponse, HttpTransport};

/// Transport that replays a fixed script of responses and records requests.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, FetchCause>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, FetchCause>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchCause> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchCause::Network("script exhausted".into())))
    }
}

/// Connector returning a canned result on every call.
#[derive(Debug)]
pub struct MockConnector {
    portal: Portal,
    result: Result<Vec<RawListing>, ConnectorError>,
    delay: Option<Duration>,
    panics: bool,
    healthy: bool,
    calls: AtomicUsize,
    last_criteria: Mutex<Option<SearchCriteria>>,
}

impl MockConnector {
    pub fn returning(portal: Portal, listings: Vec<RawListing>) -> Self {
        Self {
            portal,
            result: Ok(listings),
            delay: None,
            panics: false,
            healthy: true,
            calls: AtomicUsize::new(0),
            last_criteria: Mutex::new(None),
        }
    }

    pub fn failing(portal: Portal, error: ConnectorError) -> Self {
        Self { result: Err(error), healthy: false, ..Self::returning(portal, Vec::new()) }
    }

    pub fn panicking(portal: Portal) -> Self {
        Self { panics: true, ..Self::returning(portal, Vec::new()) }
    }

    /// Sleep on the tokio clock before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Criteria of the most recent call.
    pub fn last_criteria(&self) -> Option<SearchCriteria> {
        self.last_criteria.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn portal(&self) -> Portal {
        self.portal
    }

    fn describe(&self) -> ConnectorInfo {
        ConnectorInfo {
            name: format!("mock-{}", self.portal.id()),
            portal: self.portal,
            base_url: self.portal.base_url().to_string(),
            rate_limit_ms: 0,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawListing>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_criteria.lock().unwrap() = Some(criteria.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("connector exploded");
        }
        self.result.clone()
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

/// Well-formed raw record; `published` is a `dd.mm.yyyy` date.
pub fn raw_listing(id: u32, published: Option<&str>) -> RawListing {
    let mut raw = RawListing::new()
        .with(field::EXTERNAL_ID, id.to_string())
        .with(field::TITLE, format!("Zimmer {id}"))
        .with(field::URL, format!("/angebot.{id}.html"))
        .with(field::PRICE, format!("{} €", 400 + id))
        .with(field::LOCATION, "Berlin");
    raw.set(field::PUBLISHED, published);
    raw
}
