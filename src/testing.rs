//! Test doubles for the fetch layer.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::fetcher::{AsyncBackend, BlockingBackend, FetchRequest};

/// Async backend serving canned pages by URL.
#[derive(Default, Clone)]
pub(crate) struct MockBackend {
    /// Page bodies by exact URL
    pages: Arc<RwLock<HashMap<String, String>>>,

    /// URLs that fail with a transport error
    failing: Arc<RwLock<HashSet<String>>>,

    /// Every request received, in order
    requests: Arc<RwLock<Vec<FetchRequest>>>,

    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), body.into());
        self
    }

    pub fn with_failure(self, url: impl Into<String>) -> Self {
        self.failing.write().unwrap().insert(url.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl AsyncBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().unwrap().push(request.clone());

        if self.failing.read().unwrap().contains(&request.url) {
            return Err(Error::transport(&request.url, "connection refused"));
        }
        self.pages
            .read()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| Error::transport(&request.url, "no such page"))
    }
}

/// Blocking backend that sleeps, then returns a fixed body, tracking how
/// many calls overlap.
#[derive(Clone)]
pub(crate) struct MockBlockingBackend {
    body: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockBlockingBackend {
    pub fn new(body: impl Into<String>, delay: Duration) -> Self {
        Self {
            body: body.into(),
            delay,
            calls: Arc::default(),
            active: Arc::default(),
            max_active: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl BlockingBackend for MockBlockingBackend {
    fn name(&self) -> &'static str {
        "mock-blocking"
    }

    fn fetch_blocking(&self, _request: &FetchRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        std::thread::sleep(self.delay);

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}
