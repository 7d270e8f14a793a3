//! Document fetching
//!
//! [`Fetcher`] puts one asynchronous contract in front of two kinds of
//! backend:
//! - [`AsyncBackend`]: natively non-blocking (reqwest), awaited directly
//! - [`BlockingBackend`]: blocking (ureq, a driven browser), always run on
//!   the bounded [`WorkerPool`] so the scheduler thread never blocks

pub mod blocking;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod http;
pub mod pool;
pub mod proxy;

pub use blocking::UreqBackend;
#[cfg(feature = "chromium")]
pub use chromium::ChromiumBackend;
pub use http::HttpBackend;
pub use pool::WorkerPool;
pub use proxy::ProxyPool;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::urls::url_concat;

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Default size of the blocking worker pool
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// One outgoing document request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    /// Query parameters merged into the URL before dispatch
    pub params: Vec<(String, String)>,
    /// Form-encoded body
    pub payload: Vec<(String, String)>,
    /// Backend-specific extras, forwarded verbatim
    pub extras: IndexMap<String, JsonValue>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: vec![("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())],
            params: Vec::new(),
            payload: Vec::new(),
            extras: IndexMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Set a header, replacing any existing one with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.push((name.into(), value.into()));
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extras.insert(name.into(), value.into());
        self
    }

    /// Apply an item type's extra fetch parameters.
    ///
    /// `headers`, `params` and `payload` (objects) and `method` (string)
    /// shape the request itself; every other key is forwarded to the backend.
    pub fn with_extras(mut self, extras: &IndexMap<String, JsonValue>) -> Self {
        for (key, value) in extras {
            match (key.as_str(), value) {
                ("headers", JsonValue::Object(_)) => {
                    for (name, value) in json_pairs(value) {
                        self = self.header(name, value);
                    }
                }
                ("params", JsonValue::Object(_)) => self.params.extend(json_pairs(value)),
                ("payload", JsonValue::Object(_)) => self.payload.extend(json_pairs(value)),
                ("method", JsonValue::String(method)) => self.method = method.to_uppercase(),
                _ => {
                    self.extras.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    /// Per-request timeout from the `timeout_ms` extra
    pub fn timeout(&self) -> Option<Duration> {
        self.extras
            .get("timeout_ms")
            .and_then(JsonValue::as_u64)
            .map(Duration::from_millis)
    }
}

fn json_pairs(value: &JsonValue) -> Vec<(String, String)> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// A backend whose fetch is natively non-blocking.
#[async_trait]
pub trait AsyncBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, request: &FetchRequest) -> Result<String>;
}

/// A backend whose fetch blocks the calling thread.
pub trait BlockingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_blocking(&self, request: &FetchRequest) -> Result<String>;
}

/// The configured document retrieval strategy.
#[derive(Clone)]
pub enum Backend {
    Async(Arc<dyn AsyncBackend>),
    Blocking(Arc<dyn BlockingBackend>),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Async(b) => b.name(),
            Backend::Blocking(b) => b.name(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Backend::Blocking(_))
    }
}

/// Which backend an item type fetches with, plus the worker pool that
/// blocking backends run on. Clones share the pool.
#[derive(Clone)]
pub struct BackendConfig {
    backend: Backend,
    pool: WorkerPool,
}

impl BackendConfig {
    /// Plain network fetching with reqwest.
    pub fn http() -> Self {
        Self::asynchronous(HttpBackend::new())
    }

    pub fn asynchronous(backend: impl AsyncBackend + 'static) -> Self {
        Self {
            backend: Backend::Async(Arc::new(backend)),
            pool: WorkerPool::new(DEFAULT_MAX_WORKERS),
        }
    }

    pub fn blocking(backend: impl BlockingBackend + 'static) -> Self {
        Self {
            backend: Backend::Blocking(Arc::new(backend)),
            pool: WorkerPool::new(DEFAULT_MAX_WORKERS),
        }
    }

    /// Browser rendering when a Chromium binary is available, plain HTTP otherwise.
    pub fn auto() -> Self {
        #[cfg(feature = "chromium")]
        if let Some(backend) = ChromiumBackend::detect() {
            return Self::blocking(backend);
        }
        warn!("no Chromium binary available, falling back to plain HTTP fetching");
        Self::http()
    }

    /// Resize the worker pool.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.pool = WorkerPool::new(max_workers);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn fetcher(&self) -> Fetcher {
        Fetcher::new(self.backend.clone(), self.pool.clone())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::http()
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("backend", &self.backend.name())
            .field("blocking", &self.backend.is_blocking())
            .field("max_workers", &self.pool.size())
            .finish()
    }
}

/// The fetch orchestrator.
#[derive(Clone)]
pub struct Fetcher {
    backend: Backend,
    pool: WorkerPool,
}

impl Fetcher {
    pub fn new(backend: Backend, pool: WorkerPool) -> Self {
        Self { backend, pool }
    }

    /// Fetch a document's text.
    ///
    /// An empty URL returns an empty document without touching the backend.
    /// Backend errors are returned as-is; nothing is retried.
    pub async fn fetch(&self, mut request: FetchRequest) -> Result<String> {
        if request.url.trim().is_empty() {
            return Ok(String::new());
        }
        request.url = url_concat(&request.url, &request.params)?;
        request.params.clear();

        match &self.backend {
            Backend::Async(backend) => {
                debug!(backend = backend.name(), url = %request.url, "fetching");
                backend.fetch(&request).await
            }
            Backend::Blocking(backend) => {
                debug!(backend = backend.name(), url = %request.url, "fetching on worker pool");
                let backend = Arc::clone(backend);
                self.pool
                    .run(move || backend.fetch_blocking(&request))
                    .await
            }
        }
    }

    /// [`fetch`](Self::fetch), abandoned with [`Error::Cancelled`] once `token` fires.
    pub async fn fetch_cancellable(
        &self,
        request: FetchRequest,
        token: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = self.fetch(request) => result,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}
