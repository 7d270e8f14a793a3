//! Proxy rotation for rendering backends.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A read-only list of proxy servers with an injected random source.
///
/// Every fetch draws one proxy uniformly at random; there is no affinity
/// between calls.
#[derive(Debug)]
pub struct ProxyPool {
    servers: Arc<[String]>,
    rng: Mutex<StdRng>,
}

impl ProxyPool {
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rng(servers, StdRng::from_entropy())
    }

    /// Pool with a caller-provided (e.g. seeded) random source.
    pub fn with_rng<I, S>(servers: I, rng: StdRng) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            rng: Mutex::new(rng),
        }
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Pick a proxy URL for one fetch, `None` for an empty pool.
    pub fn choose(&self) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.servers.choose(&mut *rng).map(|server| proxy_url(server))
    }
}

/// Bare `host:port` entries are treated as HTTPS proxies.
fn proxy_url(server: &str) -> String {
    if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}
