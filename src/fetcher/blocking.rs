//! Blocking fetching with ureq.

use std::fmt;
use std::time::Duration;

use ureq::{Agent, Proxy, RequestBuilder};

use super::{BlockingBackend, FetchRequest, ProxyPool, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP backend, optionally rotating through a proxy pool.
///
/// Always dispatched on the worker pool by [`Fetcher`](super::Fetcher).
pub struct UreqBackend {
    agent: Agent,
    proxies: Option<ProxyPool>,
    timeout: Duration,
}

impl UreqBackend {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout, None),
            proxies: None,
            timeout,
        }
    }

    /// Route each fetch through a proxy drawn from `proxies`.
    pub fn with_proxies(mut self, proxies: ProxyPool) -> Self {
        self.proxies = (!proxies.is_empty()).then_some(proxies);
        self
    }

    fn agent_for(&self, request: &FetchRequest) -> Result<Agent> {
        let timeout = request.timeout().unwrap_or(self.timeout);
        let proxy = match self.proxies.as_ref().and_then(ProxyPool::choose) {
            Some(server) => {
                Some(Proxy::new(&server).map_err(|e| Error::transport(&request.url, e))?)
            }
            None if timeout == self.timeout => return Ok(self.agent.clone()),
            None => None,
        };
        Ok(build_agent(timeout, proxy))
    }
}

impl Default for UreqBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqBackend")
            .field("proxies", &self.proxies)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn build_agent(timeout: Duration, proxy: Option<Proxy>) -> Agent {
    Agent::new_with_config(
        Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(DEFAULT_USER_AGENT)
            .http_status_as_error(false)
            .proxy(proxy)
            .build(),
    )
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl BlockingBackend for UreqBackend {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn fetch_blocking(&self, request: &FetchRequest) -> Result<String> {
        let agent = self.agent_for(request)?;
        let url = request.url.as_str();
        let form = request
            .payload
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()));

        let response = match request.method.to_uppercase().as_str() {
            "GET" => with_headers(agent.get(url), &request.headers).call(),
            "HEAD" => with_headers(agent.head(url), &request.headers).call(),
            "DELETE" => with_headers(agent.delete(url), &request.headers).call(),
            "POST" => with_headers(agent.post(url), &request.headers).send_form(form),
            "PUT" => with_headers(agent.put(url), &request.headers).send_form(form),
            other => {
                return Err(Error::Misconfigured(format!(
                    "unsupported HTTP method {other:?} for the blocking backend"
                )))
            }
        }
        .map_err(|e| Error::transport(url, e))?;

        response
            .into_body()
            .read_to_string()
            .map_err(|e| Error::transport(url, e))
    }
}
