//! Declarative meta configuration.
//!
//! A [`MetaConfig`] is the serializable form of [`Meta`], for schemas kept
//! in JSON next to the code that resolves them:
//!
//! ```json
//! {"selector": "ul.results li", "base_url": "https://example.com/",
//!  "backend": "blocking", "max_workers": 3, "proxy_list": ["10.0.0.1:8080"],
//!  "headers": {"Accept-Language": "en"}}
//! ```
//!
//! Unrecognised keys become extra fetch parameters.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::fetcher::{BackendConfig, ProxyPool, UreqBackend, DEFAULT_MAX_WORKERS};
use crate::schema::Meta;

/// Which backend an item type fetches with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Non-blocking HTTP (reqwest)
    #[default]
    Http,
    /// Blocking HTTP (ureq) on the worker pool
    Blocking,
    /// Headless Chromium on the worker pool (feature `chromium`)
    Chromium,
    /// Chromium when available, plain HTTP otherwise
    Auto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaConfig {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Proxies for the blocking and Chromium backends, `host:port` or full URLs
    #[serde(default)]
    pub proxy_list: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub extras: IndexMap<String, JsonValue>,
}

impl MetaConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Misconfigured(format!("invalid meta configuration: {e}")))
    }
}

impl Meta {
    /// Build a [`Meta`] from its declarative form.
    pub fn from_config(config: MetaConfig) -> Result<Meta> {
        let MetaConfig {
            selector,
            base_url,
            backend,
            max_workers,
            proxy_list,
            timeout_ms,
            mut extras,
        } = config;

        if let Some(timeout_ms) = timeout_ms {
            extras.insert("timeout_ms".to_string(), timeout_ms.into());
        }
        let timeout = timeout_ms.map(Duration::from_millis);

        let backend = backend_config(backend, proxy_list, timeout)?
            .max_workers(max_workers.unwrap_or(DEFAULT_MAX_WORKERS));

        Ok(Meta {
            selector,
            base_url,
            extras,
            backend,
        })
    }
}

fn backend_config(
    kind: BackendKind,
    proxy_list: Vec<String>,
    timeout: Option<Duration>,
) -> Result<BackendConfig> {
    let proxies = (!proxy_list.is_empty()).then(|| ProxyPool::new(proxy_list));

    match kind {
        BackendKind::Http => {
            if proxies.is_some() {
                return Err(Error::Misconfigured(
                    "proxy_list needs the blocking or chromium backend".to_string(),
                ));
            }
            Ok(BackendConfig::http())
        }
        BackendKind::Blocking => {
            let mut backend = match timeout {
                Some(timeout) => UreqBackend::with_timeout(timeout),
                None => UreqBackend::new(),
            };
            if let Some(proxies) = proxies {
                backend = backend.with_proxies(proxies);
            }
            Ok(BackendConfig::blocking(backend))
        }
        BackendKind::Chromium => chromium_config(proxies, timeout),
        BackendKind::Auto => match chromium_config(proxies, timeout) {
            Ok(config) => Ok(config),
            Err(_) => Ok(BackendConfig::auto()),
        },
    }
}

#[cfg(feature = "chromium")]
fn chromium_config(proxies: Option<ProxyPool>, timeout: Option<Duration>) -> Result<BackendConfig> {
    use crate::fetcher::ChromiumBackend;

    let mut backend = ChromiumBackend::detect()
        .ok_or_else(|| Error::Misconfigured("no Chromium binary found".to_string()))?;
    if let Some(proxies) = proxies {
        backend = backend.with_proxies(proxies);
    }
    if let Some(timeout) = timeout {
        backend = backend.with_timeout(timeout);
    }
    Ok(BackendConfig::blocking(backend))
}

#[cfg(not(feature = "chromium"))]
fn chromium_config(proxies: Option<ProxyPool>, _timeout: Option<Duration>) -> Result<BackendConfig> {
    if proxies.is_some() {
        tracing::warn!("proxy_list ignored: Chromium rendering is not compiled in");
    }
    Err(Error::Misconfigured(
        "the chromium backend needs the `chromium` feature".to_string(),
    ))
}
