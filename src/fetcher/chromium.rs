//! Browser rendering with a headless Chromium driven over CDP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tracing::debug;

use super::{BlockingBackend, FetchRequest, ProxyPool, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Find a Chromium binary: `DATALAND_CHROMIUM_PATH` first, then the usual
/// names on `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("DATALAND_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Renders each page in a fresh headless browser and returns the final DOM.
///
/// Driving the browser blocks the calling thread, so this is a
/// [`BlockingBackend`] and runs on the worker pool.
#[derive(Debug)]
pub struct ChromiumBackend {
    executable: PathBuf,
    proxies: Option<ProxyPool>,
    timeout: Duration,
}

impl ChromiumBackend {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            proxies: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Backend for the first Chromium binary found, if any.
    pub fn detect() -> Option<Self> {
        find_chromium().map(Self::new)
    }

    pub fn with_proxies(mut self, proxies: ProxyPool) -> Self {
        self.proxies = (!proxies.is_empty()).then_some(proxies);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    async fn render(&self, url: &str, proxy: Option<String>, timeout: Duration) -> Result<String> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.executable)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={DEFAULT_USER_AGENT}"));
        if let Some(proxy) = &proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let config = builder
            .build()
            .map_err(|e| Error::Misconfigured(format!("failed to build browser config: {e}")))?;

        debug!(url, proxy = ?proxy, "launching browser");
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::transport(url, e))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page_html = async {
            let page = browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            page.content().await
        };
        let result: std::result::Result<std::result::Result<String, CdpError>, _> =
            tokio::time::timeout(timeout, page_html).await;

        let _ = browser.close().await;
        events.abort();

        match result {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(Error::transport(url, e)),
            Err(_) => Err(Error::transport(
                url,
                format!("render timed out after {}ms", timeout.as_millis()),
            )),
        }
    }
}

impl BlockingBackend for ChromiumBackend {
    fn name(&self) -> &'static str {
        "chromium"
    }

    fn fetch_blocking(&self, request: &FetchRequest) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        let proxy = self.proxies.as_ref().and_then(ProxyPool::choose);
        let timeout = request.timeout().unwrap_or(self.timeout);

        runtime.block_on(self.render(&request.url, proxy, timeout))
    }
}
