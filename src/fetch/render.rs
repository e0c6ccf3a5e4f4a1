// Render strategy: fetches through a headless browser.
//
// The API sits behind a bot-protection layer that challenges plain HTTP
// clients. Loading the URL as a real page navigation lets the browser deal
// with the challenge the same way a user's browser would. POST requests are
// issued with fetch() from inside the page instead.
//
// The browser itself is expensive to start, so there is one engine per
// strategy, launched lazily on first use. Concurrent callers share a single
// in-flight launch. A failed launch is shared by everyone waiting on it and
// then forgotten, so the next caller tries again. Each request gets its own
// page, which is always closed afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{FetchStrategy, ResourceUnavailable};
use crate::upstream::{HttpMethod, UpstreamRequest};

/// Default bound on a single page load or in-page fetch.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Starts rendering engines. Implemented by the Chromium launcher and by
/// test fakes.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>>;
}

/// A running rendering engine that can open pages.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn RenderPage>>;

    /// Stop the engine. Pages still open become unusable.
    async fn shutdown(&self);
}

/// A single browser page (tab).
#[async_trait]
pub trait RenderPage: Send {
    /// Navigate to `url` with extra request headers and return the text
    /// content of the loaded document.
    async fn navigate(&mut self, url: &str, headers: &BTreeMap<String, String>) -> Result<String>;

    /// Run a POST via fetch() from inside the page and return the response text.
    async fn post(
        &mut self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

type EngineCell = Arc<OnceCell<Option<Arc<dyn RenderEngine>>>>;

pub struct RenderStrategy {
    backend: Arc<dyn RenderBackend>,
    engine: Mutex<EngineCell>,
    timeout: Duration,
}

impl RenderStrategy {
    pub fn new(backend: Arc<dyn RenderBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            engine: Mutex::new(Arc::new(OnceCell::new())),
            timeout,
        }
    }

    fn current_cell(&self) -> EngineCell {
        Arc::clone(&self.engine.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Get the shared engine, launching it if needed. `None` means the
    /// launch attempt this caller joined has failed.
    async fn engine(&self) -> Option<Arc<dyn RenderEngine>> {
        let cell = self.current_cell();

        let engine = cell
            .get_or_init(|| async {
                match self.backend.launch().await {
                    Ok(engine) => {
                        info!("Rendering engine started");
                        Some(engine)
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Rendering engine failed to start, using direct requests"
                        );
                        None
                    }
                }
            })
            .await
            .clone();

        if engine.is_none() {
            // Forget the failed attempt so a later caller can retry, unless
            // someone already replaced it.
            let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
            if Arc::ptr_eq(&slot, &cell) {
                *slot = Arc::new(OnceCell::new());
            }
        }

        engine
    }

    /// Drop `engine` from the slot if it is still the current one, so the
    /// next request launches a fresh engine.
    fn forget_engine(&self, engine: &Arc<dyn RenderEngine>) {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let is_current = matches!(slot.get(), Some(Some(current)) if Arc::ptr_eq(current, engine));
        if is_current {
            *slot = Arc::new(OnceCell::new());
            warn!("Rendering engine stopped responding, relaunching on next request");
        }
    }

    /// Whether an engine is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self.current_cell().get(), Some(Some(_)))
    }

    /// Stop the engine if it is running. The next request launches a new one.
    pub async fn shutdown(&self) {
        let previous = {
            let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, Arc::new(OnceCell::new()))
        };

        if let Some(Some(engine)) = previous.get() {
            engine.shutdown().await;
            info!("Rendering engine closed");
        }
    }

    async fn run_on_page(page: &mut dyn RenderPage, request: &UpstreamRequest) -> Result<String> {
        match request.method {
            HttpMethod::Get => page.navigate(&request.url, &request.headers).await,
            HttpMethod::Post => {
                let body = request.body_text().unwrap_or_default();
                page.post(&request.url, &request.headers, &body).await
            }
        }
    }
}

#[async_trait]
impl FetchStrategy for RenderStrategy {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value> {
        let Some(engine) = self.engine().await else {
            return Err(ResourceUnavailable("Rendering engine unavailable".to_string()).into());
        };

        let mut page = match engine.open_page().await {
            Ok(page) => page,
            Err(e) => {
                // A dead browser fails every page; replace it instead
                self.forget_engine(&engine);
                return Err(e.context("Failed to open page"));
            }
        };

        debug!(method = request.method.as_str(), url = %request.url, "Render request");
        let outcome =
            tokio::time::timeout(self.timeout, Self::run_on_page(page.as_mut(), request)).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }

        let text = match outcome {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("Page load timed out after {:?}", self.timeout),
        };

        serde_json::from_str(&text).with_context(|| {
            let preview: String = text.chars().take(200).collect();
            format!("Page did not contain JSON: {preview}")
        })
    }
}
