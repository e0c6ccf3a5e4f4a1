// Headless Chromium render backend (chromiumoxide, over CDP).
//
// The browser is started with the automation-detection features switched
// off and with the low-memory flags needed on small containers. The CDP
// event handler runs on its own task for the lifetime of the browser.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::render::{RenderBackend, RenderEngine, RenderPage};

const LAUNCH_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
    "--disable-features=IsolateOrigins,site-per-process",
    "--no-zygote",
    "--disable-accelerated-2d-canvas",
];

/// Text of a JSON response rendered by the browser: the `<pre>` wrapper
/// Chromium uses for non-HTML documents, or the whole body.
const EXTRACT_TEXT_JS: &str = r#"(() => {
    const pre = document.querySelector('pre');
    if (pre) return pre.textContent;
    return document.body ? (document.body.textContent || document.body.innerText) : '';
})()"#;

/// Launches headless Chromium.
pub struct ChromiumBackend {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumBackend {
    /// `executable` overrides Chromium auto-detection.
    pub fn new(executable: Option<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            executable,
            request_timeout,
        }
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.request_timeout)
            .args(LAUNCH_ARGS.iter().copied());
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser event error");
                }
            }
        });

        Ok(Arc::new(ChromiumEngine {
            browser: Mutex::new(browser),
            events,
        }))
    }
}

struct ChromiumEngine {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn open_page(&self) -> Result<Box<dyn RenderPage>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("Failed to open browser page")?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Failed to reap browser process");
        }
        self.events.abort();
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        self.events.abort();
    }
}

struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn set_headers(&self, headers: &BTreeMap<String, String>) -> Result<()> {
        let headers = Headers::new(serde_json::to_value(headers)?);
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .context("Failed to set request headers")?;
        Ok(())
    }

    async fn eval_string(&self, expression: String) -> Result<String> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(anyhow::Error::msg)?;

        let value: Option<String> = self
            .page
            .evaluate_expression(params)
            .await
            .context("Script evaluation failed")?
            .into_value()
            .context("Script returned a non-string value")?;
        Ok(value.unwrap_or_default())
    }
}

#[async_trait]
impl RenderPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, headers: &BTreeMap<String, String>) -> Result<String> {
        self.set_headers(headers).await?;
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Navigation to {url} failed"))?;
        self.eval_string(EXTRACT_TEXT_JS.to_string()).await
    }

    async fn post(
        &mut self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Result<String> {
        self.set_headers(headers).await?;

        let script = format!(
            "(async () => {{ \
                const r = await fetch({url}, {{ \
                    method: 'POST', headers: {headers}, body: {body} \
                }}); \
                return await r.text(); \
            }})()",
            url = serde_json::to_string(url)?,
            headers = serde_json::to_string(headers)?,
            body = serde_json::to_string(body)?,
        );
        self.eval_string(script).await
    }

    async fn close(&mut self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .context("Failed to close page")
    }
}
