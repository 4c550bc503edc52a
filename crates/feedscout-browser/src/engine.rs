use crate::actions::{BrowsingSession, DynElement, ElementHandle, PageSurface, SessionLauncher};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchMouseEventParams, DispatchMouseEventType};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use feedscout_core::BrowserConfig;
use futures_util::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Launches headless Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserConfig,
}

impl ChromiumLauncher {
    /// Create a launcher from browser settings
    pub fn new(settings: BrowserConfig) -> Self {
        Self { settings }
    }

    fn chrome_config(&self, fingerprint: &FingerprintConfig) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .args(self.settings.extra_args.clone());

        if !self.settings.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(BrowserError::ChromiumError)
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>> {
        let fingerprint = FingerprintConfig::from_settings(&self.settings);
        let config = self.chrome_config(&fingerprint)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler_task = tokio::spawn(drain_handler(handler));

        tracing::debug!("Launched Chromium session");

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            fingerprint,
        }))
    }
}

/// Poll the CDP handler until the connection ends. Errors for messages the
/// handler cannot decode do not end the connection.
async fn drain_handler<S, E>(mut handler: S) -> usize
where
    S: Stream<Item = std::result::Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut errors = 0;
    while let Some(event) = handler.next().await {
        if let Err(e) = event {
            errors += 1;
            tracing::debug!("Browser handler error: {}", e);
        }
    }
    errors
}

/// One running Chromium process
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<usize>,
    fingerprint: FingerprintConfig,
}

#[async_trait::async_trait]
impl BrowsingSession for ChromiumSession {
    async fn open_page(&self) -> Result<Box<dyn PageSurface>> {
        let page = self.browser.new_page("about:blank").await?;
        page.set_user_agent(SetUserAgentOverrideParams::new(
            self.fingerprint.user_agent.clone(),
        ))
        .await?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            handler_task,
            ..
        } = *self;

        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();
        closed.map(|_| ()).map_err(BrowserError::from)
    }
}

/// A Chromium tab
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn first(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.page.find_elements(selector).await?.into_iter().next())
    }

    async fn require(&self, selector: &str) -> Result<Element> {
        self.first(selector)
            .await?
            .ok_or_else(|| BrowserError::SelectorNotFound(selector.to_string()))
    }
}

#[async_trait::async_trait]
impl PageSurface for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => match BrowserError::from(e) {
                closed @ BrowserError::TargetClosed(_) => Err(closed),
                other => Err(BrowserError::NavigationError(format!("{url}: {other}"))),
            },
            Err(_) => Err(BrowserError::Timeout(format!("navigating to {url}"))),
        }
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        match self.first(selector).await? {
            Some(element) => Ok(element
                .inner_text()
                .await?
                .map(|text| text.trim().to_string())),
            None => Ok(None),
        }
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        match self.first(selector).await? {
            Some(element) => Ok(element.attribute(name).await?),
            None => Ok(None),
        }
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<DynElement>> {
        let elements = self.page.find_elements(selector).await?;
        Ok(elements
            .into_iter()
            .map(|element| Arc::new(ChromiumElement(element)) as DynElement)
            .collect())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| match BrowserError::from(e) {
                closed @ BrowserError::TargetClosed(_) => closed,
                other => BrowserError::EvaluationError(other.to_string()),
            })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.require(selector).await?;
        let quoted = serde_json::to_string(selector)
            .map_err(|e| BrowserError::EvaluationError(e.to_string()))?;
        self.evaluate(&format!(
            "(() => {{ const el = document.querySelector({quoted}); if (el) {{ el.value = ''; }} }})()"
        ))
        .await?;
        element.click().await?.type_str(value).await?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> Result<()> {
        self.require(selector).await?.press_key("Enter").await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.require(selector).await?.click().await?;
        Ok(())
    }

    async fn wheel(&self, delta_y: f64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(400.0)
            .y(400.0)
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(BrowserError::ChromiumError)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(self.page.close().await?)
    }
}

struct ChromiumElement(Element);

#[async_trait::async_trait]
impl ElementHandle for ChromiumElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.attribute(name).await?)
    }

    async fn text(&self) -> Result<Option<String>> {
        Ok(self.0.inner_text().await?)
    }
}
