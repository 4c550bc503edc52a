use crate::error::{BrowserError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Interval between presence checks in [`PageSurface::wait_for_selector`].
const SELECTOR_POLL_MS: u64 = 250;

/// A live element reference returned by [`PageSurface::query_all`]
#[async_trait::async_trait]
pub trait ElementHandle: Send + Sync {
    /// Read an attribute of the element
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Read the rendered text of the element
    async fn text(&self) -> Result<Option<String>>;
}

/// Shared element handle
pub type DynElement = Arc<dyn ElementHandle>;

/// A single rendered page that answers structured queries
#[async_trait::async_trait]
pub trait PageSurface: Send + Sync {
    /// Navigate to a URL, failing if it does not load within `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Trimmed text of the first element matching `selector`
    async fn read_text(&self, selector: &str) -> Result<Option<String>>;

    /// Attribute of the first element matching `selector`
    async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// All elements matching `selector`, in document order
    async fn query_all(&self, selector: &str) -> Result<Vec<DynElement>>;

    /// Evaluate a script in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Serialized HTML of the current document
    async fn content(&self) -> Result<String>;

    /// Clear a form field and type a value into it
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Press Enter inside an element
    async fn press_enter(&self, selector: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Dispatch a mouse wheel event over the page
    async fn wheel(&self, delta_y: f64) -> Result<()>;

    /// Close the page
    async fn close(self: Box<Self>) -> Result<()>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.query_all(selector).await?.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "waiting for {selector} after {timeout:?}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(SELECTOR_POLL_MS)).await;
        }
    }
}

/// A browsing session from which independent pages are spawned
#[async_trait::async_trait]
pub trait BrowsingSession: Send + Sync {
    /// Open a new, blank page owned by the caller
    async fn open_page(&self) -> Result<Box<dyn PageSurface>>;

    /// Shut the session down, closing every page it owns
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Creates fresh browsing sessions
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Start a new isolated session
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

/// Trim a website value and give it a scheme if it has none.
///
/// Returns `None` for blank input or input that still fails to parse.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    url::Url::parse(&candidate).ok().map(|_| candidate)
}

/// Append a path segment to a URL, dropping trailing slashes from the base
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
