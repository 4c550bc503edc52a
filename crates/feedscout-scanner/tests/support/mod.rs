//! Scripted in-memory site used by the scanner integration tests.

#![allow(dead_code)]

use feedscout_browser::{
    BrowserError, BrowsingSession, DynElement, ElementHandle, PageSurface, Result,
    SessionLauncher,
};
use feedscout_core::{AppConfig, SiteConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with every delay that tests do not care about set to zero.
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.crawl.settle_delay_ms = 0;
    config.crawl.retry_backoff_ms = 0;
    config.enrichment.settle_delay_ms = 0;
    config
}

/// One entry in the feed and the detail fields its page shows.
#[derive(Debug, Clone)]
pub struct Listing {
    pub url: String,
    pub label: String,
    fields: HashMap<String, String>,
}

impl Listing {
    pub fn new(url: &str, label: &str) -> Self {
        Self {
            url: url.to_string(),
            label: label.to_string(),
            fields: HashMap::new(),
        }
    }

    fn with(mut self, selector: &str, value: &str) -> Self {
        self.fields.insert(selector.to_string(), value.to_string());
        self
    }

    pub fn website(self, value: &str) -> Self {
        let selector = SiteConfig::default().website;
        self.with(&selector, value)
    }

    pub fn address(self, value: &str) -> Self {
        let selector = SiteConfig::default().address;
        self.with(&selector, value)
    }

    pub fn phone(self, value: &str) -> Self {
        let selector = SiteConfig::default().phone;
        self.with(&selector, value)
    }

    pub fn rating(self, value: &str) -> Self {
        let selector = SiteConfig::default().rating;
        self.with(&selector, value)
    }

    pub fn reviews(self, value: &str) -> Self {
        let selector = SiteConfig::default().reviews;
        self.with(&selector, value)
    }

    pub fn category(self, value: &str) -> Self {
        let selector = SiteConfig::default().category;
        self.with(&selector, value)
    }
}

/// A numbered listing with a unique address, so no two are content duplicates.
pub fn listing(n: usize) -> Listing {
    Listing::new(
        &format!("https://www.google.com/maps/place/cafe-{n}"),
        &format!("Cafe {n}"),
    )
    .address(&format!("{n} Main St, Pune, Maharashtra 4110{n:02}"))
    .phone("020-5551234")
}

#[derive(Default)]
struct Web {
    pages: HashMap<String, String>,
    stall: Option<Duration>,
    slow: HashMap<String, Duration>,
}

/// Shared state behind every fake launcher, session and page.
pub struct FakeSite {
    site: SiteConfig,
    listings: Vec<Listing>,
    growth: Vec<usize>,
    reveal_step: AtomicUsize,
    visible: AtomicUsize,
    home_failures: AtomicUsize,
    close_after_reveals: Option<usize>,
    flaky_reveal: Option<usize>,
    reveal_attempts: AtomicUsize,
    failing_details: Vec<String>,
    failing_page_open: Option<usize>,
    page_opens: AtomicUsize,
    web: Mutex<Web>,
    detail_visits: Mutex<HashMap<String, usize>>,
    pub launches: AtomicUsize,
    pub open_pages: AtomicIsize,
    pub open_sessions: AtomicIsize,
    pub show_more_clicks: AtomicUsize,
    pub home_loads: AtomicUsize,
}

impl FakeSite {
    /// A feed holding `listings`. By default every listing is visible after
    /// the first reveal and the feed never grows again.
    pub fn new(listings: Vec<Listing>) -> Self {
        let total = listings.len();
        Self {
            site: SiteConfig::default(),
            listings,
            growth: vec![total],
            reveal_step: AtomicUsize::new(0),
            visible: AtomicUsize::new(0),
            home_failures: AtomicUsize::new(0),
            close_after_reveals: None,
            flaky_reveal: None,
            reveal_attempts: AtomicUsize::new(0),
            failing_details: Vec::new(),
            failing_page_open: None,
            page_opens: AtomicUsize::new(0),
            web: Mutex::new(Web::default()),
            detail_visits: Mutex::new(HashMap::new()),
            launches: AtomicUsize::new(0),
            open_pages: AtomicIsize::new(0),
            open_sessions: AtomicIsize::new(0),
            show_more_clicks: AtomicUsize::new(0),
            home_loads: AtomicUsize::new(0),
        }
    }

    /// Visible listing count after each reveal; the last entry repeats.
    pub fn with_growth(mut self, growth: Vec<usize>) -> Self {
        self.growth = growth;
        self
    }

    /// Fail the first `count` navigations to the home page.
    pub fn with_home_failures(self, count: usize) -> Self {
        self.home_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Destroy the feed page once it has revealed `reveals` times.
    pub fn with_target_closed_after(mut self, reveals: usize) -> Self {
        self.close_after_reveals = Some(reveals);
        self
    }

    /// Fail the `attempt`-th scroll script (1-based) with a non-fatal error.
    pub fn with_flaky_reveal(mut self, attempt: usize) -> Self {
        self.flaky_reveal = Some(attempt);
        self
    }

    /// Fail every navigation to the detail page at `url`.
    pub fn with_detail_failure(mut self, url: &str) -> Self {
        self.failing_details.push(url.to_string());
        self
    }

    /// Fail the `nth` page opened across all sessions (1-based).
    pub fn with_failing_page_open(mut self, nth: usize) -> Self {
        self.failing_page_open = Some(nth);
        self
    }

    /// Serve `html` at `url`, but only after `stall`.
    pub fn with_slow_page(self, url: &str, html: &str, stall: Duration) -> Self {
        {
            let mut web = self.lock_web();
            web.pages.insert(url.to_string(), html.to_string());
            web.slow.insert(url.to_string(), stall);
        }
        self
    }

    /// Serve `html` at `url` to enrichment workers.
    pub fn with_web_page(self, url: &str, html: &str) -> Self {
        self.lock_web().pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Make every website read hang for `stall`.
    pub fn with_web_stall(self, stall: Duration) -> Self {
        self.lock_web().stall = Some(stall);
        self
    }

    pub fn into_launcher(self) -> (Arc<FakeSite>, Arc<dyn SessionLauncher>) {
        let site = Arc::new(self);
        let launcher: Arc<dyn SessionLauncher> = Arc::new(FakeLauncher(site.clone()));
        (site, launcher)
    }

    /// Detail page navigations per listing URL.
    pub fn visits(&self, url: &str) -> usize {
        self.lock_visits().get(url).copied().unwrap_or(0)
    }

    pub fn total_visits(&self) -> usize {
        self.lock_visits().values().sum()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Whether every page and session handed out has been closed.
    pub fn all_closed(&self) -> bool {
        self.open_pages.load(Ordering::SeqCst) == 0
            && self.open_sessions.load(Ordering::SeqCst) == 0
    }

    fn lock_web(&self) -> std::sync::MutexGuard<'_, Web> {
        self.web.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_visits(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.detail_visits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn listing_by_url(&self, url: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.url == url)
    }

    fn reveals(&self) -> usize {
        self.reveal_step.load(Ordering::SeqCst)
    }
}

struct FakeLauncher(Arc<FakeSite>);

#[async_trait::async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        self.0.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession(self.0.clone())))
    }
}

struct FakeSession(Arc<FakeSite>);

#[async_trait::async_trait]
impl BrowsingSession for FakeSession {
    async fn open_page(&self) -> Result<Box<dyn PageSurface>> {
        let nth = self.0.page_opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.0.failing_page_open == Some(nth) {
            return Err(BrowserError::ChromiumError("tab crashed".to_string()));
        }
        self.0.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            site: self.0.clone(),
            current: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.0.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Open a standalone page on the fake site.
pub async fn open_page(site: &Arc<FakeSite>) -> Box<dyn PageSurface> {
    site.open_pages.fetch_add(1, Ordering::SeqCst);
    Box::new(FakePage {
        site: site.clone(),
        current: Mutex::new(None),
    })
}

struct FakePage {
    site: Arc<FakeSite>,
    current: Mutex<Option<String>>,
}

impl FakePage {
    fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_current(&self, url: &str) {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(url.to_string());
    }

    fn on_home(&self) -> bool {
        self.current().as_deref() == Some(self.site.site.home_url.as_str())
    }

    fn detail_field(&self, selector: &str) -> Option<String> {
        let url = self.current()?;
        self.site.listing_by_url(&url)?.fields.get(selector).cloned()
    }

    fn check_alive(&self) -> Result<()> {
        match self.site.close_after_reveals {
            Some(limit) if self.on_home() && self.site.reveals() >= limit => Err(
                BrowserError::TargetClosed("Target closed".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PageSurface for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let site = &self.site;

        if url == site.site.home_url {
            site.home_loads.fetch_add(1, Ordering::SeqCst);
            let failing = site
                .home_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(BrowserError::NavigationError(format!("{url}: net::ERR_FAILED")));
            }
            site.reveal_step.store(0, Ordering::SeqCst);
            site.visible.store(0, Ordering::SeqCst);
        } else if site.listing_by_url(url).is_some() {
            *site.lock_visits().entry(url.to_string()).or_default() += 1;
            if site.failing_details.iter().any(|failing| failing == url) {
                return Err(BrowserError::NavigationError(format!("{url}: net::ERR_TIMED_OUT")));
            }
        } else if !site.lock_web().pages.contains_key(url) {
            return Err(BrowserError::NavigationError(format!("{url}: 404")));
        }

        self.set_current(url);
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.detail_field(selector))
    }

    async fn read_attribute(&self, selector: &str, _name: &str) -> Result<Option<String>> {
        Ok(self.detail_field(selector))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<DynElement>> {
        self.check_alive()?;
        let site = &self.site.site;

        if !self.on_home() {
            return Ok(Vec::new());
        }
        if selector == site.search_box || selector == site.feed {
            return Ok(vec![Arc::new(FakeElement::default()) as DynElement]);
        }
        if selector == site.listing {
            let visible = self.site.visible.load(Ordering::SeqCst);
            return Ok(self
                .site
                .listings
                .iter()
                .take(visible)
                .map(|l| {
                    Arc::new(FakeElement {
                        href: Some(l.url.clone()),
                        label: Some(l.label.clone()),
                    }) as DynElement
                })
                .collect());
        }
        Ok(Vec::new())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        self.check_alive()?;
        let attempt = self.site.reveal_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.site.flaky_reveal == Some(attempt) {
            return Err(BrowserError::EvaluationError("Execution context was destroyed".to_string()));
        }
        Ok(serde_json::Value::Bool(true))
    }

    async fn content(&self) -> Result<String> {
        let (html, stall) = {
            let web = self.site.lock_web();
            let current = self.current();
            let html = current
                .as_ref()
                .and_then(|url| web.pages.get(url).cloned())
                .unwrap_or_default();
            let slow = current.as_ref().and_then(|url| web.slow.get(url).copied());
            (html, slow.or(web.stall))
        };
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        Ok(html)
    }

    async fn fill_field(&self, _selector: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn press_enter(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if selector == self.site.site.show_more {
            self.site.show_more_clicks.fetch_add(1, Ordering::SeqCst);
        }
        Err(BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn wheel(&self, _delta_y: f64) -> Result<()> {
        let site = &self.site;
        let step = site.reveal_step.fetch_add(1, Ordering::SeqCst);
        let visible = site
            .growth
            .get(step)
            .or(site.growth.last())
            .copied()
            .unwrap_or(0)
            .min(site.listings.len());
        site.visible.store(visible, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.site.open_pages.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeElement {
    href: Option<String>,
    label: Option<String>,
}

#[async_trait::async_trait]
impl ElementHandle for FakeElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(match name {
            "href" => self.href.clone(),
            "aria-label" => self.label.clone(),
            _ => None,
        })
    }

    async fn text(&self) -> Result<Option<String>> {
        Ok(self.label.clone())
    }
}
