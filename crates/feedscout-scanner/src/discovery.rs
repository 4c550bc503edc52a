//! Incremental discovery over an infinitely scrolling feed.
//!
//! The loop owns the per-session counters. Each call to
//! [`DiscoveryLoop::next_delta`] runs iterations until the feed grows or
//! discovery ends, returning only the newly revealed slice of items.

use crate::batch::ItemHandle;
use crate::error::{Result, ScanError};
use feedscout_browser::PageSurface;
use feedscout_core::{CrawlConfig, SiteConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why discovery stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryEnd {
    /// The cancellation token was observed at an iteration boundary
    Cancelled,
    /// The scroll attempt ceiling was reached
    Exhausted,
    /// The feed stopped growing for the configured number of iterations
    NoNewResults,
    /// The requested number of records was reached
    TargetReached,
}

/// Drives the feed page and reports newly revealed items.
pub struct DiscoveryLoop<'a> {
    page: &'a dyn PageSurface,
    crawl: &'a CrawlConfig,
    site: &'a SiteConfig,
    cancel: &'a CancellationToken,
    last_count: usize,
    iterations: u32,
    no_new: u32,
    end: Option<DiscoveryEnd>,
}

impl<'a> DiscoveryLoop<'a> {
    pub fn new(
        page: &'a dyn PageSurface,
        crawl: &'a CrawlConfig,
        site: &'a SiteConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            page,
            crawl,
            site,
            cancel,
            last_count: 0,
            iterations: 0,
            no_new: 0,
            end: None,
        }
    }

    /// Reach the result feed for `query`, retrying with a fixed backoff.
    pub async fn load_feed(&mut self, query: &str) -> Result<()> {
        let attempts = self.crawl.initial_load_retries.max(1);
        let backoff = Duration::from_millis(self.crawl.retry_backoff_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                self.end = Some(DiscoveryEnd::Cancelled);
                return Ok(());
            }

            match self.submit_search(query).await {
                Ok(()) => {
                    tracing::info!(query, attempt, "Result feed loaded");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(query, attempt, "Initial load attempt failed: {}", e);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ScanError::FeedUnreachable {
            attempts,
            reason: last_error,
        })
    }

    async fn submit_search(&self, query: &str) -> feedscout_browser::Result<()> {
        let timeout = Duration::from_secs(self.crawl.initial_load_timeout_secs);
        self.page.navigate(&self.site.home_url, timeout).await?;
        self.page
            .wait_for_selector(&self.site.search_box, timeout)
            .await?;
        self.page.fill_field(&self.site.search_box, query).await?;
        self.page.press_enter(&self.site.search_box).await?;
        self.page.wait_for_selector(&self.site.feed, timeout).await
    }

    /// Stop at the next iteration boundary for a reason other than cancellation.
    pub fn finish(&mut self, reason: DiscoveryEnd) {
        self.end.get_or_insert(reason);
    }

    /// Why discovery ended, if it has.
    pub fn end(&self) -> Option<DiscoveryEnd> {
        self.end
    }

    /// Iterations run so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Items seen in the feed so far.
    pub fn discovered(&self) -> usize {
        self.last_count
    }

    /// Run iterations until new items appear.
    ///
    /// Returns `Ok(None)` once discovery has ended. Only a destroyed page is
    /// an error. Other iteration failures are logged and count toward the
    /// scroll ceiling, but leave the no-growth streak unchanged.
    pub async fn next_delta(&mut self) -> Result<Option<Vec<ItemHandle>>> {
        loop {
            if self.end.is_some() {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                tracing::info!(iterations = self.iterations, "Discovery cancelled");
                self.end = Some(DiscoveryEnd::Cancelled);
                return Ok(None);
            }
            if self.iterations >= self.crawl.max_scroll_attempts {
                tracing::info!(
                    iterations = self.iterations,
                    "Scroll ceiling reached, ending discovery"
                );
                self.end = Some(DiscoveryEnd::Exhausted);
                return Ok(None);
            }
            self.iterations += 1;

            match self.reveal_more().await {
                Ok(items) if items.len() > self.last_count => {
                    let delta: Vec<ItemHandle> = items
                        .into_iter()
                        .enumerate()
                        .skip(self.last_count)
                        .map(|(position, element)| ItemHandle::new(element, position))
                        .collect();
                    tracing::debug!(
                        iteration = self.iterations,
                        from = self.last_count,
                        to = self.last_count + delta.len(),
                        "Feed grew"
                    );
                    self.last_count += delta.len();
                    self.no_new = 0;
                    return Ok(Some(delta));
                }
                Ok(_) => self.record_no_growth().await,
                Err(e) if e.is_target_closed() => {
                    tracing::error!(iteration = self.iterations, "Feed page destroyed: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(iteration = self.iterations, "Discovery iteration failed: {}", e);
                }
            }
        }
    }

    async fn reveal_more(&self) -> feedscout_browser::Result<Vec<feedscout_browser::DynElement>> {
        self.page.evaluate(&self.scroll_script()?).await?;
        self.page.wheel(self.crawl.wheel_delta).await?;
        tokio::time::sleep(Duration::from_millis(self.crawl.settle_delay_ms)).await;
        self.page.query_all(&self.site.listing).await
    }

    async fn record_no_growth(&mut self) {
        self.no_new += 1;
        tracing::debug!(
            iteration = self.iterations,
            streak = self.no_new,
            "No new results"
        );
        if self.no_new < self.crawl.no_new_results_threshold {
            return;
        }

        if let Err(e) = self.page.click(&self.site.show_more).await {
            tracing::debug!("No show-more affordance: {}", e);
        }
        tracing::info!(
            discovered = self.last_count,
            "Feed stopped growing, ending discovery"
        );
        self.end = Some(DiscoveryEnd::NoNewResults);
    }

    fn scroll_script(&self) -> feedscout_browser::Result<String> {
        let feed = serde_json::to_string(&self.site.feed)
            .map_err(|e| feedscout_browser::BrowserError::EvaluationError(e.to_string()))?;
        Ok(format!(
            "(() => {{ const feed = document.querySelector({feed}); \
             if (feed) {{ feed.scrollTop = feed.scrollHeight; }} return !!feed; }})()"
        ))
    }
}
