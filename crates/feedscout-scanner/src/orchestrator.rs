//! Crawl session orchestration.
//!
//! A [`FeedScanner`] runs one self-contained session per call to
//! [`FeedScanner::scan`]: it owns a fresh dedup store and worker pool for
//! that session, streams every accepted record to the caller as its batch
//! settles, and always releases the browser and the pool before returning.

use crate::batch::BatchProcessor;
use crate::dedup::DedupStore;
use crate::discovery::{DiscoveryEnd, DiscoveryLoop};
use crate::error::{Result, ScanError};
use crate::parser::FieldParser;
use crate::pool::WorkerPool;
use feedscout_browser::{BrowsingSession, PageSurface, SessionLauncher};
use feedscout_core::{is_available, AppConfig, ExtractionRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Parameters of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Search text submitted to the site
    pub query: String,
    /// Stop once this many records have streamed; `None` is unbounded
    pub target: Option<usize>,
    /// Run the enrichment lookup for records with a website
    pub enrich: bool,
    /// Only stream records whose postal code equals this value
    pub postal_filter: Option<String>,
}

impl ScanRequest {
    /// Unbounded, unenriched, unfiltered request for `query`.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            target: None,
            enrich: false,
            postal_filter: None,
        }
    }

    /// Bound the crawl. Zero means unbounded.
    #[must_use]
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = (target > 0).then_some(target);
        self
    }

    /// Enable or disable enrichment.
    #[must_use]
    pub fn with_enrichment(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    /// Keep only records in the given postal code. Blank input clears the filter.
    #[must_use]
    pub fn with_postal_filter(mut self, postal_code: impl Into<String>) -> Self {
        let code = postal_code.into().trim().to_string();
        self.postal_filter = (!code.is_empty()).then_some(code);
        self
    }
}

/// Progress reported alongside each streamed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    /// Records streamed so far, including the current one
    pub streamed: usize,
    /// Requested record count, if bounded
    pub target: Option<usize>,
}

impl ScanProgress {
    /// Completion percentage, capped at 100. Always 0 for unbounded crawls.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        match self.target {
            Some(target) if target > 0 => {
                (self.streamed as f64 / target as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }
}

/// Runs crawl sessions against a site through a [`SessionLauncher`].
pub struct FeedScanner {
    launcher: Arc<dyn SessionLauncher>,
    config: AppConfig,
    parser: FieldParser,
}

impl FeedScanner {
    /// Create a scanner, rejecting settings that would stall the crawl.
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let parser = FieldParser::from_site(&config.site)?;
        Ok(Self {
            launcher,
            config,
            parser,
        })
    }

    /// Settings this scanner runs with.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Crawl the feed for `request.query`.
    ///
    /// Each accepted record is passed to `on_record` as soon as its batch
    /// settles. Cancelling `cancel` stops the crawl at the next iteration or
    /// batch boundary; records already in flight still stream. Returns every
    /// streamed record on normal or cancelled termination.
    pub async fn scan<F>(
        &self,
        request: ScanRequest,
        on_record: F,
        cancel: CancellationToken,
    ) -> Result<Vec<ExtractionRecord>>
    where
        F: FnMut(&ExtractionRecord, ScanProgress) + Send,
    {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ScanError::InvalidRequest("query must not be empty".to_string()));
        }

        tracing::info!(
            query,
            target = ?request.target,
            enrich = request.enrich,
            "Starting scan"
        );

        let pool = WorkerPool::new(self.launcher.clone(), self.config.enrichment.clone());
        pool.start().await;

        let mut sink = SessionSink::new(&request, on_record);
        let outcome = self
            .run_session(query, &request, &pool, &mut sink, &cancel)
            .await;

        pool.shutdown().await;

        let streamed = sink.records.len();
        match outcome {
            Ok(end) => {
                tracing::info!(query, streamed, end = ?end, "Scan finished");
                Ok(sink.records)
            }
            Err(ScanError::Browser(e)) if e.is_target_closed() => {
                tracing::error!(query, streamed, "Scan aborted: {}", e);
                Err(ScanError::TargetClosed { streamed })
            }
            Err(e) => {
                tracing::error!(query, streamed, "Scan failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_session<F>(
        &self,
        query: &str,
        request: &ScanRequest,
        pool: &WorkerPool,
        sink: &mut SessionSink<F>,
        cancel: &CancellationToken,
    ) -> Result<Option<DiscoveryEnd>>
    where
        F: FnMut(&ExtractionRecord, ScanProgress) + Send,
    {
        let session = self.launcher.launch().await?;

        let outcome = match session.open_page().await {
            Ok(page) => {
                let outcome = self
                    .crawl(query, request, session.as_ref(), page.as_ref(), pool, sink, cancel)
                    .await;
                if let Err(e) = page.close().await {
                    tracing::debug!("Failed to close feed page: {}", e);
                }
                outcome
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn crawl<F>(
        &self,
        query: &str,
        request: &ScanRequest,
        session: &dyn BrowsingSession,
        page: &dyn PageSurface,
        pool: &WorkerPool,
        sink: &mut SessionSink<F>,
        cancel: &CancellationToken,
    ) -> Result<Option<DiscoveryEnd>>
    where
        F: FnMut(&ExtractionRecord, ScanProgress) + Send,
    {
        let crawl = &self.config.crawl;
        let site = &self.config.site;

        let mut discovery = DiscoveryLoop::new(page, crawl, site, cancel);
        discovery.load_feed(query).await?;

        let dedup = Mutex::new(DedupStore::new());
        let processor = BatchProcessor::new(
            session,
            pool,
            &dedup,
            &self.parser,
            site,
            crawl,
            cancel,
            request.enrich,
        );

        while let Some(delta) = discovery.next_delta().await? {
            let found = delta.len();
            let summary = processor
                .process(delta, &mut |record: ExtractionRecord| sink.accept(record))
                .await;
            tracing::debug!(
                found,
                produced = summary.produced,
                discarded = summary.discarded,
                streamed = sink.records.len(),
                "Processed discovery delta"
            );

            if sink.target_reached() {
                tracing::info!(streamed = sink.records.len(), "Target count reached");
                discovery.finish(DiscoveryEnd::TargetReached);
            }
        }

        tracing::debug!(
            iterations = discovery.iterations(),
            discovered = discovery.discovered(),
            processed = dedup.lock().await.len(),
            "Discovery ended"
        );
        Ok(discovery.end())
    }
}

/// Accepted records of one session plus the caller's streaming callback.
struct SessionSink<F> {
    records: Vec<ExtractionRecord>,
    fingerprints: HashSet<(String, String, String)>,
    postal_filter: Option<String>,
    target: Option<usize>,
    on_record: F,
}

impl<F> SessionSink<F>
where
    F: FnMut(&ExtractionRecord, ScanProgress),
{
    fn new(request: &ScanRequest, on_record: F) -> Self {
        Self {
            records: Vec::new(),
            fingerprints: HashSet::new(),
            postal_filter: request.postal_filter.clone(),
            target: request.target,
            on_record,
        }
    }

    fn accept(&mut self, record: ExtractionRecord) {
        if let Some(filter) = &self.postal_filter {
            if !is_available(&record.postal_code) || record.postal_code != *filter {
                return;
            }
        }
        if !self.fingerprints.insert(record.fingerprint()) {
            tracing::trace!("Suppressing repeated listing for {}", record.name);
            return;
        }

        self.records.push(record);
        let progress = ScanProgress {
            streamed: self.records.len(),
            target: self.target,
        };
        if let Some(record) = self.records.last() {
            (self.on_record)(record, progress);
        }
    }

    fn target_reached(&self) -> bool {
        self.target.is_some_and(|target| self.records.len() >= target)
    }
}
