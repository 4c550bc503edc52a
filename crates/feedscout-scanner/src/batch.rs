//! Bounded-concurrency extraction of newly discovered items.

use crate::dedup::DedupStore;
use crate::parser::{review_count, FieldParser};
use crate::pool::{EnrichmentSubject, WorkerPool};
use feedscout_browser::{BrowsingSession, DynElement, PageSurface};
use feedscout_core::{or_unavailable, CrawlConfig, DedupKey, ExtractionRecord, SiteConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A feed entry that has been discovered but not yet extracted.
#[derive(Clone)]
pub struct ItemHandle {
    element: DynElement,
    position: usize,
}

impl ItemHandle {
    pub fn new(element: DynElement, position: usize) -> Self {
        Self { element, position }
    }

    /// Index of the item in the feed at discovery time.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl std::fmt::Debug for ItemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemHandle")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Counters for one call to [`BatchProcessor::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Batches started
    pub batches: usize,
    /// Records handed to the sink
    pub produced: usize,
    /// Items dropped as duplicates or failures
    pub discarded: usize,
    /// Whether cancellation stopped a batch from starting
    pub cancelled: bool,
}

/// Extracts records for discovered items, a bounded batch at a time.
pub struct BatchProcessor<'a> {
    session: &'a dyn BrowsingSession,
    pool: &'a WorkerPool,
    dedup: &'a Mutex<DedupStore>,
    parser: &'a FieldParser,
    site: &'a SiteConfig,
    crawl: &'a CrawlConfig,
    cancel: &'a CancellationToken,
    enrich: bool,
}

impl<'a> BatchProcessor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: &'a dyn BrowsingSession,
        pool: &'a WorkerPool,
        dedup: &'a Mutex<DedupStore>,
        parser: &'a FieldParser,
        site: &'a SiteConfig,
        crawl: &'a CrawlConfig,
        cancel: &'a CancellationToken,
        enrich: bool,
    ) -> Self {
        Self {
            session,
            pool,
            dedup,
            parser,
            site,
            crawl,
            cancel,
            enrich,
        }
    }

    /// Process `handles` in batches, sending each settled batch's records to
    /// `sink` in completion order before the next batch starts.
    pub async fn process(
        &self,
        handles: Vec<ItemHandle>,
        sink: &mut (dyn FnMut(ExtractionRecord) + Send),
    ) -> BatchSummary {
        let ceiling = self.crawl.batch_concurrency(self.enrich);
        let mut summary = BatchSummary::default();

        for batch in handles.chunks(ceiling) {
            if self.cancel.is_cancelled() {
                tracing::info!("Scan cancelled, not starting further batches");
                summary.cancelled = true;
                break;
            }
            summary.batches += 1;

            let mut in_flight: FuturesUnordered<_> =
                batch.iter().map(|handle| self.process_item(handle)).collect();

            let mut settled = Vec::with_capacity(batch.len());
            while let Some(outcome) = in_flight.next().await {
                match outcome {
                    Some(record) => settled.push(record),
                    None => summary.discarded += 1,
                }
            }

            summary.produced += settled.len();
            for record in settled {
                sink(record);
            }
        }

        summary
    }

    async fn process_item(&self, handle: &ItemHandle) -> Option<ExtractionRecord> {
        let page = match self.session.open_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(position = handle.position, "Could not open detail page: {}", e);
                return None;
            }
        };

        let record = self.extract_item(page.as_ref(), handle).await;

        if let Err(e) = page.close().await {
            tracing::debug!(position = handle.position, "Failed to close detail page: {}", e);
        }
        record
    }

    async fn extract_item(
        &self,
        page: &dyn PageSurface,
        handle: &ItemHandle,
    ) -> Option<ExtractionRecord> {
        let url = match handle.element.attribute("href").await {
            Ok(Some(url)) if !url.trim().is_empty() => url,
            Ok(_) => return None,
            Err(e) => {
                tracing::debug!(position = handle.position, "Could not read item link: {}", e);
                return None;
            }
        };
        let label = or_unavailable(
            handle
                .element
                .attribute(&self.site.label_attribute)
                .await
                .ok()
                .flatten(),
        );

        if !self.dedup.lock().await.admit(DedupKey::new(&url, &label)) {
            tracing::trace!(position = handle.position, "Skipping already processed {}", label);
            return None;
        }

        if let Err(e) = page.navigate(&url, self.crawl.item_timeout(self.enrich)).await {
            tracing::debug!("Dropping {} after navigation failure: {}", label, e);
            return None;
        }

        let mut record = self.read_fields(page, label).await;

        if self.enrich && record.has_website() {
            let outcome = self
                .pool
                .dispatch(EnrichmentSubject {
                    name: record.name.clone(),
                    website: record.website.clone(),
                })
                .await;
            record.email = outcome.into_value();
        }

        Some(record)
    }

    async fn read_fields(&self, page: &dyn PageSurface, label: String) -> ExtractionRecord {
        let site = self.site;
        let (website, address, rating, reviews, category, phone) = futures::join!(
            page.read_attribute(&site.website, "href"),
            page.read_text(&site.address),
            page.read_text(&site.rating),
            page.read_attribute(&site.reviews, "aria-label"),
            page.read_text(&site.category),
            page.read_text(&site.phone),
        );

        let mut record = ExtractionRecord::new(label);
        record.website = or_unavailable(website.ok().flatten());
        record.address = or_unavailable(address.ok().flatten());
        record.rating = or_unavailable(rating.ok().flatten());
        record.reviews = or_unavailable(reviews.ok().flatten().as_deref().and_then(review_count));
        record.category = or_unavailable(category.ok().flatten());

        if let Some(raw) = phone.ok().flatten().filter(|p| !p.trim().is_empty()) {
            let phone = self.parser.normalize_phone(&raw);
            record.phone = phone.local;
            record.country_code = phone.country_code;
        }

        let parts = self.parser.parse_address(&record.address);
        record.city = parts.city;
        record.state = parts.state;
        record.postal_code = parts.postal_code;

        record
    }
}
