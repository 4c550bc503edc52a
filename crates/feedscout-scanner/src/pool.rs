//! Enrichment worker pool.
//!
//! Each worker is an independent task that owns whatever browser it launches
//! and talks to requesters only through messages. A request carries its own
//! one-shot reply channel, so every dispatch observes exactly one outcome:
//! the worker's answer, a timeout, or a dispatch failure.

use crate::contact::EmailExtractor;
use feedscout_browser::{
    extract_domain, join_path, normalize_url, BrowsingSession, PageSurface, SessionLauncher,
};
use feedscout_core::{EnrichmentConfig, RequestId, UNAVAILABLE};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Pending requests a single worker will queue.
const WORKER_QUEUE_DEPTH: usize = 32;

/// What a worker is asked to look up.
#[derive(Debug, Clone)]
pub struct EnrichmentSubject {
    /// Listing name, used in logs
    pub name: String,
    /// Website as shown on the listing; may lack a scheme
    pub website: String,
}

/// Result of one enrichment round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// The worker found a value
    Found(String),
    /// The worker finished without finding a value
    NotFound,
    /// The worker or the dispatch failed
    Failed(String),
    /// No response arrived within the response timeout
    TimedOut,
}

impl EnrichmentOutcome {
    /// Field value for the record: the found value or the sentinel.
    pub fn into_value(self) -> String {
        match self {
            EnrichmentOutcome::Found(value) => value,
            _ => UNAVAILABLE.to_string(),
        }
    }
}

/// Message sent to a worker.
#[derive(Debug)]
pub struct WorkerRequest {
    /// Correlation id echoed in the response
    pub id: RequestId,
    /// What to look up
    pub subject: EnrichmentSubject,
    reply: oneshot::Sender<WorkerResponse>,
}

/// Message a worker sends back.
#[derive(Debug)]
pub struct WorkerResponse {
    /// Id of the request this answers
    pub request_id: RequestId,
    /// What the worker found
    pub outcome: EnrichmentOutcome,
}

struct WorkerHandle {
    sender: mpsc::Sender<WorkerRequest>,
    task: JoinHandle<()>,
}

/// Fixed-size pool of enrichment workers dispatched round-robin.
pub struct WorkerPool {
    launcher: Arc<dyn SessionLauncher>,
    settings: Arc<EnrichmentConfig>,
    extractor: Arc<EmailExtractor>,
    workers: Mutex<Vec<WorkerHandle>>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Create an empty pool. Workers are spawned by [`WorkerPool::start`] or
    /// lazily on first dispatch.
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: EnrichmentConfig) -> Self {
        let extractor = EmailExtractor::new(settings.denylist.clone());
        Self {
            launcher,
            settings: Arc::new(settings),
            extractor: Arc::new(extractor),
            workers: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
        }
    }

    /// Tear down any existing workers and spawn a fresh set.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        Self::terminate(&mut workers);
        self.spawn_into(&mut workers);
    }

    /// Forcibly stop every worker.
    pub async fn shutdown(&self) {
        let mut workers = self.workers.lock().await;
        let count = workers.len();
        Self::terminate(&mut workers);
        if count > 0 {
            tracing::debug!("Terminated {} enrichment workers", count);
        }
    }

    /// Number of live workers.
    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Whether the pool has no workers.
    pub async fn is_empty(&self) -> bool {
        self.workers.lock().await.is_empty()
    }

    /// Send a lookup to the next worker and wait for its correlated answer.
    ///
    /// Never fails: timeouts and dispatch errors come back as degraded
    /// outcomes.
    pub async fn dispatch(&self, subject: EnrichmentSubject) -> EnrichmentOutcome {
        let id = RequestId::generate();
        let (reply, response) = oneshot::channel();

        let (worker_idx, sender) = {
            let mut workers = self.workers.lock().await;
            if workers.is_empty() {
                tracing::debug!("Worker pool empty, initializing");
                self.spawn_into(&mut workers);
            }
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % workers.len();
            (idx, workers[idx].sender.clone())
        };

        let name = subject.name.clone();
        let request = WorkerRequest {
            id: id.clone(),
            subject,
            reply,
        };
        let timeout = Duration::from_millis(self.settings.response_timeout_ms);

        let round_trip = async {
            sender
                .send(request)
                .await
                .map_err(|_| "worker unavailable".to_string())?;
            response
                .await
                .map_err(|_| "worker dropped the request".to_string())
        };

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(Ok(answer)) if answer.request_id == id => answer.outcome,
            Ok(Ok(answer)) => {
                tracing::warn!(
                    request_id = %id,
                    received = %answer.request_id,
                    "Discarding uncorrelated enrichment response"
                );
                EnrichmentOutcome::Failed("uncorrelated response".to_string())
            }
            Ok(Err(reason)) => {
                tracing::warn!(request_id = %id, worker = worker_idx, "Enrichment dispatch failed for {}: {}", name, reason);
                EnrichmentOutcome::Failed(reason)
            }
            Err(_) => {
                tracing::debug!(request_id = %id, worker = worker_idx, "Enrichment timed out for {} after {:?}", name, timeout);
                EnrichmentOutcome::TimedOut
            }
        }
    }

    fn spawn_into(&self, workers: &mut Vec<WorkerHandle>) {
        let size = self.settings.pool_size.max(1);
        for worker_id in 0..size {
            let (sender, receiver) = mpsc::channel(WORKER_QUEUE_DEPTH);
            let worker = Worker {
                id: worker_id,
                launcher: self.launcher.clone(),
                settings: self.settings.clone(),
                extractor: self.extractor.clone(),
            };
            let task = tokio::spawn(worker.run(receiver));
            workers.push(WorkerHandle { sender, task });
        }
        self.next.store(0, Ordering::Relaxed);
        tracing::debug!("Spawned {} enrichment workers", size);
    }

    fn terminate(workers: &mut Vec<WorkerHandle>) {
        for worker in workers.drain(..) {
            worker.task.abort();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        Self::terminate(self.workers.get_mut());
    }
}

struct Worker {
    id: u32,
    launcher: Arc<dyn SessionLauncher>,
    settings: Arc<EnrichmentConfig>,
    extractor: Arc<EmailExtractor>,
}

impl Worker {
    /// Serve requests concurrently so a slow site never holds up the lookups
    /// queued behind it.
    async fn run(self, mut requests: mpsc::Receiver<WorkerRequest>) {
        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) if request.reply.is_closed() => {
                        tracing::trace!(worker = self.id, request_id = %request.id, "Skipping abandoned request");
                    }
                    Some(request) => in_flight.push(self.serve(request)),
                    None => break,
                },
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.next().await.is_some() {}
    }

    async fn serve(&self, request: WorkerRequest) {
        let WorkerRequest {
            id,
            subject,
            mut reply,
        } = request;

        let Some(outcome) = self.handle(&subject, &mut reply).await else {
            tracing::debug!(worker = self.id, request_id = %id, "Requester gone, abandoned lookup for {}", subject.name);
            return;
        };
        // The requester may have timed out between the check and the send.
        let _ = reply.send(WorkerResponse {
            request_id: id,
            outcome,
        });
    }

    /// Look up `subject`, giving up early once the requester stops waiting.
    /// Returns `None` when abandoned; the browser is released either way.
    async fn handle(
        &self,
        subject: &EnrichmentSubject,
        reply: &mut oneshot::Sender<WorkerResponse>,
    ) -> Option<EnrichmentOutcome> {
        let Some(website) = normalize_url(&subject.website) else {
            return Some(EnrichmentOutcome::NotFound);
        };

        // Fresh browser per request; nothing carries over between lookups.
        let session = tokio::select! {
            launched = self.launcher.launch() => match launched {
                Ok(session) => session,
                Err(e) => return Some(EnrichmentOutcome::Failed(format!("browser launch: {e}"))),
            },
            () = reply.closed() => return None,
        };

        let outcome = match session.open_page().await {
            Ok(page) => {
                let outcome = tokio::select! {
                    outcome = self.search(page.as_ref(), &website) => Some(outcome),
                    () = reply.closed() => None,
                };
                if let Err(e) = page.close().await {
                    tracing::debug!(worker = self.id, "Failed to close worker page: {}", e);
                }
                outcome
            }
            Err(e) => Some(EnrichmentOutcome::Failed(format!("open page: {e}"))),
        };

        Self::close_session(self.id, session).await;
        outcome
    }

    async fn search(&self, page: &dyn PageSurface, website: &str) -> EnrichmentOutcome {
        let domain = extract_domain(website).unwrap_or_else(|_| website.to_string());

        let candidates = std::iter::once(website.to_string()).chain(
            self.settings
                .secondary_paths
                .iter()
                .map(|path| join_path(website, path)),
        );

        for url in candidates {
            if let Some(email) = self.read_email(page, &url).await {
                tracing::debug!(worker = self.id, "Found email for {} at {}", domain, url);
                return EnrichmentOutcome::Found(email);
            }
        }

        EnrichmentOutcome::NotFound
    }

    async fn read_email(&self, page: &dyn PageSurface, url: &str) -> Option<String> {
        let timeout = Duration::from_millis(self.settings.navigation_timeout_ms);
        if let Err(e) = page.navigate(url, timeout).await {
            tracing::trace!(worker = self.id, "Skipping {}: {}", url, e);
            return None;
        }

        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;

        match page.content().await {
            Ok(html) => self.extractor.extract_from_html(&html),
            Err(e) => {
                tracing::trace!(worker = self.id, "Could not read {}: {}", url, e);
                None
            }
        }
    }

    async fn close_session(worker_id: u32, session: Box<dyn BrowsingSession>) {
        if let Err(e) = session.close().await {
            tracing::debug!(worker = worker_id, "Failed to close worker browser: {}", e);
        }
    }
}
