//! Feedscout Scanner - concurrent crawl-and-enrich orchestration.
//!
//! This crate drives an infinitely scrolling result feed through the
//! [`feedscout_browser`] collaborator traits, extracts a structured record per
//! discovered item, and optionally enriches records with a contact email
//! looked up by an isolated worker pool.
//!
//! # Features
//!
//! - Incremental discovery with retrying initial load and a bounded scroll budget
//! - Session-scoped deduplication of discovered items
//! - Bounded-concurrency batch extraction with per-item failure isolation
//! - Round-robin worker pool with one-shot request/response correlation
//! - Cooperative cancellation checked at iteration and batch boundaries
//!
//! # Example
//!
//! ```rust,ignore
//! use feedscout_scanner::{CancellationToken, FeedScanner, ScanRequest};
//! use std::sync::Arc;
//!
//! let scanner = FeedScanner::new(Arc::new(launcher), config)?;
//! let records = scanner
//!     .scan(
//!         ScanRequest::new("cafes in pune").with_target(50),
//!         |record, progress| println!("{} ({:.0}%)", record.name, progress.percent()),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod batch;
#[allow(missing_docs)]
pub mod contact;
pub mod dedup;
#[allow(missing_docs)]
pub mod discovery;
#[allow(missing_docs)]
pub mod error;
pub mod orchestrator;
#[allow(missing_docs)]
pub mod parser;
pub mod pool;

pub use batch::{BatchProcessor, BatchSummary, ItemHandle};
pub use contact::EmailExtractor;
pub use dedup::DedupStore;
pub use discovery::{DiscoveryEnd, DiscoveryLoop};
pub use error::{Result, ScanError};
pub use orchestrator::{FeedScanner, ScanProgress, ScanRequest};
pub use parser::{review_count, AddressParts, FieldParser, PhoneNumber};
pub use pool::{EnrichmentOutcome, EnrichmentSubject, WorkerPool, WorkerRequest, WorkerResponse};
pub use tokio_util::sync::CancellationToken;
