//! Feedscout Core - Foundation crate for the feedscout crawler.
//!
//! This crate provides shared record types, error handling and configuration
//! management that the browser and scanner crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Configuration errors using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Records, dedup keys and request identifiers
//!
//! # Example
//!
//! ```rust
//! use feedscout_core::{AppConfig, ExtractionRecord, UNAVAILABLE};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.enrichment.pool_size, 4);
//!
//! let record = ExtractionRecord::new("Corner Bakery");
//! assert_eq!(record.email, UNAVAILABLE);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, CrawlConfig, EnrichmentConfig, SiteConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::{is_available, or_unavailable, DedupKey, ExtractionRecord, RequestId, UNAVAILABLE};
