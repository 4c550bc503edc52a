//! Browser automation surface for feed crawling.
//!
//! Defines the page-level operations the crawler consumes and a headless
//! Chromium implementation of them.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::{
    extract_domain, join_path, normalize_url, BrowsingSession, DynElement, ElementHandle,
    PageSurface, SessionLauncher,
};
pub use engine::ChromiumLauncher;
pub use error::{BrowserError, Result};
