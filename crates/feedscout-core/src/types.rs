//! Shared types used across the feedscout crates.
//!
//! Records produced by a crawl never carry absent fields: anything that could
//! not be read is stored as [`UNAVAILABLE`].

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in any record field that could not be extracted.
pub const UNAVAILABLE: &str = "N/A";

/// Convert an optional extracted value into a field value.
///
/// Blank strings count as missing.
#[must_use]
pub fn or_unavailable(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNAVAILABLE.to_string(),
    }
}

/// Returns true if a field holds a real value rather than the sentinel.
#[must_use]
pub fn is_available(value: &str) -> bool {
    !value.is_empty() && value != UNAVAILABLE
}

/// One extracted feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    /// Display label of the item
    pub name: String,
    /// Primary URL (the item's own website)
    pub website: String,
    /// Full address line
    pub address: String,
    /// Rating as displayed
    pub rating: String,
    /// Review count as displayed
    pub reviews: String,
    /// Category label
    pub category: String,
    /// Local phone number with the country code removed
    pub phone: String,
    /// Phone country code, e.g. `+1`
    pub country_code: String,
    /// City derived from the address
    pub city: String,
    /// State derived from the address
    pub state: String,
    /// Postal code derived from the address
    pub postal_code: String,
    /// Enrichment value (contact email)
    pub email: String,
}

impl ExtractionRecord {
    /// Create a record with every field except the name set to [`UNAVAILABLE`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let na = || UNAVAILABLE.to_string();
        Self {
            name: or_unavailable(Some(name.into())),
            website: na(),
            address: na(),
            rating: na(),
            reviews: na(),
            category: na(),
            phone: na(),
            country_code: na(),
            city: na(),
            state: na(),
            postal_code: na(),
            email: na(),
        }
    }

    /// Whether the record has a usable primary URL for enrichment.
    #[must_use]
    pub fn has_website(&self) -> bool {
        is_available(self.website.trim())
    }

    /// Content identity used to suppress repeated listings of the same place.
    #[must_use]
    pub fn fingerprint(&self) -> (String, String, String) {
        (
            self.name.clone(),
            self.address.clone(),
            self.phone.clone(),
        )
    }
}

/// Deduplication key for a discovered item: its target URL plus display label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    url: String,
    label: String,
}

impl DedupKey {
    /// Build a key from the item's URL and label.
    #[must_use]
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }

    /// The target URL part of the key.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The label part of the key.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.url, self.label)
    }
}

/// Correlation identifier for an enrichment request.
///
/// Millisecond timestamp plus a random suffix; collisions within one session
/// are negligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh request identifier.
    #[must_use]
    pub fn generate() -> Self {
        let suffix: u64 = rand::thread_rng().gen();
        Self(format!("{}-{suffix:016x}", Utc::now().timestamp_millis()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
