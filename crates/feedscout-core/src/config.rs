//! Configuration management for feedscout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/feedscout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Discovery and batch behaviour
    pub crawl: CrawlConfig,
    /// Worker pool and email lookup behaviour
    pub enrichment: EnrichmentConfig,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Selectors and regional defaults for the crawled site
    pub site: SiteConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, using defaults when absent.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let config: Self = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `FEEDSCOUT_HEADLESS`: Override browser headless mode (true/false)
    /// - `FEEDSCOUT_POOL_SIZE`: Override the enrichment worker count
    /// - `FEEDSCOUT_MAX_SCROLLS`: Override the scroll-attempt ceiling
    /// - `FEEDSCOUT_NO_NEW_THRESHOLD`: Override the no-new-results threshold
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(headless) = lookup("FEEDSCOUT_HEADLESS").and_then(|v| v.parse().ok()) {
            self.browser.headless = headless;
            tracing::debug!("Override browser.headless from env: {}", headless);
        }

        if let Some(size) = lookup("FEEDSCOUT_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.enrichment.pool_size = size;
            tracing::debug!("Override enrichment.pool_size from env: {}", size);
        }

        if let Some(max) = lookup("FEEDSCOUT_MAX_SCROLLS").and_then(|v| v.parse().ok()) {
            self.crawl.max_scroll_attempts = max;
            tracing::debug!("Override crawl.max_scroll_attempts from env: {}", max);
        }

        if let Some(threshold) = lookup("FEEDSCOUT_NO_NEW_THRESHOLD").and_then(|v| v.parse().ok())
        {
            self.crawl.no_new_results_threshold = threshold;
            tracing::debug!(
                "Override crawl.no_new_results_threshold from env: {}",
                threshold
            );
        }
    }

    /// Reject values that would stall or disable the crawl.
    pub fn validate(&self) -> ConfigResult<()> {
        let non_zero = [
            ("crawl.no_new_results_threshold", self.crawl.no_new_results_threshold),
            ("crawl.initial_load_retries", self.crawl.initial_load_retries),
            ("crawl.batch_concurrency_enriched", self.crawl.batch_concurrency_enriched),
            ("crawl.batch_concurrency_plain", self.crawl.batch_concurrency_plain),
            ("enrichment.pool_size", self.enrichment.pool_size),
        ];

        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.site.postal_code_digits == 0 {
            return Err(ConfigError::InvalidValue {
                field: "site.postal_code_digits".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/feedscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "feedscout", "feedscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Discovery loop and batch processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Hard ceiling on discovery iterations
    pub max_scroll_attempts: u32,
    /// Consecutive resultless iterations before discovery ends
    pub no_new_results_threshold: u32,
    /// Wait after each scroll before counting items, in milliseconds
    pub settle_delay_ms: u64,
    /// Wheel nudge applied after scrolling the feed
    pub wheel_delta: f64,
    /// Attempts to reach the feed before giving up
    pub initial_load_retries: u32,
    /// Fixed delay between initial load attempts, in milliseconds
    pub retry_backoff_ms: u64,
    /// Timeout for each step of the initial load, in seconds
    pub initial_load_timeout_secs: u64,
    /// Concurrent items per batch when enrichment is on
    pub batch_concurrency_enriched: u32,
    /// Concurrent items per batch when enrichment is off
    pub batch_concurrency_plain: u32,
    /// Detail navigation timeout when enrichment is on, in milliseconds
    pub item_timeout_enriched_ms: u64,
    /// Detail navigation timeout when enrichment is off, in milliseconds
    pub item_timeout_plain_ms: u64,
}

impl CrawlConfig {
    /// Batch ceiling for the given mode.
    #[must_use]
    pub fn batch_concurrency(&self, enrich: bool) -> usize {
        let n = if enrich {
            self.batch_concurrency_enriched
        } else {
            self.batch_concurrency_plain
        };
        n.max(1) as usize
    }

    /// Detail navigation timeout for the given mode.
    #[must_use]
    pub fn item_timeout(&self, enrich: bool) -> Duration {
        Duration::from_millis(if enrich {
            self.item_timeout_enriched_ms
        } else {
            self.item_timeout_plain_ms
        })
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 500,
            no_new_results_threshold: 4,
            settle_delay_ms: 2000,
            wheel_delta: 1000.0,
            initial_load_retries: 3,
            retry_backoff_ms: 5000,
            initial_load_timeout_secs: 60,
            batch_concurrency_enriched: 2,
            batch_concurrency_plain: 4,
            item_timeout_enriched_ms: 10_000,
            item_timeout_plain_ms: 5_000,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Number of isolated workers
    pub pool_size: u32,
    /// How long a requester waits for a correlated response, in milliseconds
    pub response_timeout_ms: u64,
    /// Worker navigation timeout, in milliseconds
    pub navigation_timeout_ms: u64,
    /// Wait after a worker page loads before reading it, in milliseconds
    pub settle_delay_ms: u64,
    /// Paths tried under the website when the home page has no email
    pub secondary_paths: Vec<String>,
    /// Fragments that disqualify a textual email match
    pub denylist: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            response_timeout_ms: 15_000,
            navigation_timeout_ms: 5_000,
            settle_delay_ms: 500,
            secondary_paths: vec![
                "contact".to_string(),
                "contact-us".to_string(),
                "about".to_string(),
            ],
            denylist: vec![
                "example".to_string(),
                "test@".to_string(),
                "email@".to_string(),
            ],
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// User agent override; empty picks a common desktop agent at random
    pub user_agent: String,
    /// Extra command-line switches passed to Chromium
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            extra_args: vec![
                "--disable-dev-shm-usage".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
        }
    }
}

/// Selectors for the crawled site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Page that hosts the search box
    pub home_url: String,
    /// Search input
    pub search_box: String,
    /// Scrollable results container
    pub feed: String,
    /// Links to individual items in the feed
    pub listing: String,
    /// Attribute on a listing carrying its label
    pub label_attribute: String,
    /// "Show more" affordance tried once before discovery ends
    pub show_more: String,
    /// Item website link (href)
    pub website: String,
    /// Item address text
    pub address: String,
    /// Item rating text
    pub rating: String,
    /// Element whose `aria-label` starts with the review count
    pub reviews: String,
    /// Item category text
    pub category: String,
    /// Item phone text
    pub phone: String,
    /// Country code assumed when a phone has no `+` prefix
    pub default_country_code: String,
    /// Length of the numeric postal code searched in the address
    pub postal_code_digits: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: "https://www.google.com/maps".to_string(),
            search_box: "#searchboxinput".to_string(),
            feed: r#"div[role="feed"]"#.to_string(),
            listing: r#"a[href*="https://www.google.com/maps/place"]"#.to_string(),
            label_attribute: "aria-label".to_string(),
            show_more: r#"button[aria-label="Show more"]"#.to_string(),
            website: r#"a[data-item-id="authority"]"#.to_string(),
            address: r#"button[data-item-id="address"] div"#.to_string(),
            rating: r#"div.F7nice span[aria-hidden="true"]"#.to_string(),
            reviews: r#"div.F7nice span[aria-label*="reviews"]"#.to_string(),
            category: "button.DkEaL".to_string(),
            phone: r#"button[data-item-id^="phone:tel:"] div"#.to_string(),
            default_country_code: "+91".to_string(),
            postal_code_digits: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.crawl.max_scroll_attempts, 500);
        assert_eq!(config.crawl.no_new_results_threshold, 4);
        assert_eq!(config.crawl.initial_load_retries, 3);
        assert_eq!(config.enrichment.pool_size, 4);
        assert_eq!(config.enrichment.response_timeout_ms, 15_000);
        assert!(config.browser.headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_ceiling_is_tighter_with_enrichment() {
        let crawl = CrawlConfig::default();
        assert!(crawl.batch_concurrency(true) < crawl.batch_concurrency(false));
        assert!(crawl.item_timeout(true) > crawl.item_timeout(false));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[crawl]"));
        assert!(toml_str.contains("[enrichment]"));
        assert!(toml_str.contains("[site]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.site.listing, config.site.listing);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.crawl.settle_delay_ms = 750;
        config.enrichment.pool_size = 2;
        config.save_to(&config_path).expect("save config");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.crawl.settle_delay_ms, 750);
        assert_eq!(loaded.enrichment.pool_size, 2);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[enrichment]\npool_size = 0\n").expect("write config file");

        let err = AppConfig::load_from(&config_path).expect_err("zero pool size");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.crawl.max_scroll_attempts, 500);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FEEDSCOUT_HEADLESS", "false"),
            ("FEEDSCOUT_POOL_SIZE", "8"),
            ("FEEDSCOUT_MAX_SCROLLS", "25"),
            ("FEEDSCOUT_NO_NEW_THRESHOLD", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        assert!(!config.browser.headless);
        assert_eq!(config.enrichment.pool_size, 8);
        assert_eq!(config.crawl.max_scroll_attempts, 25);
        assert_eq!(config.crawl.no_new_results_threshold, 4);
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut config = AppConfig::default();
        config.enrichment.pool_size = 0;
        let err = config.validate().expect_err("zero pool size is invalid");
        assert!(err.to_string().contains("enrichment.pool_size"));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[crawl]
no_new_results_threshold = 6

[site]
default_country_code = "+1"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.crawl.no_new_results_threshold, 6);
        assert_eq!(config.site.default_country_code, "+1");
        // These should be defaults
        assert_eq!(config.crawl.max_scroll_attempts, 500);
        assert_eq!(config.enrichment.secondary_paths.len(), 3);
    }
}
