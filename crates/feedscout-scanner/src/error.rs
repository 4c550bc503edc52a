use feedscout_browser::BrowserError;
use feedscout_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Feed unreachable after {attempts} attempts: {reason}")]
    FeedUnreachable { attempts: u32, reason: String },

    #[error("Feed page closed during discovery after {streamed} records")]
    TargetClosed { streamed: usize },

    #[error("Invalid scan request: {0}")]
    InvalidRequest(String),

    #[error("Invalid site configuration: {0}")]
    SiteConfig(String),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
