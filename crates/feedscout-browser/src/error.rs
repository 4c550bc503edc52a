use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("target closed: {0}")]
    TargetClosed(String),

    #[error("script evaluation failed: {0}")]
    EvaluationError(String),
}

impl BrowserError {
    /// The page or browser behind this error no longer exists.
    pub fn is_target_closed(&self) -> bool {
        matches!(self, BrowserError::TargetClosed(_))
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("target closed") || lower.contains("no target with given id") {
            BrowserError::TargetClosed(message)
        } else {
            BrowserError::ChromiumError(message)
        }
    }
}
