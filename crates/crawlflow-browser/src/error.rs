//! Driver error types.

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("browser session is closed")]
    Closed,

    #[error("browser bridge failed: {0}")]
    Bridge(String),

    #[error("unsupported method: {0}")]
    Unsupported(String),

    #[error("unknown handle: {0}")]
    UnknownHandle(String),

    #[error("driver io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid driver payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError {
    /// Whether this failure belongs to the timeout class (navigation, click, wait).
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }
}
