#[derive(Debug, thiserror::Error)]
pub enum PdfTransError {
    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    #[error("ocr error: {0}")]
    Ocr(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("review error: {0}")]
    Review(String),

    #[error("terminology error: {0}")]
    Terminology(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PdfTransError {
    /// Whether this error represents a transient condition worth retrying
    /// (timeouts, refused connections, provider 5xx). Permanent external
    /// errors (auth, malformed config) and cancellation are never retried.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PdfTransError::Cancelled => false,
            PdfTransError::Translation(msg) | PdfTransError::Ocr(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("connection")
                    || lower.contains("5")
                    || lower.contains("unavailable")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfTransError>;
