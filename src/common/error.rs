use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Malformed row {row}: {message}")]
    Csv { row: usize, message: String },
}

impl ScraperError {
    /// Transport-class failures are worth another attempt; a 404 never is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::Timeout { .. } => true,
            ScraperError::Status { status, .. } => *status != 404,
            ScraperError::Http(e) => e.status().map(|s| s.as_u16() != 404).unwrap_or(true),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
