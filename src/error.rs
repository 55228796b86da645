#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Fixeau API error: HTTP {status}: {body}")]
    FixeauApi { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// HTTP status of a failed API call, if this error carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FixeauApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error body returned by the API, parsed as JSON when possible.
    #[must_use]
    pub fn body_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::FixeauApi { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
