use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://test.fixeau.com/api/v1";
pub const DEFAULT_FOLDER: i64 = 6;

#[derive(Debug, Clone)]
pub struct Config {
    // Local database
    pub database_url: String,

    // Fixeau API
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub skip_tls_verify: bool,
    pub folder: i64,

    // Photos referenced by measuring points and observations
    pub media_root: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            api_url: env::var("FIXEAU_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            username: env::var("FIXEAU_USERNAME")
                .map_err(|_| ConfigError::Missing("FIXEAU_USERNAME"))?,
            password: env::var("FIXEAU_PASSWORD")
                .map_err(|_| ConfigError::Missing("FIXEAU_PASSWORD"))?,
            skip_tls_verify: env::var("FIXEAU_SKIP_TLS_VERIFY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            folder: env::var("FIXEAU_FOLDER")
                .unwrap_or_else(|_| DEFAULT_FOLDER.to_string())
                .parse()
                .unwrap_or(DEFAULT_FOLDER),

            media_root: env::var("MEDIA_ROOT")
                .map_or_else(|_| PathBuf::from("."), PathBuf::from),
        })
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
