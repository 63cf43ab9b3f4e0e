//! Error types for Skyboost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkyboostError>;

#[derive(Error, Debug)]
pub enum SkyboostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SkyboostError {
    /// Returns the appropriate exit code for this error
    ///
    /// Only errors that escape `main` use this; per-account and per-source
    /// failures are logged and never reach the process boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            SkyboostError::InvalidInput(_) => 3,
            SkyboostError::Config(_) => 2,
            SkyboostError::Platform(PlatformError::Authentication(_)) => 2,
            SkyboostError::Platform(_) => 1,
        }
    }

    /// True when the failure means the account cannot be used this run
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            SkyboostError::Platform(PlatformError::Authentication(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Mutation failed: {0}")]
    Mutation(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
