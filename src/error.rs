use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid riskID, expected a UUID but received: {0}")]
    InvalidId(String),

    #[error("risk not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RiskError {
    /// True when the failure was caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RiskError::Validation(_) | RiskError::InvalidId(_) | RiskError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
