//! Error types for Postdrop

use thiserror::Error;

/// Main error type for Postdrop
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Postdrop
pub type Result<T> = std::result::Result<T, Error>;
