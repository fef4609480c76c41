//! Error types for the sniper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sniper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Insecure keypair permissions: {0}")]
    InsecureKeypair(String),

    #[error("Invalid proxy entry: {0}")]
    InvalidProxy(String),

    // Transport faults: proxy errors, timeouts, malformed responses.
    // Recoverable by retrying the same call.
    #[error("Transport error: {0}")]
    Transport(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    // Marketplace API errors
    #[error("Marketplace error: {0}")]
    Marketplace(String),

    // Trading errors
    #[error("Transaction decode failed: {0}")]
    TransactionDecode(String),

    #[error("Transaction signing failed: {0}")]
    Signing(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Rpc(_))
    }
}

// Conversion from reqwest errors (connect, proxy, and body faults alike)
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
