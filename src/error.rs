//! Error types for Gradebox

use thiserror::Error;

/// Result type alias using Gradebox's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Gradebox
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language not in the supported set; raised before any sandbox exists
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Sandbox environment could not be created
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    /// File bundle could not be loaded into the sandbox
    #[error("Injection failed: {0}")]
    Injection(String),

    /// Expected output artifact was never produced by the submission
    #[error("Output file not found: {0}")]
    OutputMissing(String),

    /// Docker/container engine error
    #[error("Container error: {0}")]
    Container(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the error is an infrastructure failure (no verdict possible)
    /// rather than a classified program-behavior outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Provisioning(_)
                | Error::Injection(_)
                | Error::Container(_)
        )
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(err: bollard::errors::Error) -> Self {
        Error::Container(err.to_string())
    }
}
