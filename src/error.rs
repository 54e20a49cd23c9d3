//! Error types for image queries and configuration

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors produced while answering an image query
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The image file could not be read
    #[error("An unexpected error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a well-formed image; no request was sent
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// A model endpoint answered with a non-200 status
    #[error("Error from {model} API: {status}")]
    Api {
        model: String,
        status: u16,
        body: String,
    },

    /// Transport-level failure (connect, TLS, body read)
    #[error("An unexpected error occurred: {0}")]
    Request(String),

    #[error("An unexpected error occurred: request timed out: {0}")]
    Timeout(String),

    /// The response body was not the expected chat completion shape
    #[error("An unexpected error occurred: {0}")]
    Decode(String),
}

impl ProcessError {
    /// True for the kinds that are not an invalid image or an API status
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Request(_) | Self::Timeout(_) | Self::Decode(_)
        )
    }

    /// HTTP status of a failed model call, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProcessError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProcessError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY has not been set (checked the environment and .env)")]
    MissingApiKey,

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
