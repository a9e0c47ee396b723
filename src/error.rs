//! Error types for the Service Plan Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Key could not be split into namespace and name
    #[error("Malformed key '{0}'")]
    MalformedKey(String),

    /// Object is already gone
    #[error("Not found: {0}")]
    NotFound(String),

    /// Listing or reading collaborator state failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Whether requeueing the key can ever make progress.
    ///
    /// A malformed key or a bad configuration fails the same way on every
    /// attempt, so those are dropped instead of retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::MalformedKey(_) | Error::Config(_))
    }
}
