//! Error types for docagent.
//!
//! All fallible operations in the library return [`AgentError`]. The variants follow the
//! propagation policy of the agent:
//!
//! - `Io` errors bubble up unchanged from single operations.
//! - Loader-level failures (`PluginResolution`, `PluginInitialization`) are contained by the
//!   [`PluginLoader`](crate::plugins::PluginLoader): the plugin is skipped and the agent keeps
//!   running with a reduced plugin set.
//! - Request-level failures (`NotFound`, `Unhealthy`, `Unsupported`, `NoEngineAvailable`,
//!   `RemoteCall`) propagate to the caller of the single in-flight operation.
//! - Batch and health aggregation convert per-item failures into per-item markers instead of
//!   returning an error.
//!
//! # Example
//!
//! ```rust
//! use docagent::{AgentError, Result};
//!
//! fn check_confidence(value: f64) -> Result<f64> {
//!     if !(0.0..=1.0).contains(&value) {
//!         return Err(AgentError::validation(format!("confidence out of range: {}", value)));
//!     }
//!     Ok(value)
//! }
//! ```
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `AgentError`.
pub type Result<T> = std::result::Result<T, AgentError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all docagent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Failed to resolve plugin class '{class}' for '{plugin_key}': {message}")]
    PluginResolution {
        plugin_key: String,
        class: String,
        message: String,
    },

    #[error("Failed to initialize plugin '{plugin_key}': {message}")]
    PluginInitialization {
        plugin_key: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Plugin {category}.{name} not found")]
    NotFound { category: String, name: String },

    #[error("Plugin {category}.{name} is configured but not healthy")]
    Unhealthy { category: String, name: String },

    #[error("Plugin {category}.{name} does not support {capability}")]
    Unsupported {
        category: String,
        name: String,
        capability: String,
    },

    #[error("No OCR engine available: {0}")]
    NoEngineAvailable(String),

    #[error("Remote call to {endpoint} failed: {message}")]
    RemoteCall {
        endpoint: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for AgentError {
    fn from(err: image::ImageError) -> Self {
        AgentError::ImageProcessing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "ollama")]
impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        AgentError::RemoteCall {
            endpoint,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl AgentError {
    /// Create a `Config` error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Config` error with source.
    pub fn config_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an `Ocr` error.
    pub fn ocr<S: Into<String>>(message: S) -> Self {
        Self::Ocr {
            message: message.into(),
            source: None,
        }
    }

    /// Create an `ImageProcessing` error.
    pub fn image_processing<S: Into<String>>(message: S) -> Self {
        Self::ImageProcessing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Validation` error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `RemoteCall` error without an underlying transport error.
    pub fn remote_call<E: Into<String>, S: Into<String>>(endpoint: E, message: S) -> Self {
        Self::RemoteCall {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a `PluginInitialization` error for `category.name`.
    pub fn plugin_initialization<S: Into<String>>(plugin_key: &str, message: S) -> Self {
        Self::PluginInitialization {
            plugin_key: plugin_key.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a `NotFound` error.
    pub fn not_found(category: &str, name: &str) -> Self {
        Self::NotFound {
            category: category.to_string(),
            name: name.to_string(),
        }
    }

    /// Whether this error can be confined to one item of a batch. A poisoned lock cannot.
    pub fn is_isolatable(&self) -> bool {
        !matches!(self, AgentError::LockPoisoned(_))
    }
}
