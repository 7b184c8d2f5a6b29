//! Error types for edgellm operations.

use std::path::PathBuf;
use thiserror::Error;

/// A specialized Result type for edgellm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for session, generation, conversation and configuration
/// operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The model file is missing, unreadable, or the runtime refused it
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The prompt could not be turned into a non-empty token sequence
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// The runtime rejected the prompt decode step
    #[error("Runtime decode failed: {message}")]
    RuntimeDecode {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A conversation role outside system/user/assistant
    #[error("Invalid role '{0}': expected one of system, user, assistant")]
    InvalidRole(String),

    /// Rejected request parameters
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generation was requested on a released session
    #[error("Invalid model context: session has been released")]
    InvalidSession,

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a model load error without an underlying runtime cause
    pub fn model_load<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Error::ModelLoad {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a model load error wrapping the runtime's failure
    pub fn model_load_with<P: Into<PathBuf>, S: Into<String>>(
        path: P,
        reason: S,
        source: anyhow::Error,
    ) -> Self {
        Error::ModelLoad {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Create a tokenization error
    pub fn tokenization<S: Into<String>>(msg: S) -> Self {
        Error::Tokenization(msg.into())
    }

    /// Create a decode error wrapping the runtime's failure
    pub fn runtime_decode<S: Into<String>>(msg: S, source: anyhow::Error) -> Self {
        Error::RuntimeDecode {
            message: msg.into(),
            source: Some(source),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Full cause chain as one line, for diagnostics and failure labeling
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
