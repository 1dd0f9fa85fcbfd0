//! Error types shared across vidlay crates.

use std::path::PathBuf;

/// Top-level error type for vidlay operations.
#[derive(Debug, thiserror::Error)]
pub enum VidlayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Error when evaluating the expression '{expr}': {message}")]
    Expression { expr: String, message: String },

    #[error("Unsupported pixel format: {message}")]
    UnsupportedFormat { message: String },

    #[error("Frame error: {message}")]
    Frame { message: String },

    #[error("Source error: {message}")]
    Source { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidlayError.
pub type VidlayResult<T> = Result<T, VidlayError>;

impl VidlayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn expression(expr: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Expression {
            expr: expr.into(),
            message: msg.into(),
        }
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: msg.into(),
        }
    }

    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame {
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    /// Whether this error was raised while configuring a stage, before any
    /// frame was produced.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Expression { .. } | Self::UnsupportedFormat { .. }
        )
    }
}
