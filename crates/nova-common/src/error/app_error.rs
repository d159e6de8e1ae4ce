//! Application error types
//!
//! Process-level failures: configuration, listener setup and server I/O.

use crate::config::ConfigError;
use std::net::SocketAddr;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

impl AppError {
    /// Get a stable error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Bind { .. } => "BIND_ERROR",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Server(_) => "SERVER_ERROR",
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
