//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("unknown sync status: {0}")]
    UnknownStatus(String),

    #[error("invalid sync status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("invalid notification payload: {0}")]
    InvalidNotification(String),

    #[error("invalid compiler settings: {0}")]
    InvalidSettings(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
