// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Marquee daemon.

use thiserror::Error;

/// The primary error type used across all Marquee traits, stores, and workers.
#[derive(Debug, Error)]
pub enum MarqueeError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wire protocol errors (malformed request line, bad Content-Length, early EOF).
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stage record or payload could not be classified or converted.
    #[error("classification error: {message}")]
    Classification { message: String },

    /// A stage record update would move its status backwards or clear processed-at.
    #[error("invalid status transition for {uuid}: {from} -> {to}")]
    InvalidTransition {
        uuid: String,
        from: String,
        to: String,
    },

    /// Device telemetry could not be read.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarqueeError {
    /// Shorthand for a protocol error without an underlying cause.
    pub fn protocol(message: impl Into<String>) -> Self {
        MarqueeError::Protocol {
            message: message.into(),
            source: None,
        }
    }
}

impl From<std::io::Error> for MarqueeError {
    fn from(e: std::io::Error) -> Self {
        MarqueeError::Protocol {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}
