// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Marquee message-delivery daemon.
//!
//! This crate provides the trait seams, error type, and record/message types
//! shared by the stage stores, the pipeline workers, the health supervisor,
//! and the socket server.

pub mod error;
pub mod time;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MarqueeError;
pub use types::{
    DeliverableMessage, ExpirationPolicy, MessageMeta, RawMessage, RecordStatus,
    RequestEnvelope, Stage, StageRecord, TelemetrySnapshot, WorkerState,
};

pub use traits::{DeliverySurface, StageStore, TelemetrySource, Worker};
