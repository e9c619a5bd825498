// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the pipeline and its collaborators.
//!
//! Persistence, device telemetry, and the delivery surface are external to
//! the pipeline; workers only see these traits. Async traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod store;
pub mod surface;
pub mod telemetry;
pub mod worker;

pub use store::StageStore;
pub use surface::DeliverySurface;
pub use telemetry::TelemetrySource;
pub use worker::Worker;
