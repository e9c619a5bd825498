// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device telemetry trait.

use crate::error::MarqueeError;
use crate::types::TelemetrySnapshot;

/// Point-in-time reads of power, storage, network and host state.
///
/// Reads are synchronous queries; implementations may cache handles
/// between calls, hence `&mut self`.
pub trait TelemetrySource: Send + 'static {
    fn snapshot(&mut self) -> Result<TelemetrySnapshot, MarqueeError>;
}
