// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-running worker trait.

use async_trait::async_trait;

use crate::error::MarqueeError;

/// One poll-and-reconcile loop body.
///
/// The runner owns scheduling, pausing, heartbeats and cancellation; a
/// worker only performs one bounded unit of work per `tick`. Errors are
/// logged by the runner and the next tick proceeds normally.
#[async_trait]
pub trait Worker: Send + 'static {
    /// Class identity used for health registration and logs.
    fn name(&self) -> &str;

    async fn tick(&mut self) -> Result<(), MarqueeError>;
}
