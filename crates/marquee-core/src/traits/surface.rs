// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery surface trait (the display that shows the current message).

use async_trait::async_trait;

use crate::error::MarqueeError;
use crate::types::DeliverableMessage;

/// The component that renders a message.
///
/// `present` starts preparing the content; the surface later confirms it is
/// on screen through the rotator's handle. `close` returns the surface to
/// the idle clock display.
#[async_trait]
pub trait DeliverySurface: Send + Sync + 'static {
    async fn present(&self, message: &DeliverableMessage) -> Result<(), MarqueeError>;

    async fn close(&self, uuid: &str) -> Result<(), MarqueeError>;
}
