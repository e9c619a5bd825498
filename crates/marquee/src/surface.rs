// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Headless delivery surface.
//!
//! Rendering belongs to the display process. The daemon's own surface logs
//! each transition and confirms readiness at once, so rotation proceeds
//! without a display attached.

use async_trait::async_trait;
use tracing::info;

use marquee_core::{DeliverableMessage, DeliverySurface, MarqueeError};
use marquee_pipeline::RotationHandle;

pub struct LogSurface {
    handle: RotationHandle,
}

impl LogSurface {
    pub fn new(handle: RotationHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl DeliverySurface for LogSurface {
    async fn present(&self, message: &DeliverableMessage) -> Result<(), MarqueeError> {
        info!(
            uuid = %message.uuid,
            priority = message.priority,
            scroll = message.scroll,
            text = %message.text,
            "presenting message"
        );
        self.handle.confirm_ready(&message.uuid);
        Ok(())
    }

    async fn close(&self, uuid: &str) -> Result<(), MarqueeError> {
        info!(uuid = %uuid, "closing message");
        Ok(())
    }
}
