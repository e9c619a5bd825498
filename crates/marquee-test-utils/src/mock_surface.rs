// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery surface for deterministic rotator tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use marquee_core::{DeliverableMessage, DeliverySurface, MarqueeError};
use marquee_pipeline::RotationHandle;

/// Records every `present` and `close` call.
///
/// With a rotation handle attached, each presented message is confirmed
/// ready immediately, as a display that renders synchronously would do.
#[derive(Default)]
pub struct MockSurface {
    confirm_with: Option<RotationHandle>,
    presented: Mutex<Vec<DeliverableMessage>>,
    closed: Mutex<Vec<String>>,
}

impl MockSurface {
    /// A surface that never confirms readiness.
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that confirms every presented message on `handle`.
    pub fn auto_confirm(handle: RotationHandle) -> Self {
        Self {
            confirm_with: Some(handle),
            ..Self::default()
        }
    }

    /// UUIDs passed to `present`, in call order.
    pub async fn presented(&self) -> Vec<String> {
        self.presented
            .lock()
            .await
            .iter()
            .map(|m| m.uuid.clone())
            .collect()
    }

    /// Full messages passed to `present`, in call order.
    pub async fn presented_messages(&self) -> Vec<DeliverableMessage> {
        self.presented.lock().await.clone()
    }

    /// UUIDs passed to `close`, in call order.
    pub async fn closed(&self) -> Vec<String> {
        self.closed.lock().await.clone()
    }
}

#[async_trait]
impl DeliverySurface for MockSurface {
    async fn present(&self, message: &DeliverableMessage) -> Result<(), MarqueeError> {
        self.presented.lock().await.push(message.clone());
        if let Some(handle) = &self.confirm_with {
            handle.confirm_ready(&message.uuid);
        }
        Ok(())
    }

    async fn close(&self, uuid: &str) -> Result<(), MarqueeError> {
        self.closed.lock().await.push(uuid.to_string());
        Ok(())
    }
}
