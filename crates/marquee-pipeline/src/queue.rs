// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered delivery worklist derived from the deliverable collection.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use marquee_core::{DeliverableMessage, MarqueeError, Worker};

use crate::ram::MessageRam;

/// Highest priority first, then oldest receipt, then UUID for a stable order.
pub fn delivery_order(a: &DeliverableMessage, b: &DeliverableMessage) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.received_at.cmp(&b.received_at))
        .then_with(|| a.uuid.cmp(&b.uuid))
}

/// The current worklist. Its length is the rotation queue size reported by `/ping`.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    entries: RwLock<Vec<DeliverableMessage>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<DeliverableMessage> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Replace the worklist, sorting it into delivery order.
    pub async fn replace(&self, mut entries: Vec<DeliverableMessage>) {
        entries.sort_by(delivery_order);
        *self.entries.write().await = entries;
    }
}

/// Rebuilds the [`DeliveryQueue`] from deliverable RAM on every tick.
pub struct DeliveryQueueProcessor {
    ram: Arc<MessageRam>,
    queue: Arc<DeliveryQueue>,
    last_len: usize,
}

impl DeliveryQueueProcessor {
    pub fn new(ram: Arc<MessageRam>, queue: Arc<DeliveryQueue>) -> Self {
        Self {
            ram,
            queue,
            last_len: 0,
        }
    }
}

#[async_trait]
impl Worker for DeliveryQueueProcessor {
    fn name(&self) -> &str {
        "delivery_queue"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        let now = Utc::now();
        let eligible: Vec<_> = self
            .ram
            .deliverable_snapshot()
            .await
            .into_iter()
            .filter(|m| !m.is_expired(now))
            .collect();
        let len = eligible.len();
        self.queue.replace(eligible).await;
        if len != self.last_len {
            debug!(size = len, "delivery queue rebuilt");
            self.last_len = len;
        }
        Ok(())
    }
}
