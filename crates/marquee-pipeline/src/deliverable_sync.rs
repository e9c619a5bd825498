// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps the deliverable RAM collection a projection of raw RAM.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use marquee_core::{MarqueeError, Stage, StageStore, Worker};

use crate::convert::raw_to_deliverable;
use crate::ram::MessageRam;

/// Raw RAM is authoritative over deliverable RAM.
///
/// Expiry found on a deliverable cascades upward: the stage-3 record goes
/// first, then the raw mirror, then the deliverable itself. Deleting only
/// the raw mirror would let the raw synchronizer bring it back.
pub struct DeliverableRamSynchronizer {
    store: Arc<dyn StageStore>,
    ram: Arc<MessageRam>,
}

impl DeliverableRamSynchronizer {
    pub fn new(store: Arc<dyn StageStore>, ram: Arc<MessageRam>) -> Self {
        Self { store, ram }
    }
}

#[async_trait]
impl Worker for DeliverableRamSynchronizer {
    fn name(&self) -> &str {
        "deliverable_sync"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        let raw = self.ram.raw_snapshot().await;
        if raw.is_empty() {
            let cleared = self.ram.clear_deliverable().await;
            if cleared > 0 {
                info!(cleared, "deliverable RAM cleared");
            }
            return Ok(());
        }

        let mut added = 0;
        for message in raw.iter().rev() {
            if self.ram.insert_deliverable_if_absent(raw_to_deliverable(message)).await {
                added += 1;
            }
        }

        let raw_uuids: HashSet<&str> = raw.iter().map(|m| m.uuid.as_str()).collect();
        let now = Utc::now();
        let mut orphaned = 0;
        let mut expired = 0;
        for message in self.ram.deliverable_snapshot().await.iter().rev() {
            if !raw_uuids.contains(message.uuid.as_str()) {
                if self.ram.remove_deliverable(&message.uuid).await {
                    orphaned += 1;
                }
                continue;
            }
            if message.is_expired(now) {
                if let Err(e) = self.store.delete_by_uuid(Stage::Messages, &message.uuid).await {
                    warn!(uuid = %message.uuid, error = %e, "could not delete expired message");
                    continue;
                }
                self.ram.remove_everywhere(&message.uuid).await;
                expired += 1;
            }
        }

        if added + orphaned + expired > 0 {
            info!(added, orphaned, expired, "deliverable RAM synchronized");
        }
        Ok(())
    }
}
