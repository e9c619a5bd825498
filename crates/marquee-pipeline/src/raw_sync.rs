// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps the raw RAM collection an exact mirror of stage 3.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use marquee_core::{MarqueeError, Stage, StageStore, Worker};

use crate::convert::{raw_is_expired, record_to_raw};
use crate::ram::MessageRam;

/// Stage 3 is authoritative: RAM is reconciled toward it, never the reverse.
pub struct RawRamSynchronizer {
    store: Arc<dyn StageStore>,
    ram: Arc<MessageRam>,
}

impl RawRamSynchronizer {
    pub fn new(store: Arc<dyn StageStore>, ram: Arc<MessageRam>) -> Self {
        Self { store, ram }
    }

    /// Delete expired and unparseable stage-3 records before they reach RAM.
    async fn purge_expired(&self) -> Result<usize, MarqueeError> {
        let now = Utc::now();
        let mut purged = 0;
        for record in self.store.find_all(Stage::Messages).await? {
            let drop = match record_to_raw(&record) {
                Ok(raw) => raw_is_expired(&raw, now),
                Err(e) => {
                    warn!(uuid = %record.uuid, error = %e, "discarding unreadable message");
                    true
                }
            };
            if drop && self.store.delete_by_uuid(Stage::Messages, &record.uuid).await? {
                debug!(uuid = %record.uuid, "expired message deleted");
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Insert what stage 3 has and RAM lacks, then drop what RAM has and stage 3 lacks.
    async fn sync_existence(&self) -> Result<(usize, usize), MarqueeError> {
        let records = self.store.find_all(Stage::Messages).await?;
        let mut present = HashSet::with_capacity(records.len());
        let mut added = 0;
        for record in &records {
            match record_to_raw(record) {
                Ok(raw) => {
                    present.insert(record.uuid.clone());
                    if self.ram.insert_raw_if_absent(raw).await {
                        added += 1;
                    }
                }
                // purged on the next housekeeping pass
                Err(e) => debug!(uuid = %record.uuid, error = %e, "skipping unreadable message"),
            }
        }

        let mut removed = 0;
        for raw in self.ram.raw_snapshot().await.iter().rev() {
            if !present.contains(&raw.uuid) && self.ram.remove_raw(&raw.uuid).await {
                removed += 1;
            }
        }
        Ok((added, removed))
    }
}

#[async_trait]
impl Worker for RawRamSynchronizer {
    fn name(&self) -> &str {
        "raw_sync"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        let purged = self.purge_expired().await?;
        let (added, removed) = self.sync_existence().await?;
        if purged + added + removed > 0 {
            info!(purged, added, removed, "raw RAM synchronized");
        }
        Ok(())
    }
}
