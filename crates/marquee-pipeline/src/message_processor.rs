// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage 2 -> stage 3: promote classified messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use marquee_config::model::PipelineConfig;
use marquee_core::time::{cutoff_ts, now_ts};
use marquee_core::{MarqueeError, RecordStatus, Stage, StageRecord, StageStore, Worker};

/// Copies each unprocessed stage-2 record into stage 3, idempotent on UUID.
///
/// The stage-3 copy keeps the original receipt time so expiry is measured
/// from when the request arrived, not from when it was forwarded.
pub struct MessageProcessor {
    store: Arc<dyn StageStore>,
    config: PipelineConfig,
    iterations: u64,
}

impl MessageProcessor {
    pub fn new(store: Arc<dyn StageStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            iterations: 0,
        }
    }

    async fn promote(&self, record: &StageRecord) -> Result<(), MarqueeError> {
        let message = StageRecord::new(
            record.uuid.as_str(),
            record.payload.as_str(),
            record.metadata.clone(),
            record.received_at.as_str(),
        );
        match self.store.insert_if_absent(Stage::Messages, &message).await? {
            Some(_) => info!(uuid = %record.uuid, "message stored"),
            None => debug!(uuid = %record.uuid, "message already stored"),
        }
        self.store
            .mark_processed(
                Stage::ReceivedMessages,
                &record.uuid,
                RecordStatus::Forwarded,
                &now_ts(),
            )
            .await?;
        Ok(())
    }

    /// Purge processed records past the short TTL and anything past the absolute TTL.
    pub async fn housekeeping(&self) -> Result<usize, MarqueeError> {
        let now = Utc::now();
        let processed_cutoff =
            cutoff_ts(now, Duration::from_secs(self.config.message_processed_ttl_secs));
        let absolute_cutoff =
            cutoff_ts(now, Duration::from_secs(self.config.message_absolute_ttl_secs));
        let processed = self
            .store
            .delete_processed_older_than(Stage::ReceivedMessages, &processed_cutoff)
            .await?;
        let aged = self
            .store
            .delete_older_than(Stage::ReceivedMessages, &absolute_cutoff)
            .await?;
        if processed + aged > 0 {
            info!(
                stage = %Stage::ReceivedMessages,
                processed,
                aged,
                "housekeeping purged messages"
            );
        }
        Ok(processed + aged)
    }
}

#[async_trait]
impl Worker for MessageProcessor {
    fn name(&self) -> &str {
        "message_processor"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        for record in self.store.find_unprocessed(Stage::ReceivedMessages).await? {
            if let Err(e) = self.promote(&record).await {
                warn!(uuid = %record.uuid, error = %e, "message left for the next pass");
            }
        }

        self.iterations += 1;
        if self.iterations % u64::from(self.config.housekeeping_every.max(1)) == 0 {
            self.housekeeping().await?;
        }
        Ok(())
    }
}
