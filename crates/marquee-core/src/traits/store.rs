// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage store trait for the three persisted pipeline stages.

use async_trait::async_trait;

use crate::error::MarqueeError;
use crate::types::{RecordStatus, Stage, StageRecord};

/// Durable, status-tagged record tables for stages 1 to 3.
///
/// Each stage is an independent table keyed by UUID (unique) and an
/// autoincrement id. Listing operations return records ordered by
/// `received_at` ascending, then id. Cutoffs are canonical timestamps as
/// produced by [`crate::time::format_ts`].
#[async_trait]
pub trait StageStore: Send + Sync + 'static {
    /// Human-readable name of the backend.
    fn name(&self) -> &str;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<(), MarqueeError>;

    async fn find_all(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError>;

    async fn find_by_status(
        &self,
        stage: Stage,
        status: RecordStatus,
    ) -> Result<Vec<StageRecord>, MarqueeError>;

    /// Records whose `processed_at` is null.
    async fn find_unprocessed(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError>;

    /// Records whose `processed_at` is set.
    async fn find_processed(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError>;

    async fn find_by_uuid(
        &self,
        stage: Stage,
        uuid: &str,
    ) -> Result<Option<StageRecord>, MarqueeError>;

    async fn count(&self, stage: Stage) -> Result<u64, MarqueeError>;

    /// Inserts a record and returns its row id. Fails on a duplicate UUID.
    async fn insert(&self, stage: Stage, record: &StageRecord) -> Result<i64, MarqueeError>;

    /// Inserts unless a record with the same UUID exists.
    ///
    /// Returns `Some(id)` when inserted and `None` when the UUID was already present.
    async fn insert_if_absent(
        &self,
        stage: Stage,
        record: &StageRecord,
    ) -> Result<Option<i64>, MarqueeError>;

    /// Updates payload, metadata, status and timestamps of the record with the same UUID.
    ///
    /// Rejects status regressions and never clears a set `processed_at`.
    async fn update(&self, stage: Stage, record: &StageRecord) -> Result<(), MarqueeError>;

    /// Sets `status` and `processed_at` if the record is still unprocessed.
    ///
    /// Returns `false` when the record is missing or was already processed.
    async fn mark_processed(
        &self,
        stage: Stage,
        uuid: &str,
        status: RecordStatus,
        at: &str,
    ) -> Result<bool, MarqueeError>;

    async fn delete_by_uuid(&self, stage: Stage, uuid: &str) -> Result<bool, MarqueeError>;

    /// Deletes records with `status` received before `cutoff`.
    async fn delete_by_status_older_than(
        &self,
        stage: Stage,
        status: RecordStatus,
        cutoff: &str,
    ) -> Result<usize, MarqueeError>;

    /// Deletes processed records received before `cutoff`.
    async fn delete_processed_older_than(
        &self,
        stage: Stage,
        cutoff: &str,
    ) -> Result<usize, MarqueeError>;

    /// Deletes every record received before `cutoff`, regardless of status.
    async fn delete_older_than(&self, stage: Stage, cutoff: &str) -> Result<usize, MarqueeError>;

    async fn delete_all(&self, stage: Stage) -> Result<usize, MarqueeError>;
}
