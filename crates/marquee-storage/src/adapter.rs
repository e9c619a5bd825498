// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`StageStore`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use marquee_config::model::StorageConfig;
use marquee_core::{MarqueeError, RecordStatus, Stage, StageRecord, StageStore};

use crate::database::Database;
use crate::queries::records;

/// SQLite-backed stage store.
///
/// The database is opened lazily by [`SqliteStageStore::initialize`]; every
/// trait method fails with a storage error until then.
pub struct SqliteStageStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStageStore {
    /// Create an uninitialized store for the configured database path.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database (tests, tooling).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the database, apply PRAGMAs and run migrations.
    pub async fn initialize(&self) -> Result<(), MarqueeError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MarqueeError::Storage {
            source: "stage store already initialized".into(),
        })?;
        info!(path = %self.config.database_path, "stage store initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, MarqueeError> {
        self.db.get().ok_or_else(|| MarqueeError::Storage {
            source: "stage store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl StageStore for SqliteStageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) -> Result<(), MarqueeError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("stage store closed after WAL checkpoint");
        }
        Ok(())
    }

    async fn find_all(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError> {
        records::find_all(self.db()?, stage).await
    }

    async fn find_by_status(
        &self,
        stage: Stage,
        status: RecordStatus,
    ) -> Result<Vec<StageRecord>, MarqueeError> {
        records::find_by_status(self.db()?, stage, status).await
    }

    async fn find_unprocessed(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError> {
        records::find_unprocessed(self.db()?, stage).await
    }

    async fn find_processed(&self, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError> {
        records::find_processed(self.db()?, stage).await
    }

    async fn find_by_uuid(
        &self,
        stage: Stage,
        uuid: &str,
    ) -> Result<Option<StageRecord>, MarqueeError> {
        records::find_by_uuid(self.db()?, stage, uuid).await
    }

    async fn count(&self, stage: Stage) -> Result<u64, MarqueeError> {
        records::count(self.db()?, stage).await
    }

    async fn insert(&self, stage: Stage, record: &StageRecord) -> Result<i64, MarqueeError> {
        records::insert(self.db()?, stage, record).await
    }

    async fn insert_if_absent(
        &self,
        stage: Stage,
        record: &StageRecord,
    ) -> Result<Option<i64>, MarqueeError> {
        records::insert_if_absent(self.db()?, stage, record).await
    }

    async fn update(&self, stage: Stage, record: &StageRecord) -> Result<(), MarqueeError> {
        records::update(self.db()?, stage, record).await
    }

    async fn mark_processed(
        &self,
        stage: Stage,
        uuid: &str,
        status: RecordStatus,
        at: &str,
    ) -> Result<bool, MarqueeError> {
        records::mark_processed(self.db()?, stage, uuid, status, at).await
    }

    async fn delete_by_uuid(&self, stage: Stage, uuid: &str) -> Result<bool, MarqueeError> {
        records::delete_by_uuid(self.db()?, stage, uuid).await
    }

    async fn delete_by_status_older_than(
        &self,
        stage: Stage,
        status: RecordStatus,
        cutoff: &str,
    ) -> Result<usize, MarqueeError> {
        records::delete_by_status_older_than(self.db()?, stage, status, cutoff).await
    }

    async fn delete_processed_older_than(
        &self,
        stage: Stage,
        cutoff: &str,
    ) -> Result<usize, MarqueeError> {
        records::delete_processed_older_than(self.db()?, stage, cutoff).await
    }

    async fn delete_older_than(&self, stage: Stage, cutoff: &str) -> Result<usize, MarqueeError> {
        records::delete_older_than(self.db()?, stage, cutoff).await
    }

    async fn delete_all(&self, stage: Stage) -> Result<usize, MarqueeError> {
        records::delete_all(self.db()?, stage).await
    }
}
