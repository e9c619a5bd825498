// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles a temp SQLite stage store, the shared pipeline
//! handles, a mock delivery surface, a telemetry channel and an empty
//! process registry. `submit()` stores a request exactly as the socket
//! server would, and `run_pipeline()` drives one pass of every stage worker.

use std::sync::Arc;

use marquee_config::model::{MarqueeConfig, StorageConfig};
use marquee_core::time::now_ts;
use marquee_core::{
    MarqueeError, RequestEnvelope, Stage, StageRecord, StageStore, TelemetrySnapshot, Worker,
};
use marquee_health::{ProcessRegistry, TelemetrySender, telemetry_channel};
use marquee_pipeline::{PipelineContext, Rotator};
use marquee_storage::SqliteStageStore;

use crate::mock_surface::MockSurface;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: MarqueeConfig,
    auto_confirm: bool,
    telemetry: TelemetrySnapshot,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: MarqueeConfig::default(),
            auto_confirm: true,
            telemetry: TelemetrySnapshot::default(),
        }
    }

    /// Start from `config`. The storage section is always replaced by the temp database.
    pub fn with_config(mut self, config: MarqueeConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether the mock surface confirms presented messages on its own.
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Initial telemetry snapshot.
    pub fn with_telemetry(mut self, snapshot: TelemetrySnapshot) -> Self {
        self.telemetry = snapshot;
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, MarqueeError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| MarqueeError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("marquee-test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let store = SqliteStageStore::new(config.storage.clone());
        store.initialize().await?;
        let store: Arc<dyn StageStore> = Arc::new(store);
        let context = PipelineContext::new(store);

        let surface = Arc::new(if self.auto_confirm {
            MockSurface::auto_confirm(context.rotation.clone())
        } else {
            MockSurface::new()
        });

        let (telemetry, _) = telemetry_channel();
        telemetry.send_replace(self.telemetry);

        Ok(TestHarness {
            context,
            surface,
            telemetry,
            registry: ProcessRegistry::new(),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    /// Store, RAM, queue, rotation handle and revoker shared by all workers.
    pub context: PipelineContext,
    /// Surface handed to rotators built by [`TestHarness::rotator`].
    pub surface: Arc<MockSurface>,
    /// Publish telemetry snapshots here; rotators observe them.
    pub telemetry: TelemetrySender,
    pub registry: ProcessRegistry,
    pub config: MarqueeConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness: auto-confirming surface, empty telemetry.
    pub async fn new() -> Result<Self, MarqueeError> {
        Self::builder().build().await
    }

    pub fn store(&self) -> &Arc<dyn StageStore> {
        &self.context.store
    }

    /// Store a POST request as a new stage-1 record and return its UUID.
    pub async fn submit(&self, path: &str, body: &str) -> Result<String, MarqueeError> {
        let envelope = RequestEnvelope {
            method: "POST".into(),
            path: path.into(),
            protocol: "HTTP/1.1".into(),
            content_length: body.len(),
            ..Default::default()
        };
        let metadata = serde_json::to_string(&envelope)
            .map_err(|e| MarqueeError::Internal(format!("request envelope: {e}")))?;
        let uuid = uuid::Uuid::new_v4().to_string();
        let record = StageRecord::new(uuid.clone(), body, Some(metadata), now_ts());
        self.store().insert(Stage::ReceivedRequests, &record).await?;
        Ok(uuid)
    }

    /// One pass of every stage worker, in pipeline order.
    pub async fn run_pipeline(&self) -> Result<(), MarqueeError> {
        let pipeline = &self.config.pipeline;
        self.context.request_processor(pipeline).tick().await?;
        self.context.message_processor(pipeline).tick().await?;
        self.context.raw_sync().tick().await?;
        self.context.deliverable_sync().tick().await?;
        self.context.delivery_queue().tick().await?;
        Ok(())
    }

    /// A rotator wired to the mock surface and the harness telemetry.
    pub fn rotator(&self) -> Rotator {
        self.context.rotator(
            self.surface.clone(),
            self.telemetry.subscribe(),
            &self.config.rotator,
        )
    }

    pub async fn raw_uuids(&self) -> Vec<String> {
        self.context
            .ram
            .raw_snapshot()
            .await
            .into_iter()
            .map(|m| m.uuid)
            .collect()
    }

    pub async fn deliverable_uuids(&self) -> Vec<String> {
        self.context
            .ram
            .deliverable_snapshot()
            .await
            .into_iter()
            .map(|m| m.uuid)
            .collect()
    }

    /// UUIDs in delivery order.
    pub async fn queue_uuids(&self) -> Vec<String> {
        self.context
            .queue
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.uuid)
            .collect()
    }
}
