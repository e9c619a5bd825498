// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared handles wired into every pipeline worker.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use marquee_config::model::{PipelineConfig, RotatorConfig};
use marquee_core::{DeliverySurface, StageStore, TelemetrySnapshot};

use crate::deliverable_sync::DeliverableRamSynchronizer;
use crate::message_processor::MessageProcessor;
use crate::queue::{DeliveryQueue, DeliveryQueueProcessor};
use crate::ram::MessageRam;
use crate::raw_sync::RawRamSynchronizer;
use crate::request_processor::{DeviceConfigSender, RequestProcessor};
use crate::revoke::Revoker;
use crate::rotator::{RotationHandle, Rotator};

/// Everything the pipeline workers share.
///
/// Workers are built from a context rather than holding one, so the
/// supervisor can construct a fresh instance after a restart.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn StageStore>,
    pub ram: Arc<MessageRam>,
    pub queue: Arc<DeliveryQueue>,
    pub rotation: RotationHandle,
    pub revoker: Revoker,
    pub device_config: DeviceConfigSender,
}

impl PipelineContext {
    pub fn new(store: Arc<dyn StageStore>) -> Self {
        let ram = Arc::new(MessageRam::new());
        let rotation = RotationHandle::new();
        let revoker = Revoker::new(Arc::clone(&store), Arc::clone(&ram), rotation.clone());
        let (device_config, _) = watch::channel(None);
        Self {
            store,
            ram,
            queue: Arc::new(DeliveryQueue::new()),
            rotation,
            revoker,
            device_config: Arc::new(device_config),
        }
    }

    /// Receiver for accepted `/config` documents.
    pub fn device_config(&self) -> watch::Receiver<Option<Value>> {
        self.device_config.subscribe()
    }

    pub fn request_processor(&self, config: &PipelineConfig) -> RequestProcessor {
        RequestProcessor::new(
            Arc::clone(&self.store),
            self.revoker.clone(),
            Arc::clone(&self.device_config),
            config.clone(),
        )
    }

    pub fn message_processor(&self, config: &PipelineConfig) -> MessageProcessor {
        MessageProcessor::new(Arc::clone(&self.store), config.clone())
    }

    pub fn raw_sync(&self) -> RawRamSynchronizer {
        RawRamSynchronizer::new(Arc::clone(&self.store), Arc::clone(&self.ram))
    }

    pub fn deliverable_sync(&self) -> DeliverableRamSynchronizer {
        DeliverableRamSynchronizer::new(Arc::clone(&self.store), Arc::clone(&self.ram))
    }

    pub fn delivery_queue(&self) -> DeliveryQueueProcessor {
        DeliveryQueueProcessor::new(Arc::clone(&self.ram), Arc::clone(&self.queue))
    }

    pub fn rotator(
        &self,
        surface: Arc<dyn DeliverySurface>,
        telemetry: watch::Receiver<TelemetrySnapshot>,
        config: &RotatorConfig,
    ) -> Rotator {
        Rotator::new(
            Arc::clone(&self.ram),
            Arc::clone(&self.queue),
            surface,
            self.rotation.clone(),
            telemetry,
            config.clone(),
        )
    }
}
