// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-alive beacon for external observers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use marquee_core::{MarqueeError, Worker};

use crate::registry::{ProcessRegistry, ProcessReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beacon {
    pub name: String,
    pub pid: u32,
    /// Increases by one per broadcast, across worker restarts.
    pub sequence: u64,
    pub sent_at: DateTime<Utc>,
    pub uptime_secs: u64,
    /// Every registered process reports TRUE.
    pub nominal: bool,
    pub processes: Vec<ProcessReport>,
}

pub type BeaconSender = Arc<watch::Sender<Option<Beacon>>>;

pub fn beacon_channel() -> (BeaconSender, watch::Receiver<Option<Beacon>>) {
    let (tx, rx) = watch::channel(None);
    (Arc::new(tx), rx)
}

pub struct BeaconWorker {
    name: String,
    registry: ProcessRegistry,
    tx: BeaconSender,
    started: Instant,
}

impl BeaconWorker {
    /// `started` is the daemon start time, so uptime survives a restart of the beacon.
    pub fn new(
        name: impl Into<String>,
        registry: ProcessRegistry,
        tx: BeaconSender,
        started: Instant,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            tx,
            started,
        }
    }

    pub fn build(&self) -> Beacon {
        let now = Instant::now();
        let processes = self.registry.report(now);
        let sequence = self.tx.borrow().as_ref().map_or(1, |b| b.sequence + 1);
        Beacon {
            name: self.name.clone(),
            pid: std::process::id(),
            sequence,
            sent_at: Utc::now(),
            uptime_secs: now.saturating_duration_since(self.started).as_secs(),
            nominal: processes.iter().all(|p| p.code.is_nominal()),
            processes,
        }
    }
}

#[async_trait]
impl Worker for BeaconWorker {
    fn name(&self) -> &str {
        "beacon"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        let beacon = self.build();
        debug!(sequence = beacon.sequence, nominal = beacon.nominal, "beacon broadcast");
        self.tx.send_replace(Some(beacon));
        Ok(())
    }
}
