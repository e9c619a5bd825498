// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock telemetry source.

use std::sync::{Arc, Mutex};

use marquee_core::{MarqueeError, TelemetrySnapshot, TelemetrySource};

/// Returns whatever snapshot was last set. Clones share the snapshot, so a
/// test can keep one clone and hand the other to a publisher.
///
/// `None` makes every read fail, to exercise telemetry error paths.
#[derive(Clone, Default)]
pub struct MockTelemetry {
    snapshot: Arc<Mutex<Option<TelemetrySnapshot>>>,
}

impl MockTelemetry {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(Some(snapshot))),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn set(&self, snapshot: Option<TelemetrySnapshot>) {
        if let Ok(mut guard) = self.snapshot.lock() {
            *guard = snapshot;
        }
    }
}

impl TelemetrySource for MockTelemetry {
    fn snapshot(&mut self) -> Result<TelemetrySnapshot, MarqueeError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| MarqueeError::Telemetry("mock telemetry lock poisoned".into()))?;
        guard
            .clone()
            .ok_or_else(|| MarqueeError::Telemetry("mock telemetry unavailable".into()))
    }
}
