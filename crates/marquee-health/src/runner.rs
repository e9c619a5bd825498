// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The loop every supervised worker runs in.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use marquee_core::{Worker, WorkerState};

use crate::registry::{ProcessRegistry, ProcessSpec};

/// Builds a fresh worker instance; called at start and on every restart.
pub type WorkerFactory = Arc<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// How to run and monitor one worker class.
#[derive(Clone)]
pub struct WorkerSpec {
    pub name: String,
    pub interval: Duration,
    pub paused_interval: Duration,
    pub heartbeat_max: Duration,
    pub max_desired_runtime: Option<Duration>,
    pub max_required_runtime: Option<Duration>,
    pub factory: WorkerFactory,
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("paused_interval", &self.paused_interval)
            .field("heartbeat_max", &self.heartbeat_max)
            .finish_non_exhaustive()
    }
}

impl WorkerSpec {
    pub fn new<F>(name: impl Into<String>, interval: Duration, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interval,
            paused_interval: interval,
            heartbeat_max: Duration::from_secs(30),
            max_desired_runtime: None,
            max_required_runtime: None,
            factory: Arc::new(factory),
        }
    }

    pub fn with_paused_interval(mut self, paused: Duration) -> Self {
        self.paused_interval = paused;
        self
    }

    pub fn with_heartbeat_max(mut self, max: Duration) -> Self {
        self.heartbeat_max = max;
        self
    }

    pub fn with_runtime_limits(
        mut self,
        desired: Option<Duration>,
        required: Option<Duration>,
    ) -> Self {
        self.max_desired_runtime = desired;
        self.max_required_runtime = required;
        self
    }

    /// Registry entry for this worker under `parent`.
    pub fn process_spec(&self, parent: Option<&str>) -> ProcessSpec {
        ProcessSpec {
            name: self.name.clone(),
            parent: parent.map(String::from),
            expected_children: 0,
            heartbeat_max: self.heartbeat_max,
            max_desired_runtime: self.max_desired_runtime,
            max_required_runtime: self.max_required_runtime,
        }
    }
}

/// Drive `worker` until cancelled or told to stop.
///
/// Each iteration sleeps, checks cancellation, touches the heartbeat and
/// runs one `tick` when the state is `Running`. A paused worker keeps
/// heartbeating on the paused interval.
pub async fn run_worker(
    mut worker: Box<dyn Worker>,
    spec: WorkerSpec,
    registry: ProcessRegistry,
    mut state: watch::Receiver<WorkerState>,
    cancel: CancellationToken,
) {
    let name = spec.name;
    loop {
        let current = *state.borrow_and_update();
        let sleep_for = match current {
            WorkerState::Stopping => {
                debug!(worker = %name, "worker stopping");
                return;
            }
            WorkerState::Paused => spec.paused_interval,
            WorkerState::Running => spec.interval,
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(worker = %name, "worker cancelled");
                return;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    warn!(worker = %name, "worker lost its control channel");
                    return;
                }
                continue;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }

        if cancel.is_cancelled() {
            return;
        }
        registry.touch(&name);
        if *state.borrow() != WorkerState::Running {
            continue;
        }
        if let Err(e) = worker.tick().await {
            warn!(worker = %name, error = %e, "worker iteration failed");
        }
    }
}
