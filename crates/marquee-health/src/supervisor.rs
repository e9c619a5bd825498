// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health supervisor: owns the worker tasks and remediates runtime limits.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use marquee_config::model::HealthConfig;
use marquee_core::WorkerState;

use crate::registry::{ProcessRegistry, ProcessSpec};
use crate::runner::{WorkerSpec, run_worker};

/// Registry name of the supervisor itself; every worker is its child.
pub const SUPERVISOR_NAME: &str = "supervisor";

struct Supervised {
    spec: WorkerSpec,
    state: watch::Sender<WorkerState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    restarts: u32,
    exited: bool,
}

pub struct Supervisor {
    registry: ProcessRegistry,
    config: HealthConfig,
    cancel: CancellationToken,
    workers: BTreeMap<String, Supervised>,
}

impl Supervisor {
    pub fn new(registry: ProcessRegistry, config: HealthConfig, cancel: CancellationToken) -> Self {
        Self {
            registry,
            config,
            cancel,
            workers: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    fn heartbeat_max(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_max_interval_secs)
    }

    fn register_self(&self) {
        let mut spec = ProcessSpec::new(SUPERVISOR_NAME, self.heartbeat_max());
        spec.expected_children = self.workers.len();
        self.registry.register(spec);
        self.registry.touch(SUPERVISOR_NAME);
    }

    /// Register and start a worker. Runtime limits not set on the `WorkerSpec`
    /// default to the configured ones.
    pub fn spawn(&mut self, mut spec: WorkerSpec) {
        if spec.max_desired_runtime.is_none() {
            spec.max_desired_runtime = self.config.max_desired_runtime_secs.map(Duration::from_secs);
        }
        if spec.max_required_runtime.is_none() {
            spec.max_required_runtime =
                self.config.max_required_runtime_secs.map(Duration::from_secs);
        }
        let name = spec.name.clone();
        let supervised = self.start(spec, 0);
        info!(worker = %name, "worker started");
        if let Some(old) = self.workers.insert(name, supervised) {
            old.cancel.cancel();
        }
        self.register_self();
    }

    fn start(&self, spec: WorkerSpec, restarts: u32) -> Supervised {
        self.registry.register(spec.process_spec(Some(SUPERVISOR_NAME)));
        let (state, state_rx) = watch::channel(WorkerState::Running);
        let cancel = self.cancel.child_token();
        let worker = (spec.factory)();
        let handle = tokio::spawn(run_worker(
            worker,
            spec.clone(),
            self.registry.clone(),
            state_rx,
            cancel.clone(),
        ));
        Supervised {
            spec,
            state,
            cancel,
            handle,
            restarts,
            exited: false,
        }
    }

    /// Pause or resume a worker. Returns `false` for an unknown name.
    pub fn set_state(&self, name: &str, state: WorkerState) -> bool {
        match self.workers.get(name) {
            Some(w) => {
                w.state.send_replace(state);
                true
            }
            None => false,
        }
    }

    pub fn restarts(&self, name: &str) -> Option<u32> {
        self.workers.get(name).map(|w| w.restarts)
    }

    /// Stop a worker, wait up to the restart grace, then start a fresh one.
    pub async fn restart(&mut self, name: &str) -> bool {
        let Some(mut old) = self.workers.remove(name) else {
            return false;
        };
        old.state.send_replace(WorkerState::Stopping);
        old.cancel.cancel();
        let grace = Duration::from_secs(self.config.restart_grace_secs);
        if tokio::time::timeout(grace, &mut old.handle).await.is_err() {
            warn!(worker = name, grace_secs = grace.as_secs(), "worker ignored stop, aborting");
            old.handle.abort();
            let _ = old.handle.await;
        }

        let restarts = old.restarts + 1;
        let fresh = self.start(old.spec, restarts);
        self.workers.insert(name.to_string(), fresh);
        info!(worker = name, restarts, "worker restarted");
        true
    }

    /// One evaluation cycle: reap exited workers, compute codes, restart.
    pub async fn evaluate_once(&mut self) -> Vec<String> {
        self.registry.touch(SUPERVISOR_NAME);
        for (name, worker) in self.workers.iter_mut() {
            if !worker.exited && worker.handle.is_finished() && !self.cancel.is_cancelled() {
                worker.exited = true;
                self.registry.deregister(name);
                warn!(worker = %name, "worker exited unexpectedly");
            }
        }

        let to_restart = self.registry.evaluate(Instant::now());
        let mut restarted = Vec::new();
        for name in to_restart {
            if self.restart(&name).await {
                restarted.push(name);
            }
        }
        restarted
    }

    /// Evaluate on the configured cadence until the daemon token is cancelled,
    /// then stop every worker.
    pub async fn run(mut self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.evaluation_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.evaluate_once().await;
                }
                _ = self.cancel.cancelled() => {
                    info!("supervisor shutting down");
                    break;
                }
            }
        }
        self.shutdown().await;
    }

    /// Stop all workers, waiting up to the restart grace for each.
    pub async fn shutdown(&mut self) {
        let grace = Duration::from_secs(self.config.restart_grace_secs);
        for worker in self.workers.values() {
            worker.state.send_replace(WorkerState::Stopping);
            worker.cancel.cancel();
        }
        for (name, mut worker) in std::mem::take(&mut self.workers) {
            if tokio::time::timeout(grace, &mut worker.handle).await.is_err() {
                warn!(worker = %name, "worker did not stop in time, aborting");
                worker.handle.abort();
            } else {
                debug!(worker = %name, "worker stopped");
            }
            self.registry.deregister(&name);
        }
        self.registry.deregister(SUPERVISOR_NAME);
    }
}
