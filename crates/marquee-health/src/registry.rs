// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-worker heartbeat registry and nominal-code evaluation.
//!
//! Workers register at construction and touch their heartbeat on every
//! loop iteration. The supervisor evaluates the registry on a fixed
//! cadence; nothing here is persisted.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{info, warn};

/// Supervisor classification of a monitored worker.
///
/// Variants are declared from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NominalCode {
    /// Never heartbeated.
    Unknown,
    FalseFaultyHeartbeat,
    FalseMaxRequiredRuntime,
    FalseMaxDesiredRuntime,
    /// Fewer children registered than expected.
    False,
    True,
}

impl NominalCode {
    pub fn is_nominal(self) -> bool {
        self == NominalCode::True
    }

    /// Only the runtime codes are remediated.
    pub fn action(self) -> RequestedAction {
        match self {
            NominalCode::FalseMaxRequiredRuntime | NominalCode::FalseMaxDesiredRuntime => {
                RequestedAction::Restart
            }
            _ => RequestedAction::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedAction {
    None,
    Restart,
}

/// What a worker declares about itself when it registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub name: String,
    pub parent: Option<String>,
    pub expected_children: usize,
    pub heartbeat_max: Duration,
    pub max_desired_runtime: Option<Duration>,
    pub max_required_runtime: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, heartbeat_max: Duration) -> Self {
        Self {
            name: name.into(),
            parent: None,
            expected_children: 0,
            heartbeat_max,
            max_desired_runtime: None,
            max_required_runtime: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub spec: ProcessSpec,
    pub started: Instant,
    pub last_heartbeat: Option<Instant>,
    pub code: NominalCode,
    pub action: RequestedAction,
}

/// Compute the nominal code of one process.
///
/// Precedence: UNKNOWN, FALSE_FAULTY_HEARTBEAT, FALSE_MAX_REQUIRED_RUNTIME,
/// FALSE_MAX_DESIRED_RUNTIME, FALSE, TRUE.
pub fn nominal_code(status: &ProcessStatus, children: usize, now: Instant) -> NominalCode {
    let Some(last) = status.last_heartbeat else {
        return NominalCode::Unknown;
    };
    if now.saturating_duration_since(last) > status.spec.heartbeat_max {
        return NominalCode::FalseFaultyHeartbeat;
    }
    let runtime = now.saturating_duration_since(status.started);
    if status.spec.max_required_runtime.is_some_and(|max| runtime > max) {
        return NominalCode::FalseMaxRequiredRuntime;
    }
    if status.spec.max_desired_runtime.is_some_and(|max| runtime > max) {
        return NominalCode::FalseMaxDesiredRuntime;
    }
    if children < status.spec.expected_children {
        return NominalCode::False;
    }
    NominalCode::True
}

/// Serializable view of one process for status output and the beacon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReport {
    pub name: String,
    pub parent: Option<String>,
    pub code: NominalCode,
    pub action: RequestedAction,
    pub runtime_secs: u64,
    pub heartbeat_age_secs: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<DashMap<String, ProcessStatus>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process, replacing any previous generation with the same name.
    pub fn register(&self, spec: ProcessSpec) {
        let name = spec.name.clone();
        self.processes.insert(
            name,
            ProcessStatus {
                spec,
                started: Instant::now(),
                last_heartbeat: None,
                code: NominalCode::Unknown,
                action: RequestedAction::None,
            },
        );
    }

    pub fn deregister(&self, name: &str) -> bool {
        self.processes.remove(name).is_some()
    }

    pub fn touch(&self, name: &str) {
        if let Some(mut status) = self.processes.get_mut(name) {
            status.last_heartbeat = Some(Instant::now());
        }
    }

    pub fn get(&self, name: &str) -> Option<ProcessStatus> {
        self.processes.get(name).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn children_of(&self, parent: &str) -> usize {
        self.processes
            .iter()
            .filter(|s| s.spec.parent.as_deref() == Some(parent))
            .count()
    }

    /// Re-evaluate every process and store its code and requested action.
    ///
    /// Returns the names of processes whose action is RESTART.
    pub fn evaluate(&self, now: Instant) -> Vec<String> {
        // Snapshot first so no shard lock is held while writing back.
        let snapshot: Vec<ProcessStatus> =
            self.processes.iter().map(|s| s.value().clone()).collect();

        let mut restart = Vec::new();
        for status in &snapshot {
            let children = snapshot
                .iter()
                .filter(|s| s.spec.parent.as_deref() == Some(status.spec.name.as_str()))
                .count();
            let code = nominal_code(status, children, now);
            let action = code.action();

            if code != status.code {
                if code.is_nominal() || code == NominalCode::Unknown {
                    info!(worker = %status.spec.name, from = %status.code, to = %code, "nominal code changed");
                } else {
                    warn!(
                        worker = %status.spec.name,
                        code = %code,
                        action = %action,
                        children,
                        expected_children = status.spec.expected_children,
                        "worker is not nominal"
                    );
                }
            }

            if let Some(mut entry) = self.processes.get_mut(&status.spec.name) {
                entry.code = code;
                entry.action = action;
            }
            if action == RequestedAction::Restart {
                restart.push(status.spec.name.clone());
            }
        }
        restart.sort();
        restart
    }

    /// Reports sorted by name.
    pub fn report(&self, now: Instant) -> Vec<ProcessReport> {
        let mut reports: Vec<ProcessReport> = self
            .processes
            .iter()
            .map(|s| ProcessReport {
                name: s.spec.name.clone(),
                parent: s.spec.parent.clone(),
                code: s.code,
                action: s.action,
                runtime_secs: now.saturating_duration_since(s.started).as_secs(),
                heartbeat_age_secs: s
                    .last_heartbeat
                    .map(|h| now.saturating_duration_since(h).as_secs()),
            })
            .collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }

    /// Names of processes whose last evaluated code is not TRUE.
    pub fn non_nominal(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .processes
            .iter()
            .filter(|s| !s.code.is_nominal())
            .map(|s| s.spec.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(spec: ProcessSpec, started: Instant, last: Option<Instant>) -> ProcessStatus {
        ProcessStatus {
            spec,
            started,
            last_heartbeat: last,
            code: NominalCode::Unknown,
            action: RequestedAction::None,
        }
    }

    #[test]
    fn code_precedence() {
        let t0 = Instant::now();
        let mut spec = ProcessSpec::new("w", Duration::from_secs(10));
        spec.expected_children = 2;
        spec.max_desired_runtime = Some(Duration::from_secs(100));
        spec.max_required_runtime = Some(Duration::from_secs(200));

        let never = status(spec.clone(), t0, None);
        assert_eq!(nominal_code(&never, 0, t0 + Duration::from_secs(500)), NominalCode::Unknown);

        let stale = status(spec.clone(), t0, Some(t0));
        assert_eq!(
            nominal_code(&stale, 0, t0 + Duration::from_secs(300)),
            NominalCode::FalseFaultyHeartbeat
        );

        let old = status(spec.clone(), t0, Some(t0 + Duration::from_secs(295)));
        let now = t0 + Duration::from_secs(300);
        assert_eq!(nominal_code(&old, 0, now), NominalCode::FalseMaxRequiredRuntime);

        let now = t0 + Duration::from_secs(150);
        let desired = status(spec.clone(), t0, Some(now));
        assert_eq!(nominal_code(&desired, 0, now), NominalCode::FalseMaxDesiredRuntime);

        let now = t0 + Duration::from_secs(50);
        let young = status(spec, t0, Some(now));
        assert_eq!(nominal_code(&young, 1, now), NominalCode::False);
        assert_eq!(nominal_code(&young, 2, now), NominalCode::True);
    }

    #[test]
    fn only_runtime_codes_restart() {
        assert_eq!(NominalCode::FalseMaxDesiredRuntime.action(), RequestedAction::Restart);
        assert_eq!(NominalCode::FalseMaxRequiredRuntime.action(), RequestedAction::Restart);
        for code in [
            NominalCode::Unknown,
            NominalCode::FalseFaultyHeartbeat,
            NominalCode::False,
            NominalCode::True,
        ] {
            assert_eq!(code.action(), RequestedAction::None, "{code}");
        }
    }

    #[test]
    fn codes_render_screaming_snake() {
        assert_eq!(NominalCode::FalseFaultyHeartbeat.to_string(), "FALSE_FAULTY_HEARTBEAT");
        assert_eq!(RequestedAction::None.to_string(), "NONE");
    }

    #[tokio::test(start_paused = true)]
    async fn registry_counts_children_and_flags_restarts() {
        let registry = ProcessRegistry::new();
        let mut parent = ProcessSpec::new("supervisor", Duration::from_secs(30));
        parent.expected_children = 2;
        registry.register(parent);

        let mut child = ProcessSpec::new("raw_sync", Duration::from_secs(30));
        child.parent = Some("supervisor".into());
        child.max_desired_runtime = Some(Duration::from_secs(60));
        registry.register(child);

        registry.touch("supervisor");
        registry.touch("raw_sync");
        assert_eq!(registry.children_of("supervisor"), 1);

        assert!(registry.evaluate(Instant::now()).is_empty());
        assert_eq!(registry.get("supervisor").unwrap().code, NominalCode::False);
        assert_eq!(registry.get("raw_sync").unwrap().code, NominalCode::True);

        tokio::time::advance(Duration::from_secs(61)).await;
        registry.touch("supervisor");
        registry.touch("raw_sync");
        assert_eq!(registry.evaluate(Instant::now()), vec!["raw_sync".to_string()]);
        assert_eq!(
            registry.get("raw_sync").unwrap().action,
            RequestedAction::Restart
        );
        assert_eq!(registry.non_nominal(), vec!["raw_sync", "supervisor"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistering_resets_runtime() {
        let registry = ProcessRegistry::new();
        registry.register(ProcessSpec::new("w", Duration::from_secs(5)));
        tokio::time::advance(Duration::from_secs(100)).await;
        registry.register(ProcessSpec::new("w", Duration::from_secs(5)));
        let report = registry.report(Instant::now());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].runtime_secs, 0);
        assert_eq!(report[0].heartbeat_age_secs, None);
    }
}
