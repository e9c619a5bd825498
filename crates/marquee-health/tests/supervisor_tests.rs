// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervisor behaviour under paused tokio time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use marquee_config::model::HealthConfig;
use marquee_core::{MarqueeError, Worker, WorkerState};
use marquee_health::{NominalCode, ProcessRegistry, RequestedAction, Supervisor, WorkerSpec};

struct Counter {
    ticks: Arc<AtomicU32>,
}

#[async_trait]
impl Worker for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Never returns from its first tick.
struct Wedged;

#[async_trait]
impl Worker for Wedged {
    fn name(&self) -> &str {
        "wedged"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

fn config() -> HealthConfig {
    HealthConfig {
        evaluation_interval_secs: 5,
        heartbeat_max_interval_secs: 10,
        restart_grace_secs: 2,
        ..Default::default()
    }
}

fn counter_spec(ticks: &Arc<AtomicU32>, constructed: &Arc<AtomicU32>) -> WorkerSpec {
    let ticks = Arc::clone(ticks);
    let constructed = Arc::clone(constructed);
    WorkerSpec::new("counter", Duration::from_secs(1), move || {
        constructed.fetch_add(1, Ordering::SeqCst);
        Box::new(Counter {
            ticks: Arc::clone(&ticks),
        }) as Box<dyn Worker>
    })
    .with_heartbeat_max(Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn worker_ticks_and_heartbeats() {
    let ticks = Arc::new(AtomicU32::new(0));
    let constructed = Arc::new(AtomicU32::new(0));
    let registry = ProcessRegistry::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), CancellationToken::new());
    supervisor.spawn(counter_spec(&ticks, &constructed));

    tokio::time::sleep(Duration::from_millis(5500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 5);

    assert!(supervisor.evaluate_once().await.is_empty());
    assert_eq!(registry.get("counter").unwrap().code, NominalCode::True);
    assert_eq!(registry.get("supervisor").unwrap().code, NominalCode::True);
    supervisor.shutdown().await;
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn paused_worker_heartbeats_without_working() {
    let ticks = Arc::new(AtomicU32::new(0));
    let constructed = Arc::new(AtomicU32::new(0));
    let registry = ProcessRegistry::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), CancellationToken::new());
    supervisor.spawn(counter_spec(&ticks, &constructed));
    assert!(supervisor.set_state("counter", WorkerState::Paused));
    assert!(!supervisor.set_state("nobody", WorkerState::Paused));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    assert!(registry.get("counter").unwrap().last_heartbeat.is_some());

    supervisor.set_state("counter", WorkerState::Running);
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 1);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn desired_runtime_triggers_restart() {
    let ticks = Arc::new(AtomicU32::new(0));
    let constructed = Arc::new(AtomicU32::new(0));
    let registry = ProcessRegistry::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), CancellationToken::new());
    supervisor.spawn(
        counter_spec(&ticks, &constructed)
            .with_runtime_limits(Some(Duration::from_secs(20)), None),
    );

    tokio::time::sleep(Duration::from_millis(15_500)).await;
    assert!(supervisor.evaluate_once().await.is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(supervisor.evaluate_once().await, vec!["counter".to_string()]);
    assert_eq!(supervisor.restarts("counter"), Some(1));
    assert_eq!(constructed.load(Ordering::SeqCst), 2);

    // the fresh generation starts with a clean runtime
    let status = registry.get("counter").unwrap();
    assert_eq!(status.action, RequestedAction::None);
    assert!(status.last_heartbeat.is_none());
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn faulty_heartbeat_is_reported_not_remediated() {
    let registry = ProcessRegistry::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), CancellationToken::new());
    supervisor.spawn(
        WorkerSpec::new("wedged", Duration::from_secs(1), || {
            Box::new(Wedged) as Box<dyn Worker>
        })
        .with_heartbeat_max(Duration::from_secs(10)),
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(supervisor.evaluate_once().await.is_empty());
    let status = registry.get("wedged").unwrap();
    assert_eq!(status.code, NominalCode::FalseFaultyHeartbeat);
    assert_eq!(status.action, RequestedAction::None);
    assert_eq!(supervisor.restarts("wedged"), Some(0));

    // shutdown aborts the wedged task after the grace period
    supervisor.shutdown().await;
    assert!(registry.get("wedged").is_none());
}

#[tokio::test(start_paused = true)]
async fn unknown_until_first_heartbeat() {
    let ticks = Arc::new(AtomicU32::new(0));
    let constructed = Arc::new(AtomicU32::new(0));
    let registry = ProcessRegistry::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), CancellationToken::new());
    supervisor.spawn(counter_spec(&ticks, &constructed));
    supervisor.evaluate_once().await;
    assert_eq!(registry.get("counter").unwrap().code, NominalCode::Unknown);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_daemon_token_stops_the_supervisor() {
    let ticks = Arc::new(AtomicU32::new(0));
    let constructed = Arc::new(AtomicU32::new(0));
    let registry = ProcessRegistry::new();
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(registry.clone(), config(), cancel.clone());
    supervisor.spawn(counter_spec(&ticks, &constructed));
    let task = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();
    task.await.unwrap();

    let after = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after);
    assert!(registry.is_empty());
}
