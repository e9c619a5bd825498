// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `marquee serve` command implementation.
//!
//! Opens the stage store, wires the pipeline handles into the supervised
//! workers, starts the socket server and waits for a shutdown signal.
//! RAM starts empty; the synchronizers rebuild it from stage 3 and any
//! stage-1/2 records left unprocessed by a crash are picked up again.

use std::sync::Arc;

use marquee_config::model::MarqueeConfig;
use marquee_core::{MarqueeError, StageStore};
use marquee_health::{
    ProcessRegistry, Supervisor, beacon_channel, install_signal_handler, telemetry_channel,
};
use marquee_pipeline::PipelineContext;
use marquee_server::ServerState;
use marquee_storage::SqliteStageStore;
use tracing::{debug, info, warn};

use crate::surface::LogSurface;
use crate::workers::{WorkerDeps, worker_specs};

/// Runs the `marquee serve` command.
pub async fn run_serve(config: MarqueeConfig) -> Result<(), MarqueeError> {
    init_tracing(&config.daemon.log_level);

    info!(name = %config.daemon.name, "starting marquee serve");

    let store = SqliteStageStore::new(config.storage.clone());
    store.initialize().await?;
    let store: Arc<dyn StageStore> = Arc::new(store);

    // Bind before spawning anything so a taken port fails fast.
    let listener = marquee_server::bind(&config.server).await?;

    let cancel = install_signal_handler();
    let context = PipelineContext::new(Arc::clone(&store));
    let (telemetry_tx, telemetry_rx) = telemetry_channel();
    let (beacon_tx, _beacon_rx) = beacon_channel();
    let registry = ProcessRegistry::new();

    let mut supervisor = Supervisor::new(registry.clone(), config.health.clone(), cancel.clone());
    let deps = WorkerDeps {
        surface: Arc::new(LogSurface::new(context.rotation.clone())),
        context: context.clone(),
        telemetry: telemetry_tx,
        beacon: beacon_tx,
        registry,
    };
    for spec in worker_specs(&config, deps) {
        supervisor.spawn(spec);
    }
    let supervisor_task = tokio::spawn(supervisor.run());

    let state = ServerState::new(
        config.server.clone(),
        Arc::clone(&store),
        Arc::clone(&context.queue),
        telemetry_rx,
    );
    let server_task = tokio::spawn(marquee_server::serve(listener, state, cancel.clone()));

    info!(
        bind = %config.server.bind_address,
        port = config.server.port,
        "marquee running"
    );

    cancel.cancelled().await;
    info!("shutting down");

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "socket server exited with an error"),
        Err(e) => warn!(error = %e, "socket server task failed"),
    }
    if let Err(e) = supervisor_task.await {
        warn!(error = %e, "supervisor task failed");
    }

    log_heap_stats();
    store.close().await?;
    info!("marquee stopped");
    Ok(())
}

/// Final jemalloc heap figures.
#[cfg(not(target_env = "msvc"))]
fn log_heap_stats() {
    // Stats are cached until the epoch advances.
    let _ = tikv_jemalloc_ctl::epoch::advance();
    let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
    let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
    debug!(
        allocated_kb = allocated / 1024,
        resident_kb = resident / 1024,
        "heap at shutdown"
    );
}

#[cfg(target_env = "msvc")]
fn log_heap_stats() {}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("marquee={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
