// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker specs for everything the supervisor runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use marquee_config::model::MarqueeConfig;
use marquee_core::{DeliverySurface, Worker};
use marquee_health::{
    BeaconSender, BeaconWorker, ProcessRegistry, SysinfoTelemetry, TelemetryPublisher,
    TelemetrySender, WorkerSpec,
};
use marquee_pipeline::PipelineContext;
use tokio::time::Instant;

/// Handles the worker factories capture.
pub struct WorkerDeps {
    pub context: PipelineContext,
    pub surface: Arc<dyn DeliverySurface>,
    pub telemetry: TelemetrySender,
    pub beacon: BeaconSender,
    pub registry: ProcessRegistry,
}

/// Directory holding the database; telemetry reports free space on its volume.
pub fn data_dir(config: &MarqueeConfig) -> PathBuf {
    Path::new(&config.storage.database_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

pub fn worker_specs(config: &MarqueeConfig, deps: WorkerDeps) -> Vec<WorkerSpec> {
    let pipeline = config.pipeline.clone();
    let mut specs = Vec::new();

    let (ctx, cfg) = (deps.context.clone(), pipeline.clone());
    specs.push(WorkerSpec::new(
        "request_processor",
        millis(pipeline.request_interval_ms),
        move || Box::new(ctx.request_processor(&cfg)) as Box<dyn Worker>,
    ));

    let (ctx, cfg) = (deps.context.clone(), pipeline.clone());
    specs.push(WorkerSpec::new(
        "message_processor",
        millis(pipeline.message_interval_ms),
        move || Box::new(ctx.message_processor(&cfg)) as Box<dyn Worker>,
    ));

    let ctx = deps.context.clone();
    specs.push(WorkerSpec::new(
        "raw_sync",
        millis(pipeline.raw_sync_interval_ms),
        move || Box::new(ctx.raw_sync()) as Box<dyn Worker>,
    ));

    let ctx = deps.context.clone();
    specs.push(WorkerSpec::new(
        "deliverable_sync",
        millis(pipeline.deliverable_sync_interval_ms),
        move || Box::new(ctx.deliverable_sync()) as Box<dyn Worker>,
    ));

    let ctx = deps.context.clone();
    specs.push(WorkerSpec::new(
        "delivery_queue",
        millis(pipeline.queue_interval_ms),
        move || Box::new(ctx.delivery_queue()) as Box<dyn Worker>,
    ));

    let ctx = deps.context.clone();
    let surface = Arc::clone(&deps.surface);
    let telemetry_rx = deps.telemetry.subscribe();
    let rotator = config.rotator.clone();
    specs.push(WorkerSpec::new(
        "rotator",
        millis(rotator.poll_interval_ms),
        move || {
            Box::new(ctx.rotator(Arc::clone(&surface), telemetry_rx.clone(), &rotator))
                as Box<dyn Worker>
        },
    ));

    let telemetry = deps.telemetry.clone();
    let data_dir = data_dir(config);
    let low_battery = config.rotator.low_battery_percent;
    specs.push(WorkerSpec::new(
        "telemetry",
        Duration::from_secs(config.health.telemetry_interval_secs),
        move || {
            Box::new(TelemetryPublisher::new(
                Box::new(SysinfoTelemetry::new(data_dir.clone())),
                telemetry.clone(),
                low_battery,
            )) as Box<dyn Worker>
        },
    ));

    let name = config.daemon.name.clone();
    let registry = deps.registry.clone();
    let beacon = deps.beacon.clone();
    let started = Instant::now();
    specs.push(WorkerSpec::new(
        "beacon",
        Duration::from_secs(config.health.beacon_interval_secs),
        move || {
            Box::new(BeaconWorker::new(
                name.clone(),
                registry.clone(),
                beacon.clone(),
                started,
            )) as Box<dyn Worker>
        },
    ));

    let paused = pipeline.paused_interval();
    let heartbeat = Duration::from_secs(config.health.heartbeat_max_interval_secs);
    specs
        .into_iter()
        .map(|spec| {
            // slow workers still need room for one full sleep between heartbeats
            let heartbeat = heartbeat.max(spec.interval * 2).max(paused * 2);
            spec.with_paused_interval(paused).with_heartbeat_max(heartbeat)
        })
        .collect()
}
