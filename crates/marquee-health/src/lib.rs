// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health supervision for the Marquee daemon.
//!
//! Every long-running worker runs under the [`Supervisor`], which tracks
//! heartbeats in a [`ProcessRegistry`], computes a nominal code per worker
//! and restarts workers that exceed their runtime limits. The beacon and
//! telemetry publishers are ordinary supervised workers.

pub mod beacon;
pub mod registry;
pub mod runner;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;

pub use beacon::{Beacon, BeaconSender, BeaconWorker, beacon_channel};
pub use registry::{
    NominalCode, ProcessRegistry, ProcessReport, ProcessSpec, ProcessStatus, RequestedAction,
};
pub use runner::{WorkerFactory, WorkerSpec, run_worker};
pub use shutdown::install_signal_handler;
pub use supervisor::{SUPERVISOR_NAME, Supervisor};
pub use telemetry::{SysinfoTelemetry, TelemetryPublisher, TelemetrySender, telemetry_channel};
