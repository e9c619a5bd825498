// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Marquee integration tests.
//!
//! Provides mock collaborators and a harness over a temp SQLite database,
//! so pipeline and rotator behavior can be driven deterministically.
//!
//! # Components
//!
//! - [`TestHarness`] - temp stage store, shared pipeline handles and a process registry
//! - [`MockSurface`] - delivery surface recording present/close calls
//! - [`MockTelemetry`] - telemetry source returning a settable snapshot

pub mod harness;
pub mod mock_surface;
pub mod mock_telemetry;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_surface::MockSurface;
pub use mock_telemetry::MockTelemetry;
