// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message pipeline for the Marquee daemon.
//!
//! Data flows stage 1 -> stage 2 -> stage 3 -> raw RAM -> deliverable RAM
//! -> delivery queue -> rotator. Each arrow is an independent
//! poll-and-reconcile [`Worker`](marquee_core::Worker); the next pass
//! repairs whatever a failed pass left behind.

pub mod context;
pub mod convert;
pub mod deliverable_sync;
pub mod legacy;
pub mod message_processor;
pub mod queue;
pub mod ram;
pub mod raw_sync;
pub mod request_processor;
pub mod revoke;
pub mod rotator;

pub use context::PipelineContext;
pub use deliverable_sync::DeliverableRamSynchronizer;
pub use message_processor::MessageProcessor;
pub use queue::{DeliveryQueue, DeliveryQueueProcessor};
pub use ram::MessageRam;
pub use raw_sync::RawRamSynchronizer;
pub use request_processor::{DeviceConfigSender, RequestAction, RequestProcessor};
pub use revoke::Revoker;
pub use rotator::{RotationHandle, RotationPhase, RotationSnapshot, Rotator};
