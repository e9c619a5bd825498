// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery rotator: the single-slot presentation state machine.
//!
//! States are Idle -> Loading -> Delivering -> Idle. The two UUID slots
//! live in a [`RotationHandle`] shared with the delivery surface, which
//! confirms readiness, and with the revocation path, which requests
//! closes. Only the rotator advances the state otherwise.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use marquee_config::model::RotatorConfig;
use marquee_core::{DeliverableMessage, DeliverySurface, MarqueeError, TelemetrySnapshot, Worker};

use crate::queue::DeliveryQueue;
use crate::ram::MessageRam;

/// Phase derived from the two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPhase {
    /// Both slots empty; the clock display is visible.
    Idle,
    /// A message is being prepared by the surface.
    Loading,
    /// A message is on screen.
    Delivering,
}

impl std::fmt::Display for RotationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationPhase::Idle => write!(f, "idle"),
            RotationPhase::Loading => write!(f, "loading"),
            RotationPhase::Delivering => write!(f, "delivering"),
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    loading: Option<String>,
    currently: Option<String>,
    /// When the surface confirmed the current message; dwell runs from here.
    delivering_since: Option<Instant>,
    delivered_this_cycle: BTreeSet<String>,
    close_requests: Vec<String>,
    completed: u64,
}

impl Slots {
    fn phase(&self) -> RotationPhase {
        if self.currently.is_some() {
            RotationPhase::Delivering
        } else if self.loading.is_some() {
            RotationPhase::Loading
        } else {
            RotationPhase::Idle
        }
    }
}

/// Point-in-time view of the rotation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationSnapshot {
    pub phase: RotationPhase,
    pub loading: Option<String>,
    pub currently: Option<String>,
    pub delivered_this_cycle: Vec<String>,
    pub completed_deliveries: u64,
}

/// Shared handle onto the rotation slots.
///
/// The lock is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct RotationHandle {
    slots: Arc<Mutex<Slots>>,
}

impl RotationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        let slots = self.lock();
        RotationSnapshot {
            phase: slots.phase(),
            loading: slots.loading.clone(),
            currently: slots.currently.clone(),
            delivered_this_cycle: slots.delivered_this_cycle.iter().cloned().collect(),
            completed_deliveries: slots.completed,
        }
    }

    pub fn phase(&self) -> RotationPhase {
        self.lock().phase()
    }

    pub fn currently(&self) -> Option<String> {
        self.lock().currently.clone()
    }

    pub fn loading(&self) -> Option<String> {
        self.lock().loading.clone()
    }

    /// Called by the delivery surface once `uuid` is on screen.
    ///
    /// Moves the message from the loading slot to the delivering slot.
    /// Returns `false` if `uuid` is not the message being loaded.
    pub fn confirm_ready(&self, uuid: &str) -> bool {
        let mut slots = self.lock();
        if slots.currently.is_some() || slots.loading.as_deref() != Some(uuid) {
            return false;
        }
        slots.currently = slots.loading.take();
        slots.delivering_since = Some(Instant::now());
        true
    }

    fn delivering_since(&self) -> Option<Instant> {
        self.lock().delivering_since
    }

    /// Ask the rotator to close the message with this UUID or legacy
    /// correlation id at its next poll.
    pub fn request_close(&self, correlation: impl Into<String>) {
        self.lock().close_requests.push(correlation.into());
    }

    fn begin_loading(&self, uuid: &str) -> bool {
        let mut slots = self.lock();
        if slots.phase() != RotationPhase::Idle {
            return false;
        }
        slots.loading = Some(uuid.to_string());
        true
    }

    /// Clear both slots; a counted delivery joins the current cycle.
    fn finish(&self, counted: Option<&str>) {
        let mut slots = self.lock();
        slots.loading = None;
        slots.currently = None;
        slots.delivering_since = None;
        if let Some(uuid) = counted {
            slots.delivered_this_cycle.insert(uuid.to_string());
            slots.completed += 1;
        }
    }

    fn take_close_requests(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().close_requests)
    }

    fn delivered_this_cycle(&self) -> BTreeSet<String> {
        self.lock().delivered_this_cycle.clone()
    }

    fn start_new_cycle(&self) {
        self.lock().delivered_this_cycle.clear();
    }
}

/// Why a delivery left the Delivering or Loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Completed,
    Expired,
    Vanished,
    Closed,
    Preempted,
    LoadingStuck,
    PresentFailed,
}

impl EndReason {
    fn as_str(self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::Expired => "expired",
            EndReason::Vanished => "vanished",
            EndReason::Closed => "closed",
            EndReason::Preempted => "preempted",
            EndReason::LoadingStuck => "loading_stuck",
            EndReason::PresentFailed => "present_failed",
        }
    }
}

/// The rotator worker. One `tick` is one poll of the state machine.
pub struct Rotator {
    ram: Arc<MessageRam>,
    queue: Arc<DeliveryQueue>,
    surface: Arc<dyn DeliverySurface>,
    handle: RotationHandle,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    config: RotatorConfig,
    clock_visible_since: Instant,
    /// Message whose start has been logged.
    delivering: Option<String>,
    loading_polls: u32,
    bypass_clock_gate: bool,
}

impl Rotator {
    pub fn new(
        ram: Arc<MessageRam>,
        queue: Arc<DeliveryQueue>,
        surface: Arc<dyn DeliverySurface>,
        handle: RotationHandle,
        telemetry: watch::Receiver<TelemetrySnapshot>,
        config: RotatorConfig,
    ) -> Self {
        Self {
            ram,
            queue,
            surface,
            handle,
            telemetry,
            config,
            clock_visible_since: Instant::now(),
            delivering: None,
            loading_polls: 0,
            bypass_clock_gate: false,
        }
    }

    pub fn handle(&self) -> &RotationHandle {
        &self.handle
    }

    fn dwell(&self, message: &DeliverableMessage) -> Duration {
        Duration::from_secs(message.display_secs.unwrap_or(self.config.default_display_secs))
    }

    /// Best eligible message, skipping `exclude` and anything already shown
    /// this cycle.
    async fn next_candidate(&self, exclude: Option<&str>) -> Option<DeliverableMessage> {
        let now = Utc::now();
        let delivered = self.handle.delivered_this_cycle();
        let live = self.ram.deliverable_snapshot().await;
        self.queue
            .snapshot()
            .await
            .into_iter()
            .filter(|q| Some(q.uuid.as_str()) != exclude && !delivered.contains(&q.uuid))
            .filter_map(|q| live.iter().find(|m| m.uuid == q.uuid).cloned())
            .find(|m| !m.is_expired(now))
    }

    async fn end(&mut self, uuid: &str, reason: EndReason) {
        if let Err(e) = self.surface.close(uuid).await {
            warn!(uuid, error = %e, "delivery surface failed to close message");
        }
        let counted = reason == EndReason::Completed;
        if counted && self.ram.record_delivery(uuid, Utc::now()).await.is_none() {
            debug!(uuid, "delivered message left RAM before it could be counted");
        }
        self.handle.finish(counted.then_some(uuid));
        if reason == EndReason::Preempted {
            self.bypass_clock_gate = true;
        }
        self.delivering = None;
        self.loading_polls = 0;
        self.clock_visible_since = Instant::now();
        match reason {
            EndReason::LoadingStuck | EndReason::PresentFailed => {
                warn!(uuid, reason = reason.as_str(), "delivery abandoned")
            }
            _ => info!(uuid, reason = reason.as_str(), "delivery ended"),
        }
    }

    async fn handle_close_requests(&mut self) {
        let requests = self.handle.take_close_requests();
        if requests.is_empty() {
            return;
        }
        let Some(active) = self.handle.currently().or_else(|| self.handle.loading()) else {
            return;
        };
        let recno = self
            .ram
            .find_deliverable(&active)
            .await
            .and_then(|m| m.recno);
        let hit = requests
            .iter()
            .any(|r| *r == active || recno.as_deref() == Some(r.as_str()));
        if hit {
            self.end(&active, EndReason::Closed).await;
        }
    }

    async fn poll_loading(&mut self, uuid: String) {
        if self.ram.find_deliverable(&uuid).await.is_none() {
            self.end(&uuid, EndReason::Vanished).await;
            return;
        }
        self.loading_polls += 1;
        if self.loading_polls > self.config.loading_stuck_polls {
            warn!(
                uuid = %uuid,
                polls = self.loading_polls,
                "delivery stuck in loading, resetting"
            );
            self.end(&uuid, EndReason::LoadingStuck).await;
        }
    }

    async fn poll_delivering(&mut self, uuid: String) {
        if self.delivering.as_deref() != Some(uuid.as_str()) {
            info!(uuid = %uuid, "delivery started");
            self.delivering = Some(uuid.clone());
            self.loading_polls = 0;
        }
        let started = self.handle.delivering_since().unwrap_or_else(Instant::now);

        let Some(message) = self.ram.find_deliverable(&uuid).await else {
            self.end(&uuid, EndReason::Vanished).await;
            return;
        };
        if message.is_expired(Utc::now()) {
            self.end(&uuid, EndReason::Expired).await;
            return;
        }
        if started.elapsed() >= self.dwell(&message) {
            self.end(&uuid, EndReason::Completed).await;
            return;
        }

        if let Some(candidate) = self.next_candidate(Some(&uuid)).await {
            let threshold = u16::from(message.priority) + u16::from(self.config.priority_tolerance);
            if u16::from(candidate.priority) > threshold {
                info!(
                    uuid = %uuid,
                    by = %candidate.uuid,
                    priority = candidate.priority,
                    "delivery preempted"
                );
                self.end(&uuid, EndReason::Preempted).await;
            }
        }
    }

    async fn try_start(&mut self) {
        if self.telemetry.borrow().low_power(self.config.low_battery_percent) {
            debug!("low power, not starting a delivery");
            return;
        }
        let gate = Duration::from_secs(self.config.min_clock_visibility_secs);
        if !self.bypass_clock_gate && self.clock_visible_since.elapsed() < gate {
            return;
        }

        let mut candidate = self.next_candidate(None).await;
        if candidate.is_none() && !self.handle.delivered_this_cycle().is_empty() {
            debug!("rotation cycle complete");
            self.handle.start_new_cycle();
            candidate = self.next_candidate(None).await;
        }
        let Some(message) = candidate else {
            return;
        };
        if !self.handle.begin_loading(&message.uuid) {
            return;
        }
        self.bypass_clock_gate = false;
        self.loading_polls = 0;
        debug!(uuid = %message.uuid, priority = message.priority, "loading delivery");
        if let Err(e) = self.surface.present(&message).await {
            warn!(uuid = %message.uuid, error = %e, "delivery surface failed to present");
            self.end(&message.uuid, EndReason::PresentFailed).await;
        }
    }
}

#[async_trait]
impl Worker for Rotator {
    fn name(&self) -> &str {
        "rotator"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        self.handle_close_requests().await;

        if let Some(uuid) = self.handle.currently() {
            self.poll_delivering(uuid).await;
        } else if let Some(uuid) = self.handle.loading() {
            self.poll_loading(uuid).await;
        } else {
            self.delivering = None;
        }

        if self.handle.phase() == RotationPhase::Idle {
            self.try_start().await;
        }
        Ok(())
    }
}
