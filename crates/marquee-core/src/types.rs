// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the stores, the pipeline workers, and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One of the three persisted pipeline stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: raw socket requests.
    ReceivedRequests,
    /// Stage 2: classified raw messages.
    ReceivedMessages,
    /// Stage 3: canonical messages mirrored into RAM.
    Messages,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::ReceivedRequests, Stage::ReceivedMessages, Stage::Messages];

    /// SQL table backing this stage.
    pub fn table(self) -> &'static str {
        match self {
            Stage::ReceivedRequests => "received_requests",
            Stage::ReceivedMessages => "received_messages",
            Stage::Messages => "messages",
        }
    }
}

/// Processing status of a stage record.
///
/// `New` is the only non-terminal status. Every other status is reached
/// exactly once, together with `processed_at`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    New,
    Forwarded,
    Processed,
    ProcessingError,
    Unknown,
}

impl RecordStatus {
    /// Whether the record has left the `New` state.
    pub fn is_terminal(self) -> bool {
        self != RecordStatus::New
    }

    /// Status only moves forward: `New` to anything, terminal states to themselves.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        self == next || self == RecordStatus::New
    }
}

/// A persisted row in one of the stage stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Autoincrement row id; `None` until inserted.
    pub id: Option<i64>,
    /// Identity of the message, stable across stages.
    pub uuid: String,
    /// Opaque payload (request body or message JSON).
    pub payload: String,
    /// Stage-specific JSON metadata ([`RequestEnvelope`] or [`MessageMeta`]).
    pub metadata: Option<String>,
    pub status: RecordStatus,
    /// Original receipt time, carried forward from stage 1.
    pub received_at: String,
    /// `None` means "not yet processed".
    pub processed_at: Option<String>,
    pub modified_at: String,
}

impl StageRecord {
    /// A fresh, unprocessed record.
    pub fn new(
        uuid: impl Into<String>,
        payload: impl Into<String>,
        metadata: Option<String>,
        received_at: impl Into<String>,
    ) -> Self {
        let received_at = received_at.into();
        Self {
            id: None,
            uuid: uuid.into(),
            payload: payload.into(),
            metadata,
            status: RecordStatus::New,
            modified_at: received_at.clone(),
            received_at,
            processed_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// Request line and headers of a stage-1 record, stored as its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub method: String,
    pub path: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

/// Metadata attached to stage-2 and stage-3 records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// UUID of the stage-1 request that produced this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<String>,
    /// Legacy correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recno: Option<String>,
    /// `message` for the native path, `legacy` for banner bodies.
    #[serde(default)]
    pub source: String,
}

/// In-memory mirror of a stage-3 record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMessage {
    pub uuid: String,
    pub payload: serde_json::Value,
    pub metadata: serde_json::Value,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// When a message stops being deliverable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationPolicy {
    /// Absolute expiry (the earlier of `expires_at` and receipt + lifespan).
    pub expires_at: Option<DateTime<Utc>>,
    /// Deliveries allowed before the message is exhausted; 0 means unlimited.
    pub repeat_limit: u32,
}

impl ExpirationPolicy {
    /// Expired by time alone.
    pub fn is_time_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Expired by time or by exhausted repeats.
    pub fn is_expired(&self, deliveries: u32, now: DateTime<Utc>) -> bool {
        self.is_time_expired(now) || (self.repeat_limit > 0 && deliveries >= self.repeat_limit)
    }
}

/// Delivery-oriented projection of a [`RawMessage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliverableMessage {
    pub uuid: String,
    pub text: String,
    /// 0..=100, higher wins.
    pub priority: u8,
    pub expiration: ExpirationPolicy,
    /// Dwell time of one delivery; `None` uses the rotator default.
    pub display_secs: Option<u64>,
    pub scroll: bool,
    /// Completed deliveries so far.
    pub deliveries: u32,
    pub recno: Option<String>,
    pub received_at: DateTime<Utc>,
    /// `None` for a freshly mirrored message; set when the rotator records a delivery.
    pub last_modified: Option<DateTime<Utc>>,
}

impl DeliverableMessage {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_expired(self.deliveries, now)
    }
}

/// Soft run state of a worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    /// Loop keeps running and heartbeating but skips its work body.
    Paused,
    Running,
    /// Shutdown requested; the loop exits at its next check.
    Stopping,
}

/// Battery and supply readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerStatus {
    pub external_power: Option<bool>,
    pub charging: Option<bool>,
    pub battery_percent: Option<u8>,
    pub current_ma: Option<i64>,
    pub voltage_mv: Option<i64>,
    pub health: Option<String>,
}

/// Data volume readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub free_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

/// Active network interface readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub ip_acquired: bool,
    pub ip_address: Option<String>,
    pub interface: Option<String>,
    pub signal_dbm: Option<i32>,
}

/// Host readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub uptime_secs: u64,
    pub cpu_percent: f32,
    pub available_memory: u64,
    pub os_version: Option<String>,
}

/// Point-in-time device telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub captured_at: Option<DateTime<Utc>>,
    pub power: PowerStatus,
    pub storage: StorageStatus,
    pub network: NetworkStatus,
    pub system: SystemStatus,
}

impl TelemetrySnapshot {
    /// Running on battery below `threshold` percent.
    ///
    /// Unknown readings never count as low power.
    pub fn low_power(&self, threshold: u8) -> bool {
        let on_battery = self.power.external_power == Some(false);
        let low = self.power.battery_percent.is_some_and(|p| p < threshold);
        on_battery && low
    }
}
