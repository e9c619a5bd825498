// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Marquee daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Marquee configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MarqueeConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Stage store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Socket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Processor and synchronizer cadence, housekeeping TTLs.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Delivery rotator timing rules.
    #[serde(default)]
    pub rotator: RotatorConfig,

    /// Health supervisor settings.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Daemon identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Name reported in logs and the status command.
    #[serde(default = "default_daemon_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: default_daemon_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_daemon_name() -> String {
    "marquee".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file holding all three stages.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("marquee").join("marquee.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "marquee.db".to_string())
}

fn default_true() -> bool {
    true
}

/// Socket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port, fixed for the lifetime of the process.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Password unlocking the extended `/ping` status. `None` always answers a bare pong.
    #[serde(default)]
    pub ping_password: Option<String>,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Largest number of header lines read before the blank separator.
    #[serde(default = "default_max_header_lines")]
    pub max_header_lines: usize,

    /// Per-connection read timeout.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Concurrent connection workers.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            ping_password: None,
            max_body_bytes: default_max_body_bytes(),
            max_header_lines: default_max_header_lines(),
            read_timeout_secs: default_read_timeout_secs(),
            max_connections: default_max_connections(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_max_header_lines() -> usize {
    64
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> usize {
    32
}

/// Pipeline worker cadence and housekeeping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Classify unrecognized paths by legacy banner body heuristics.
    #[serde(default = "default_true")]
    pub legacy_compat: bool,

    /// Request processor (stage 1 -> 2) poll interval.
    #[serde(default = "default_processor_interval_ms")]
    pub request_interval_ms: u64,

    /// Message processor (stage 2 -> 3) poll interval.
    #[serde(default = "default_processor_interval_ms")]
    pub message_interval_ms: u64,

    /// Raw-RAM synchronizer poll interval.
    #[serde(default = "default_processor_interval_ms")]
    pub raw_sync_interval_ms: u64,

    /// Deliverable-RAM synchronizer poll interval.
    #[serde(default = "default_processor_interval_ms")]
    pub deliverable_sync_interval_ms: u64,

    /// Delivery queue processor poll interval.
    #[serde(default = "default_queue_interval_ms")]
    pub queue_interval_ms: u64,

    /// Sleep between iterations while a worker is paused.
    #[serde(default = "default_paused_interval_ms")]
    pub paused_interval_ms: u64,

    /// Housekeeping runs every N processor iterations.
    #[serde(default = "default_housekeeping_every")]
    pub housekeeping_every: u32,

    /// Age after which FORWARDED stage-1 records are purged.
    #[serde(default = "default_short_ttl_secs")]
    pub request_forwarded_ttl_secs: u64,

    /// Age after which any stage-1 record is purged.
    #[serde(default = "default_absolute_ttl_secs")]
    pub request_absolute_ttl_secs: u64,

    /// Age after which processed stage-2 records are purged.
    #[serde(default = "default_short_ttl_secs")]
    pub message_processed_ttl_secs: u64,

    /// Age after which any stage-2 record is purged.
    #[serde(default = "default_absolute_ttl_secs")]
    pub message_absolute_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            legacy_compat: true,
            request_interval_ms: default_processor_interval_ms(),
            message_interval_ms: default_processor_interval_ms(),
            raw_sync_interval_ms: default_processor_interval_ms(),
            deliverable_sync_interval_ms: default_processor_interval_ms(),
            queue_interval_ms: default_queue_interval_ms(),
            paused_interval_ms: default_paused_interval_ms(),
            housekeeping_every: default_housekeeping_every(),
            request_forwarded_ttl_secs: default_short_ttl_secs(),
            request_absolute_ttl_secs: default_absolute_ttl_secs(),
            message_processed_ttl_secs: default_short_ttl_secs(),
            message_absolute_ttl_secs: default_absolute_ttl_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn paused_interval(&self) -> Duration {
        Duration::from_millis(self.paused_interval_ms)
    }
}

fn default_processor_interval_ms() -> u64 {
    1000
}

fn default_queue_interval_ms() -> u64 {
    500
}

fn default_paused_interval_ms() -> u64 {
    5000
}

fn default_housekeeping_every() -> u32 {
    60
}

fn default_short_ttl_secs() -> u64 {
    3600
}

fn default_absolute_ttl_secs() -> u64 {
    7 * 24 * 3600
}

/// Delivery rotator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RotatorConfig {
    /// State machine poll interval.
    #[serde(default = "default_rotator_poll_ms")]
    pub poll_interval_ms: u64,

    /// Dwell time on the idle clock display before the next delivery starts.
    #[serde(default = "default_min_clock_visibility_secs")]
    pub min_clock_visibility_secs: u64,

    /// Dwell time of one delivery when the message does not set `duration_secs`.
    #[serde(default = "default_display_secs")]
    pub default_display_secs: u64,

    /// Poll iterations a delivery may stay LOADING before it is forcibly reset.
    #[serde(default = "default_loading_stuck_polls")]
    pub loading_stuck_polls: u32,

    /// A waiting message preempts the current one only when its priority is
    /// higher by more than this margin.
    #[serde(default = "default_priority_tolerance")]
    pub priority_tolerance: u8,

    /// No new delivery starts on battery below this percentage.
    #[serde(default = "default_low_battery_percent")]
    pub low_battery_percent: u8,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_rotator_poll_ms(),
            min_clock_visibility_secs: default_min_clock_visibility_secs(),
            default_display_secs: default_display_secs(),
            loading_stuck_polls: default_loading_stuck_polls(),
            priority_tolerance: default_priority_tolerance(),
            low_battery_percent: default_low_battery_percent(),
        }
    }
}

fn default_rotator_poll_ms() -> u64 {
    250
}

fn default_min_clock_visibility_secs() -> u64 {
    5
}

fn default_display_secs() -> u64 {
    15
}

fn default_loading_stuck_polls() -> u32 {
    40
}

fn default_priority_tolerance() -> u8 {
    10
}

fn default_low_battery_percent() -> u8 {
    15
}

/// Health supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Nominal-code evaluation cadence.
    #[serde(default = "default_evaluation_interval_secs")]
    pub evaluation_interval_secs: u64,

    /// Heartbeat age beyond which a worker is FALSE_FAULTY_HEARTBEAT.
    #[serde(default = "default_heartbeat_max_interval_secs")]
    pub heartbeat_max_interval_secs: u64,

    /// Process-alive beacon cadence.
    #[serde(default = "default_beacon_interval_secs")]
    pub beacon_interval_secs: u64,

    /// Telemetry sampling cadence.
    #[serde(default = "default_telemetry_interval_secs")]
    pub telemetry_interval_secs: u64,

    /// Time a worker is given to exit before its replacement is spawned.
    #[serde(default = "default_restart_grace_secs")]
    pub restart_grace_secs: u64,

    /// Runtime after which a worker is restarted at the next evaluation.
    #[serde(default)]
    pub max_desired_runtime_secs: Option<u64>,

    /// Hard runtime limit; exceeding it also requests a restart.
    #[serde(default)]
    pub max_required_runtime_secs: Option<u64>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_secs: default_evaluation_interval_secs(),
            heartbeat_max_interval_secs: default_heartbeat_max_interval_secs(),
            beacon_interval_secs: default_beacon_interval_secs(),
            telemetry_interval_secs: default_telemetry_interval_secs(),
            restart_grace_secs: default_restart_grace_secs(),
            max_desired_runtime_secs: None,
            max_required_runtime_secs: None,
        }
    }
}

fn default_evaluation_interval_secs() -> u64 {
    5
}

fn default_heartbeat_max_interval_secs() -> u64 {
    30
}

fn default_beacon_interval_secs() -> u64 {
    60
}

fn default_telemetry_interval_secs() -> u64 {
    30
}

fn default_restart_grace_secs() -> u64 {
    5
}
