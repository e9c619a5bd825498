// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All problems are collected before returning so a single run reports
//! every mistake in the file.

use crate::diagnostic::ConfigError;
use crate::model::MarqueeConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
pub fn validate_config(config: &MarqueeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.daemon.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "daemon.log_level `{}` must be one of {}",
            config.daemon.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::validation("server.bind_address must not be empty"));
    } else {
        let is_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "server.bind_address `{addr}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must be non-zero"));
    }
    if config.server.ping_password.as_deref().is_some_and(str::is_empty) {
        errors.push(ConfigError::validation(
            "server.ping_password must not be empty when set",
        ));
    }
    for (key, value) in [
        ("server.max_body_bytes", config.server.max_body_bytes as u64),
        ("server.max_header_lines", config.server.max_header_lines as u64),
        ("server.read_timeout_secs", config.server.read_timeout_secs),
        ("server.max_connections", config.server.max_connections as u64),
    ] {
        require_positive(&mut errors, key, value);
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    let p = &config.pipeline;
    for (key, value) in [
        ("pipeline.request_interval_ms", p.request_interval_ms),
        ("pipeline.message_interval_ms", p.message_interval_ms),
        ("pipeline.raw_sync_interval_ms", p.raw_sync_interval_ms),
        ("pipeline.deliverable_sync_interval_ms", p.deliverable_sync_interval_ms),
        ("pipeline.queue_interval_ms", p.queue_interval_ms),
        ("pipeline.paused_interval_ms", p.paused_interval_ms),
        ("pipeline.housekeeping_every", u64::from(p.housekeeping_every)),
    ] {
        require_positive(&mut errors, key, value);
    }
    if p.request_forwarded_ttl_secs > p.request_absolute_ttl_secs {
        errors.push(ConfigError::validation(format!(
            "pipeline.request_forwarded_ttl_secs ({}) must not exceed pipeline.request_absolute_ttl_secs ({})",
            p.request_forwarded_ttl_secs, p.request_absolute_ttl_secs
        )));
    }
    if p.message_processed_ttl_secs > p.message_absolute_ttl_secs {
        errors.push(ConfigError::validation(format!(
            "pipeline.message_processed_ttl_secs ({}) must not exceed pipeline.message_absolute_ttl_secs ({})",
            p.message_processed_ttl_secs, p.message_absolute_ttl_secs
        )));
    }

    let r = &config.rotator;
    require_positive(&mut errors, "rotator.poll_interval_ms", r.poll_interval_ms);
    require_positive(&mut errors, "rotator.default_display_secs", r.default_display_secs);
    require_positive(
        &mut errors,
        "rotator.loading_stuck_polls",
        u64::from(r.loading_stuck_polls),
    );
    for (key, value) in [
        ("rotator.priority_tolerance", r.priority_tolerance),
        ("rotator.low_battery_percent", r.low_battery_percent),
    ] {
        if value > 100 {
            errors.push(ConfigError::validation(format!(
                "{key} must be at most 100, got {value}"
            )));
        }
    }

    let h = &config.health;
    for (key, value) in [
        ("health.evaluation_interval_secs", h.evaluation_interval_secs),
        ("health.heartbeat_max_interval_secs", h.heartbeat_max_interval_secs),
        ("health.beacon_interval_secs", h.beacon_interval_secs),
        ("health.telemetry_interval_secs", h.telemetry_interval_secs),
    ] {
        require_positive(&mut errors, key, value);
    }
    if let (Some(desired), Some(required)) = (h.max_desired_runtime_secs, h.max_required_runtime_secs)
    {
        if desired > required {
            errors.push(ConfigError::validation(format!(
                "health.max_desired_runtime_secs ({desired}) must not exceed health.max_required_runtime_secs ({required})"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn require_positive(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
    }
}
