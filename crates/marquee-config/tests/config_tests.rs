// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Marquee configuration system.

use marquee_config::diagnostic::ConfigError;
use marquee_config::model::MarqueeConfig;
use marquee_config::{load_and_validate_str, load_config_from_str};
use serial_test::serial;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[daemon]
name = "lobby-sign"
log_level = "debug"

[storage]
database_path = "/tmp/marquee-test.db"
wal_mode = false

[server]
bind_address = "127.0.0.1"
port = 9100
ping_password = "sesame"
max_body_bytes = 1024

[pipeline]
legacy_compat = false
housekeeping_every = 10

[rotator]
min_clock_visibility_secs = 3
priority_tolerance = 5

[health]
heartbeat_max_interval_secs = 12
max_desired_runtime_secs = 3600
max_required_runtime_secs = 7200
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.daemon.name, "lobby-sign");
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/marquee-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.ping_password.as_deref(), Some("sesame"));
    assert_eq!(config.server.max_body_bytes, 1024);
    assert!(!config.pipeline.legacy_compat);
    assert_eq!(config.pipeline.housekeeping_every, 10);
    assert_eq!(config.rotator.min_clock_visibility_secs, 3);
    assert_eq!(config.rotator.priority_tolerance, 5);
    assert_eq!(config.health.heartbeat_max_interval_secs, 12);
    assert_eq!(config.health.max_required_runtime_secs, Some(7200));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    let defaults = MarqueeConfig::default();
    assert_eq!(config.server.port, defaults.server.port);
    assert_eq!(config.server.ping_password, None);
    assert_eq!(config.rotator.loading_stuck_polls, 40);
    assert!(config.pipeline.legacy_compat);
    assert_eq!(config.health.max_desired_runtime_secs, None);
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = load_config_from_str("[server]\nport = 7000\n").unwrap();
    assert_eq!(config.server.port, 7000);
    assert_eq!(config.server.bind_address, "0.0.0.0");
    assert_eq!(config.server.max_header_lines, 64);
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[server]\nprot = 9000\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "prot");
            assert_eq!(suggestion.as_deref(), Some("port"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "telegram"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(
        &errors[0],
        ConfigError::InvalidType { key, .. } if key.contains("port")
    ));
}

#[test]
fn semantic_errors_come_back_together() {
    let toml = r#"
[server]
port = 0

[rotator]
poll_interval_ms = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn toml_crate_agrees_with_figment() {
    let parsed: MarqueeConfig = toml::from_str("[daemon]\nname = \"x\"\n").unwrap();
    assert_eq!(parsed.daemon.name, "x");
    assert_eq!(parsed.rotator.priority_tolerance, 10);
}

#[test]
#[serial]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("marquee.toml", "[server]\nport = 9000\n")?;
        jail.set_env("MARQUEE_SERVER_PORT", "9001");
        jail.set_env("MARQUEE_PIPELINE_LEGACY_COMPAT", "false");
        let config = marquee_config::load_config_from_path(std::path::Path::new("marquee.toml"))?;
        assert_eq!(config.server.port, 9001);
        assert!(!config.pipeline.legacy_compat);
        Ok(())
    });
}

#[test]
#[serial]
fn validated_path_load_reports_file_errors() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("marquee.toml", "[rotator]\nlow_battery_percent = 101\n")?;
        let errors =
            marquee_config::load_and_validate_path(std::path::Path::new("marquee.toml")).unwrap_err();
        assert!(errors[0].to_string().contains("low_battery_percent"));
        Ok(())
    });
}
