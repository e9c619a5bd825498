// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./marquee.toml` > `~/.config/marquee/marquee.toml` > `/etc/marquee/marquee.toml`
//! with environment variable overrides via `MARQUEE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MarqueeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/marquee/marquee.toml` (system-wide)
/// 3. `~/.config/marquee/marquee.toml` (user XDG config)
/// 4. `./marquee.toml` (local directory)
/// 5. `MARQUEE_*` environment variables
pub fn load_config() -> Result<MarqueeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MarqueeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MarqueeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MarqueeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MarqueeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MarqueeConfig::default()))
        .merge(Toml::file("/etc/marquee/marquee.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("marquee/marquee.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("marquee.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `MARQUEE_SERVER_PING_PASSWORD` must map to
/// `server.ping_password`, not `server.ping.password`.
fn env_provider() -> Env {
    Env::prefixed("MARQUEE_").map(|key| map_env_key(key.as_str()).into())
}

const SECTIONS: [&str; 6] = ["daemon", "storage", "server", "pipeline", "rotator", "health"];

/// Map a prefix-stripped env key to its dotted config path.
///
/// The key arrives in its original case. Only a leading section name is
/// rewritten, so `SERVER_PORT` becomes `server.port` while a field that
/// merely contains a section name is left alone.
fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_maps_underscored_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MARQUEE_SERVER_PING_PASSWORD", "sesame");
            jail.set_env("MARQUEE_ROTATOR_MIN_CLOCK_VISIBILITY_SECS", "9");
            let config: MarqueeConfig = Figment::new()
                .merge(Serialized::defaults(MarqueeConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.server.ping_password.as_deref(), Some("sesame"));
            assert_eq!(config.rotator.min_clock_visibility_secs, 9);
            Ok(())
        });
    }

    #[test]
    fn env_keys_rewrite_only_the_leading_section() {
        assert_eq!(map_env_key("SERVER_PORT"), "server.port");
        assert_eq!(map_env_key("Health_Restart_Grace_Secs"), "health.restart_grace_secs");
        assert_eq!(
            map_env_key("PIPELINE_MESSAGE_PROCESSED_TTL_SECS"),
            "pipeline.message_processed_ttl_secs"
        );
        assert_eq!(map_env_key("SERVERPORT"), "serverport");
        assert_eq!(map_env_key("UNKNOWN_SERVER_PORT"), "unknown_server_port");
    }

    #[test]
    fn env_override_beats_local_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("marquee.toml", "[server]\nport = 9000\n")?;
            jail.set_env("MARQUEE_SERVER_PORT", "9100");
            let config = load_config_from_path(Path::new("marquee.toml"))?;
            assert_eq!(config.server.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("marquee.toml", "[server]\nport = 9000\n")?;
            let config = load_config_from_path(Path::new("marquee.toml"))?;
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.daemon.name, "marquee");
            Ok(())
        });
    }
}
