// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extended device status returned by `/ping`.
//!
//! Field order is part of the wire contract. Serde serializes struct fields
//! in declaration order, so new fields go at the end.

use marquee_core::TelemetrySnapshot;
use marquee_core::time::hours_1dp;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongStatus {
    pub rec: u64,
    pub msgs: usize,
    #[serde(rename = "upHr")]
    pub up_hr: f64,
    #[serde(rename = "appHr")]
    pub app_hr: f64,
    #[serde(rename = "vMA")]
    pub version: String,
    #[serde(rename = "vFL")]
    pub os_version: Option<String>,
    #[serde(rename = "ipAcq")]
    pub ip_acquired: bool,
    #[serde(rename = "ipAdr")]
    pub ip_address: Option<String>,
    #[serde(rename = "NIC")]
    pub nic: Option<String>,
    #[serde(rename = "dBm")]
    pub dbm: Option<i32>,
    #[serde(rename = "CPU")]
    pub cpu: f32,
    #[serde(rename = "heapAv")]
    pub heap_available: u64,
    pub pwr: Option<bool>,
    pub chging: Option<bool>,
    #[serde(rename = "chgLvl")]
    pub charge_level: Option<u8>,
    #[serde(rename = "mA")]
    pub milliamps: Option<i64>,
    pub mv: Option<i64>,
    pub batt: Option<String>,
    #[serde(rename = "freeEx")]
    pub free_bytes: Option<u64>,
}

impl PongStatus {
    pub fn new(
        records: u64,
        queue_len: usize,
        app_uptime_secs: u64,
        telemetry: &TelemetrySnapshot,
    ) -> Self {
        Self {
            rec: records,
            msgs: queue_len,
            up_hr: hours_1dp(telemetry.system.uptime_secs),
            app_hr: hours_1dp(app_uptime_secs),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os_version: telemetry.system.os_version.clone(),
            ip_acquired: telemetry.network.ip_acquired,
            ip_address: telemetry.network.ip_address.clone(),
            nic: telemetry.network.interface.clone(),
            dbm: telemetry.network.signal_dbm,
            cpu: telemetry.system.cpu_percent,
            heap_available: telemetry.system.available_memory,
            pwr: telemetry.power.external_power,
            chging: telemetry.power.charging,
            charge_level: telemetry.power.battery_percent,
            milliamps: telemetry.power.current_ma,
            mv: telemetry.power.voltage_mv,
            batt: telemetry.power.health.clone(),
            free_bytes: telemetry.storage.free_bytes,
        }
    }
}

/// Whether `path` carries `password=<expected>` in its query string.
///
/// Without a configured password the extended status is never returned.
pub fn ping_authorized(path: &str, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    let Some((_, query)) = path.split_once('?') else {
        return false;
    };
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == "password")
        .any(|(_, value)| {
            percent_decode_str(value)
                .decode_utf8()
                .is_ok_and(|decoded| decoded == expected)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_ORDER: [&str; 19] = [
        "rec", "msgs", "upHr", "appHr", "vMA", "vFL", "ipAcq", "ipAdr", "NIC", "dBm", "CPU",
        "heapAv", "pwr", "chging", "chgLvl", "mA", "mv", "batt", "freeEx",
    ];

    #[test]
    fn fields_serialize_in_contract_order() {
        let status = PongStatus::new(3, 2, 7200, &TelemetrySnapshot::default());
        let json = serde_json::to_string(&status).unwrap();
        let mut last = 0;
        for field in FIELD_ORDER {
            let at = json
                .find(&format!("\"{field}\":"))
                .unwrap_or_else(|| panic!("missing {field} in {json}"));
            assert!(at >= last, "{field} out of order in {json}");
            last = at;
        }
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 19);
        assert_eq!(value["appHr"], 2.0);
        assert_eq!(value["dBm"], serde_json::Value::Null);
    }

    #[test]
    fn telemetry_maps_onto_fields() {
        let mut t = TelemetrySnapshot::default();
        t.power.battery_percent = Some(81);
        t.power.external_power = Some(true);
        t.network.interface = Some("wlan0".into());
        t.storage.free_bytes = Some(1024);
        t.system.uptime_secs = 5400;
        let status = PongStatus::new(0, 0, 0, &t);
        assert_eq!(status.charge_level, Some(81));
        assert_eq!(status.pwr, Some(true));
        assert_eq!(status.nic.as_deref(), Some("wlan0"));
        assert_eq!(status.free_bytes, Some(1024));
        assert_eq!(status.up_hr, 1.5);
    }

    #[test]
    fn password_gate() {
        assert!(ping_authorized("/ping?password=s3cret", Some("s3cret")));
        assert!(ping_authorized("/ping?x=1&password=s3cret", Some("s3cret")));
        assert!(!ping_authorized("/ping?password=wrong", Some("s3cret")));
        assert!(!ping_authorized("/ping", Some("s3cret")));
        assert!(!ping_authorized("/ping?password=", None));
    }

    #[test]
    fn password_is_percent_decoded() {
        assert!(ping_authorized("/ping?password=a%20b%26c", Some("a b&c")));
        assert!(!ping_authorized("/ping?password=a%20b", Some("a%20b")));
        assert!(!ping_authorized("/ping?password=%ff", Some("\u{fffd}")));
    }
}
