// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device telemetry: power, data volume, network and host readings.
//!
//! Host, disk and interface data come from `sysinfo`. Battery and
//! supply state are read from `/sys/class/power_supply` and wireless
//! signal strength from `/proc/net/wireless`; both are absent on most
//! development machines, in which case the readings stay `None`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Disks, Networks, System};
use tokio::sync::watch;
use tracing::{debug, info};

use marquee_core::types::{NetworkStatus, PowerStatus, StorageStatus, SystemStatus};
use marquee_core::{MarqueeError, TelemetrySnapshot, TelemetrySource, Worker};

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";
const WIRELESS_PATH: &str = "/proc/net/wireless";

pub type TelemetrySender = Arc<watch::Sender<TelemetrySnapshot>>;

pub fn telemetry_channel() -> (TelemetrySender, watch::Receiver<TelemetrySnapshot>) {
    let (tx, rx) = watch::channel(TelemetrySnapshot::default());
    (Arc::new(tx), rx)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_i64(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse().ok()
}

/// Read supply and battery state from a `power_supply` class directory.
pub fn read_power_supply(root: &Path) -> PowerStatus {
    let mut status = PowerStatus::default();
    let Ok(entries) = fs::read_dir(root) else {
        return status;
    };
    let mut supplies: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    supplies.sort();

    for dir in supplies {
        match read_trimmed(&dir.join("type")).as_deref() {
            Some("Battery") if status.battery_percent.is_none() => {
                status.battery_percent = read_i64(&dir.join("capacity"))
                    .map(|p| p.clamp(0, 100) as u8);
                let state = read_trimmed(&dir.join("status"));
                status.charging = state.as_deref().map(|s| s.eq_ignore_ascii_case("charging"));
                // sysfs reports micro-units
                status.current_ma = read_i64(&dir.join("current_now")).map(|ua| ua / 1000);
                status.voltage_mv = read_i64(&dir.join("voltage_now")).map(|uv| uv / 1000);
                status.health = read_trimmed(&dir.join("health"));
            }
            Some("Mains" | "USB" | "USB_C" | "USB_PD") => {
                let online = read_i64(&dir.join("online")).map(|v| v == 1);
                status.external_power = match (status.external_power, online) {
                    (Some(true), _) => Some(true),
                    (_, Some(v)) => Some(v),
                    (prev, None) => prev,
                };
            }
            _ => {}
        }
    }
    status
}

/// Signal level in dBm of `interface` from `/proc/net/wireless` content.
pub fn parse_wireless_signal(content: &str, interface: &str) -> Option<i32> {
    content.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != interface {
            return None;
        }
        // status, link quality, signal level
        let level = rest.split_whitespace().nth(2)?;
        let level: f64 = level.trim_end_matches('.').parse().ok()?;
        Some(level as i32)
    })
}

/// Telemetry from `sysinfo` and the kernel's sysfs/procfs files.
pub struct SysinfoTelemetry {
    system: System,
    disks: Disks,
    networks: Networks,
    data_path: PathBuf,
    power_supply_root: PathBuf,
    wireless_path: PathBuf,
}

impl SysinfoTelemetry {
    /// `data_path` selects the volume reported as free space.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            data_path: data_path.into(),
            power_supply_root: PathBuf::from(POWER_SUPPLY_ROOT),
            wireless_path: PathBuf::from(WIRELESS_PATH),
        }
    }

    pub fn with_kernel_paths(
        mut self,
        power_supply_root: impl Into<PathBuf>,
        wireless_path: impl Into<PathBuf>,
    ) -> Self {
        self.power_supply_root = power_supply_root.into();
        self.wireless_path = wireless_path.into();
        self
    }

    fn storage(&mut self) -> StorageStatus {
        self.disks.refresh(true);
        // Longest mount point containing the data path.
        let disk = self
            .disks
            .list()
            .iter()
            .filter(|d| self.data_path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());
        StorageStatus {
            free_bytes: disk.map(|d| d.available_space()),
            total_bytes: disk.map(|d| d.total_space()),
        }
    }

    fn network(&mut self) -> NetworkStatus {
        self.networks.refresh(true);
        let mut names: Vec<&String> = self.networks.keys().collect();
        names.sort();
        let found = names.into_iter().find_map(|name| {
            let data = self.networks.get(name)?;
            data.ip_networks()
                .iter()
                .map(|n| n.addr)
                .find(|addr| matches!(addr, IpAddr::V4(v4) if !v4.is_loopback()))
                .map(|addr| (name.clone(), addr))
        });

        match found {
            Some((interface, addr)) => {
                let signal_dbm = read_trimmed(&self.wireless_path)
                    .and_then(|content| parse_wireless_signal(&content, &interface));
                NetworkStatus {
                    ip_acquired: true,
                    ip_address: Some(addr.to_string()),
                    interface: Some(interface),
                    signal_dbm,
                }
            }
            None => NetworkStatus::default(),
        }
    }

    fn system(&mut self) -> SystemStatus {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        SystemStatus {
            uptime_secs: System::uptime(),
            cpu_percent: self.system.global_cpu_usage(),
            available_memory: self.system.available_memory(),
            os_version: System::long_os_version(),
        }
    }
}

impl TelemetrySource for SysinfoTelemetry {
    fn snapshot(&mut self) -> Result<TelemetrySnapshot, MarqueeError> {
        Ok(TelemetrySnapshot {
            captured_at: Some(Utc::now()),
            power: read_power_supply(&self.power_supply_root),
            storage: self.storage(),
            network: self.network(),
            system: self.system(),
        })
    }
}

/// Samples a [`TelemetrySource`] and publishes each snapshot.
pub struct TelemetryPublisher {
    source: Box<dyn TelemetrySource>,
    tx: TelemetrySender,
    low_battery_percent: u8,
}

impl TelemetryPublisher {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        tx: TelemetrySender,
        low_battery_percent: u8,
    ) -> Self {
        Self {
            source,
            tx,
            low_battery_percent,
        }
    }
}

#[async_trait]
impl Worker for TelemetryPublisher {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        let snapshot = self.source.snapshot()?;
        let low = snapshot.low_power(self.low_battery_percent);
        let was_low = self.tx.borrow().low_power(self.low_battery_percent);
        if low != was_low {
            info!(
                low_power = low,
                battery_percent = ?snapshot.power.battery_percent,
                "power state changed"
            );
        }
        debug!(
            free_bytes = ?snapshot.storage.free_bytes,
            ip = ?snapshot.network.ip_address,
            "telemetry sampled"
        );
        self.tx.send_replace(snapshot);
        Ok(())
    }
}
