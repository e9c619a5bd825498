// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `marquee status` command implementation.
//!
//! Sends a `/ping` to the local socket server and displays the device
//! status it returns. Falls back gracefully when the daemon is not running.

use std::io::IsTerminal;
use std::time::Duration;

use marquee_config::model::{MarqueeConfig, ServerConfig};
use marquee_core::MarqueeError;
use marquee_server::PongStatus;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub endpoint: String,
    /// `None` when the daemon answered a bare pong.
    pub device: Option<PongStatus>,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn hours_to_secs(hours: f64) -> u64 {
    (hours.max(0.0) * 3600.0) as u64
}

/// Where to reach the local server; wildcard binds are reached over loopback.
fn endpoint(config: &ServerConfig) -> String {
    let host = match config.bind_address.as_str() {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "::1",
        other => other,
    };
    if host.contains(':') {
        format!("[{host}]:{}", config.port)
    } else {
        format!("{host}:{}", config.port)
    }
}

fn ping_request(config: &ServerConfig) -> String {
    let path = match &config.ping_password {
        Some(password) => format!(
            "/ping?password={}",
            utf8_percent_encode(password, NON_ALPHANUMERIC)
        ),
        None => "/ping".to_string(),
    };
    format!("GET {path} HTTP/1.1\r\nUser-Agent: marquee-status\r\nContent-Length: 0\r\n\r\n")
}

/// Split a raw reply into status code and body.
///
/// The body is cut to `Content-Length` when the header is present.
fn parse_reply(reply: &[u8]) -> Option<(u16, &[u8])> {
    let mut headers = [httparse::EMPTY_HEADER; 16];
    let mut response = httparse::Response::new(&mut headers);
    let httparse::Status::Complete(head_len) = response.parse(reply).ok()? else {
        return None;
    };
    let code = response.code?;
    let body = &reply[head_len..];
    let declared = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .and_then(|v| v.trim().parse::<usize>().ok());
    match declared {
        Some(len) if len <= body.len() => Some((code, &body[..len])),
        Some(_) => None,
        None => Some((code, body)),
    }
}

/// Ping the daemon. `Ok(None)` is a bare pong.
async fn ping(config: &ServerConfig) -> Result<Option<PongStatus>, MarqueeError> {
    let exchange = async {
        let mut stream = TcpStream::connect(endpoint(config)).await?;
        stream.write_all(ping_request(config).as_bytes()).await?;
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        Ok::<_, MarqueeError>(reply)
    };
    let reply = tokio::time::timeout(PING_TIMEOUT, exchange)
        .await
        .map_err(|_| MarqueeError::Timeout {
            duration: PING_TIMEOUT,
        })??;

    match parse_reply(&reply) {
        Some((200, b"pong")) => Ok(None),
        Some((200, body)) => serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| MarqueeError::protocol(format!("unreadable ping status: {e}"))),
        Some((code, _)) => Err(MarqueeError::protocol(format!("ping answered {code}"))),
        None => Err(MarqueeError::protocol("malformed ping reply")),
    }
}

/// Run the `marquee status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &MarqueeConfig, json: bool, plain: bool) -> Result<(), MarqueeError> {
    let endpoint = endpoint(&config.server);
    let use_color = !plain && std::io::stdout().is_terminal();

    let response = match ping(&config.server).await {
        Ok(device) => StatusResponse {
            running: true,
            endpoint,
            device,
        },
        Err(e) => {
            tracing::debug!(error = %e, "ping failed");
            StatusResponse {
                running: false,
                endpoint,
                device: None,
            }
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else if response.running {
        print_status_running(&response, use_color);
    } else {
        print_status_offline(&response.endpoint, use_color);
    }
    Ok(())
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// Print running status with optional colors.
fn print_status_running(response: &StatusResponse, use_color: bool) {
    println!();
    println!("  marquee status");
    println!("  {}", "-".repeat(35));

    let uptime = response
        .device
        .as_ref()
        .map(|d| format_uptime(hours_to_secs(d.app_hr)));
    let state = match &uptime {
        Some(uptime) => format!("running (uptime: {uptime})"),
        None => "running".to_string(),
    };

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✓".green(), state.green());
    } else {
        println!("    State:    [OK] {state}");
    }
    println!("    Endpoint: {}", response.endpoint);

    match &response.device {
        Some(d) => {
            println!("    Version:  {}", d.version);
            println!("    Requests: {} stored", d.rec);
            println!("    Queue:    {} message(s)", d.msgs);
            println!(
                "    Network:  {} on {}",
                or_unknown(d.ip_address.as_deref()),
                or_unknown(d.nic.as_deref())
            );
            let power = match d.pwr {
                Some(true) => "external",
                Some(false) => "battery",
                None => "unknown",
            };
            println!(
                "    Power:    {power}, battery {}%",
                or_unknown(d.charge_level)
            );
            println!(
                "    Storage:  {} MiB free",
                or_unknown(d.free_bytes.map(|b| b / (1024 * 1024)))
            );
        }
        None => println!("    Details:  set server.ping_password for device status"),
    }
    println!();
}

/// Print offline status with optional colors.
fn print_status_offline(endpoint: &str, use_color: bool) {
    println!();
    println!("  marquee status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:    [FAIL] not running");
    }

    println!("    Endpoint: {endpoint}");
    println!();
    println!("  Start with: marquee serve");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn wildcard_bind_is_reached_over_loopback() {
        let mut config = ServerConfig {
            port: 9000,
            ..Default::default()
        };
        assert_eq!(endpoint(&config), "127.0.0.1:9000");
        config.bind_address = "::".into();
        assert_eq!(endpoint(&config), "[::1]:9000");
        config.bind_address = "10.0.0.5".into();
        assert_eq!(endpoint(&config), "10.0.0.5:9000");
    }

    #[test]
    fn ping_carries_password_when_configured() {
        let mut config = ServerConfig::default();
        assert!(ping_request(&config).starts_with("GET /ping HTTP/1.1\r\n"));
        config.ping_password = Some("pw".into());
        assert!(ping_request(&config).starts_with("GET /ping?password=pw HTTP/1.1\r\n"));
    }

    #[test]
    fn ping_password_is_percent_encoded() {
        let config = ServerConfig {
            ping_password: Some("open sesame&x=1".into()),
            ..Default::default()
        };
        let request = ping_request(&config);
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /ping?password=open%20sesame%26x%3D1 HTTP/1.1"
        );
        assert!(marquee_server::ping_authorized(
            request_line.split_whitespace().nth(1).unwrap(),
            config.ping_password.as_deref()
        ));
    }

    #[test]
    fn reply_parsing() {
        let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\npong";
        assert_eq!(parse_reply(reply), Some((200, &b"pong"[..])));
        assert_eq!(parse_reply(b"garbage"), None);
    }

    #[test]
    fn reply_body_is_cut_to_content_length() {
        let reply = b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 2\r\n\r\nnoextra";
        assert_eq!(parse_reply(reply), Some((503, &b"no"[..])));
        let short = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\npong";
        assert_eq!(parse_reply(short), None);
    }

    #[test]
    fn non_utf8_reply_body_is_still_parsed() {
        let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n\xff\xfe";
        assert_eq!(parse_reply(reply), Some((200, &b"\xff\xfe"[..])));
    }

    #[test]
    fn status_response_offline_serializes() {
        let resp = StatusResponse {
            running: false,
            endpoint: "127.0.0.1:8765".to_string(),
            device: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
        assert!(json.contains("\"device\":null"));
    }

    #[tokio::test]
    async fn offline_daemon_is_an_error() {
        // nothing listens on a port we just released
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = ServerConfig {
            bind_address: "127.0.0.1".into(),
            port,
            ..Default::default()
        };
        assert!(ping(&config).await.is_err());
    }
}
