// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-shot `HTTP/1.1` responses. Every response closes the connection.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.into(),
        }
    }

    /// Acknowledges an accepted request by echoing its body.
    pub fn echo(body: &[u8]) -> Self {
        Self::text(200, body.to_vec())
    }

    pub fn pong() -> Self {
        Self::text(200, "pong")
    }

    pub fn bad_request(reason: &str) -> Self {
        Self::text(400, reason)
    }

    pub fn payload_too_large() -> Self {
        Self::text(413, "payload too large")
    }

    pub fn unavailable() -> Self {
        Self::text(503, "store unavailable")
    }

    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            413 => "Payload Too Large",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        );
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}
