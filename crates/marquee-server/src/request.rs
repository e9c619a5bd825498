// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded reader for the minimal HTTP/1.x request format.
//!
//! The head is read line by line so neither a single line nor the number
//! of header lines can grow without bound, then handed to `httparse`.
//! Exactly `Content-Length` body bytes follow the blank separator line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest accepted request or header line, terminator included.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_header_lines: usize,
    pub max_line_bytes: usize,
    pub max_body_bytes: usize,
}

impl Limits {
    pub fn from_config(config: &marquee_config::model::ServerConfig) -> Self {
        Self {
            max_header_lines: config.max_header_lines,
            max_line_bytes: MAX_LINE_BYTES,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The peer closed the stream before a complete request arrived.
    #[error("connection closed before the request was complete")]
    Closed,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("body of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub content_length: usize,
    pub body: Vec<u8>,
}

impl Request {
    /// The body as text. `None` when it is not UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// `GET` to a path mentioning `/ping`.
    pub fn is_ping(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET") && self.path.contains("/ping")
    }
}

/// Append one line (up to and including `\n`) to `buf`, reading at most `max` bytes.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> Result<usize, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let n = (&mut *reader).take(max as u64).read_until(b'\n', buf).await?;
    Ok(n)
}

/// Read request line and headers up to and excluding the blank line.
async fn read_head<R>(reader: &mut R, limits: &Limits) -> Result<Vec<u8>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    let mut lines = 0usize;
    loop {
        let start = head.len();
        let n = read_line(reader, &mut head, limits.max_line_bytes).await?;
        if n == 0 {
            return Err(if head.is_empty() {
                ParseError::Closed
            } else {
                ParseError::Malformed("stream ended inside the header block".into())
            });
        }
        let line = &head[start..];
        if !line.ends_with(b"\n") {
            if n < limits.max_line_bytes {
                return Err(ParseError::Closed);
            }
            return Err(ParseError::Malformed("header line too long".into()));
        }
        if line == b"\r\n" || line == b"\n" {
            if start == 0 {
                // tolerate stray blank lines before the request line
                head.clear();
                continue;
            }
            return Ok(head);
        }
        lines += 1;
        // request line plus headers
        if lines > limits.max_header_lines + 1 {
            return Err(ParseError::Malformed("too many header lines".into()));
        }
    }
}

fn header_value(headers: &[httparse::Header<'_>], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| String::from_utf8_lossy(h.value).trim().to_string())
}

/// Read one request from `reader`.
pub async fn read_request<R>(reader: &mut R, limits: &Limits) -> Result<Request, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = read_head(reader, limits).await?;
    // httparse wants the terminating blank line
    head.extend_from_slice(b"\r\n");

    let mut headers = vec![httparse::EMPTY_HEADER; limits.max_header_lines.max(1)];
    let mut parsed = httparse::Request::new(&mut headers);
    match parsed.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(ParseError::Malformed("incomplete request head".into()));
        }
        Err(e) => return Err(ParseError::Malformed(e.to_string())),
    }

    let method = parsed.method.unwrap_or_default().to_string();
    let path = parsed.path.unwrap_or_default().to_string();
    let protocol = format!("HTTP/1.{}", parsed.version.unwrap_or(1));
    let user_agent = header_value(parsed.headers, "User-Agent");
    let content_type = header_value(parsed.headers, "Content-Type");
    let content_length = match header_value(parsed.headers, "Content-Length") {
        None => 0,
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| ParseError::Malformed(format!("invalid Content-Length {v:?}")))?,
    };
    if content_length > limits.max_body_bytes {
        return Err(ParseError::TooLarge {
            len: content_length,
            max: limits.max_body_bytes,
        });
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::Closed
        } else {
            ParseError::Io(e)
        }
    })?;
    if std::str::from_utf8(&body).is_err() {
        return Err(ParseError::Malformed("body is not valid UTF-8".into()));
    }

    Ok(Request {
        method,
        path,
        protocol,
        user_agent,
        content_type,
        content_length,
        body,
    })
}
