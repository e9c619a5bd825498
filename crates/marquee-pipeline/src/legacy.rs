// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter for legacy banner bodies.
//!
//! Older senders post free-form bodies to arbitrary paths and identify the
//! command only by a `"bannerPurpose":"..."` pair somewhere in the text.
//! Matching is done on a lowercased copy with all whitespace removed, so
//! `"BannerPurpose" : "ClearSign"` and `"bannerpurpose":"clearsign"` are
//! the same command.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::convert::{parse_priority, recno_of};

const PURPOSE_KEY: &str = "\"bannerpurpose\":\"";

static RECNO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"recno"\s*:\s*"?\s*([A-Za-z0-9_.\-]+)"#).expect("valid recno regex")
});

static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(?:bannermessage|bannertext|message|text)"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("valid text regex")
});

static PRIORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(?:bannerpriority|priority)"\s*:\s*"?([A-Za-z0-9]+)"#)
        .expect("valid priority regex")
});

/// A command recognized in a legacy body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyCommand {
    /// Stop showing the message with this correlation id.
    StopScrolling { recno: Option<String> },
    /// Remove every message.
    ClearSign,
    /// Sequence update; acknowledged only.
    UpdateSeq,
    /// Any other purpose: a message to show.
    Banner {
        text: Option<String>,
        recno: Option<String>,
        priority: u8,
    },
}

impl LegacyCommand {
    /// Payload of the `/message` record a banner becomes.
    ///
    /// Returns `None` for non-banner commands and for banners without text.
    pub fn to_message_payload(&self) -> Option<Value> {
        let LegacyCommand::Banner {
            text: Some(text),
            recno,
            priority,
        } = self
        else {
            return None;
        };
        let mut obj = Map::new();
        obj.insert("text".into(), Value::String(text.clone()));
        obj.insert("priority".into(), Value::from(*priority));
        if let Some(recno) = recno {
            obj.insert("recno".into(), Value::String(recno.clone()));
        }
        Some(Value::Object(obj))
    }
}

/// Lowercase and strip every whitespace character.
pub fn normalize(body: &str) -> String {
    body.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The value of `bannerPurpose`, normalized.
pub fn banner_purpose(body: &str) -> Option<String> {
    let normalized = normalize(body);
    let start = normalized.find(PURPOSE_KEY)? + PURPOSE_KEY.len();
    let rest = &normalized[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Recognize a legacy command, or `None` when the body carries no purpose.
pub fn classify(body: &str) -> Option<LegacyCommand> {
    let purpose = banner_purpose(body)?;
    let command = match purpose.as_str() {
        "stopscrollingmessage" => LegacyCommand::StopScrolling {
            recno: extract_recno(body),
        },
        "clearsign" => LegacyCommand::ClearSign,
        "updateseq" => LegacyCommand::UpdateSeq,
        _ => LegacyCommand::Banner {
            text: extract_text(body),
            recno: extract_recno(body),
            priority: extract_priority(body),
        },
    };
    Some(command)
}

/// Look a key up case-insensitively when the body happens to be a JSON object.
fn json_field(body: &str, names: &[&str]) -> Option<Value> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    map.into_iter()
        .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))
        .map(|(_, v)| v)
}

fn extract_recno(body: &str) -> Option<String> {
    if let Some(v) = json_field(body, &["recno"]) {
        return recno_of(Some(&v));
    }
    RECNO_RE
        .captures(body)
        .map(|c| c[1].to_string())
        .filter(|r| !r.is_empty())
}

fn extract_text(body: &str) -> Option<String> {
    if let Some(Value::String(s)) =
        json_field(body, &["bannermessage", "bannertext", "message", "text"])
    {
        return Some(s).filter(|s| !s.is_empty());
    }
    let raw = TEXT_RE.captures(body)?.get(1)?.as_str();
    let unescaped = serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.to_string());
    Some(unescaped).filter(|s| !s.is_empty())
}

fn extract_priority(body: &str) -> u8 {
    if let Some(v) = json_field(body, &["bannerpriority", "priority"]) {
        return parse_priority(Some(&v));
    }
    PRIORITY_RE
        .captures(body)
        .map(|c| parse_priority(Some(&Value::String(c[1].to_string()))))
        .unwrap_or(crate::convert::DEFAULT_PRIORITY)
}
