// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure conversions between stage records and the in-memory message types.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use marquee_core::time::parse_ts;
use marquee_core::{
    DeliverableMessage, ExpirationPolicy, MarqueeError, MessageMeta, RawMessage, StageRecord,
};

/// Priority used when a payload omits or garbles `priority`.
pub const DEFAULT_PRIORITY: u8 = 50;

/// Parse a stage-3 record into its in-memory mirror.
///
/// Fails when the payload is not a JSON object or `received_at` is not a
/// valid timestamp; such records are dropped by the raw synchronizer.
pub fn record_to_raw(record: &StageRecord) -> Result<RawMessage, MarqueeError> {
    let payload: Value =
        serde_json::from_str(&record.payload).map_err(|e| MarqueeError::Classification {
            message: format!("payload of {} is not JSON: {e}", record.uuid),
        })?;
    if !payload.is_object() {
        return Err(MarqueeError::Classification {
            message: format!("payload of {} is not a JSON object", record.uuid),
        });
    }
    let metadata = record
        .metadata
        .as_deref()
        .and_then(|m| serde_json::from_str(m).ok())
        .unwrap_or(Value::Null);
    let created_at = parse_ts(&record.received_at).ok_or_else(|| MarqueeError::Classification {
        message: format!("received_at of {} is not a timestamp", record.uuid),
    })?;
    let modified_at = parse_ts(&record.modified_at).unwrap_or(created_at);

    Ok(RawMessage {
        uuid: record.uuid.clone(),
        payload,
        metadata,
        status: record.status,
        created_at,
        modified_at,
    })
}

/// Time-based expiry of a message: the earlier of `expires_at` and
/// receipt plus `lifespan_secs`.
pub fn expires_at(payload: &Value, received_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let absolute = payload
        .get("expires_at")
        .and_then(Value::as_str)
        .and_then(parse_ts);
    let lifespan = payload
        .get("lifespan_secs")
        .and_then(Value::as_u64)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .and_then(|d| received_at.checked_add_signed(d));
    match (absolute, lifespan) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Whether a raw message has expired by time. Repeat exhaustion only
/// applies to the deliverable view.
pub fn raw_is_expired(message: &RawMessage, now: DateTime<Utc>) -> bool {
    expires_at(&message.payload, message.created_at).is_some_and(|at| at <= now)
}

/// Integer 0..=100 or one of the named levels.
pub fn parse_priority(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|p| p.min(100) as u8)
            .or_else(|| n.as_f64().map(|f| f.clamp(0.0, 100.0) as u8))
            .unwrap_or(DEFAULT_PRIORITY),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "low" => 10,
            "normal" => 50,
            "high" => 80,
            "urgent" => 100,
            other => other.parse::<u8>().map(|p| p.min(100)).unwrap_or(DEFAULT_PRIORITY),
        },
        _ => DEFAULT_PRIORITY,
    }
}

/// A legacy correlation id given as string or integer.
pub fn recno_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// UUID a `/message` payload asks for, if it names a usable one.
pub fn requested_uuid(payload: &Value) -> Option<String> {
    payload
        .get("uuid")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Project a raw message into its deliverable form.
///
/// `last_modified` always starts as `None` so a fresh mirror is
/// distinguishable from one the rotator has already delivered.
pub fn raw_to_deliverable(raw: &RawMessage) -> DeliverableMessage {
    let payload = &raw.payload;
    let meta: MessageMeta = serde_json::from_value(raw.metadata.clone()).unwrap_or_default();
    let repeat_limit = payload
        .get("repeat")
        .and_then(Value::as_u64)
        .map(|r| r.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0);

    DeliverableMessage {
        uuid: raw.uuid.clone(),
        text: payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        priority: parse_priority(payload.get("priority")),
        expiration: ExpirationPolicy {
            expires_at: expires_at(payload, raw.created_at),
            repeat_limit,
        },
        display_secs: payload
            .get("duration_secs")
            .and_then(Value::as_u64)
            .filter(|d| *d > 0),
        scroll: payload.get("scroll").and_then(Value::as_bool).unwrap_or(false),
        deliveries: 0,
        recno: recno_of(payload.get("recno")).or(meta.recno),
        received_at: raw.created_at,
        last_modified: None,
    }
}
