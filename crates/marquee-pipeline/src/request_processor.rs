// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage 1 -> stage 2: classify raw socket requests.
//!
//! Every request ends in a terminal status with `processed_at` set, even
//! when it cannot be classified, so nothing is reprocessed forever. Only a
//! store failure leaves a request unprocessed for the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use marquee_config::model::PipelineConfig;
use marquee_core::time::{cutoff_ts, now_ts};
use marquee_core::{
    MarqueeError, MessageMeta, RecordStatus, RequestEnvelope, Stage, StageRecord, StageStore,
    Worker,
};

use crate::convert::{recno_of, requested_uuid};
use crate::legacy::{self, LegacyCommand};
use crate::revoke::Revoker;

/// Publishes accepted `/config` documents.
pub type DeviceConfigSender = Arc<watch::Sender<Option<Value>>>;

/// What to do with one stage-1 request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestAction {
    /// Insert a stage-2 message.
    Forward {
        payload: Value,
        source: &'static str,
        recno: Option<String>,
    },
    /// Publish a device configuration document.
    PublishConfig(Value),
    /// Revoke every message with this legacy correlation id.
    RevokeRecno(String),
    RevokeAll,
    /// Recognized, nothing to do.
    Acknowledge,
    /// Recognized but unusable.
    Reject(String),
    Unknown,
}

impl RequestAction {
    /// Stage-1 status once the action has been carried out.
    pub fn status(&self) -> RecordStatus {
        match self {
            RequestAction::Forward { .. } => RecordStatus::Forwarded,
            RequestAction::PublishConfig(_)
            | RequestAction::RevokeRecno(_)
            | RequestAction::RevokeAll
            | RequestAction::Acknowledge => RecordStatus::Processed,
            RequestAction::Reject(_) => RecordStatus::ProcessingError,
            RequestAction::Unknown => RecordStatus::Unknown,
        }
    }
}

/// Strip the query string and any trailing slash.
pub fn route_of(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn json_object(body: &str) -> Option<Value> {
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(Value::is_object)
}

/// Decide what a request means from its path and body.
pub fn classify_request(path: &str, body: &str, legacy_compat: bool) -> RequestAction {
    let route = route_of(path);
    if route.eq_ignore_ascii_case("/message") {
        return match json_object(body) {
            Some(payload) => RequestAction::Forward {
                payload,
                source: "message",
                recno: None,
            },
            None => RequestAction::Reject("message body is not a JSON object".into()),
        };
    }
    if route.eq_ignore_ascii_case("/config") {
        return match json_object(body) {
            Some(doc) => RequestAction::PublishConfig(doc),
            None => RequestAction::Reject("config body is not a JSON object".into()),
        };
    }
    if !legacy_compat {
        return RequestAction::Unknown;
    }

    match legacy::classify(body) {
        None => RequestAction::Unknown,
        Some(LegacyCommand::StopScrolling { recno: Some(recno) }) => RequestAction::RevokeRecno(recno),
        Some(LegacyCommand::StopScrolling { recno: None }) => {
            RequestAction::Reject("stop request without recno".into())
        }
        Some(LegacyCommand::ClearSign) => RequestAction::RevokeAll,
        Some(LegacyCommand::UpdateSeq) => RequestAction::Acknowledge,
        Some(banner @ LegacyCommand::Banner { .. }) => match banner.to_message_payload() {
            Some(payload) => RequestAction::Forward {
                recno: recno_of(payload.get("recno")),
                payload,
                source: "legacy",
            },
            None => RequestAction::Reject("banner without text".into()),
        },
    }
}

pub struct RequestProcessor {
    store: Arc<dyn StageStore>,
    revoker: Revoker,
    device_config: DeviceConfigSender,
    config: PipelineConfig,
    iterations: u64,
}

impl RequestProcessor {
    pub fn new(
        store: Arc<dyn StageStore>,
        revoker: Revoker,
        device_config: DeviceConfigSender,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            revoker,
            device_config,
            config,
            iterations: 0,
        }
    }

    /// Carry out one request and return its terminal status.
    async fn process(&self, record: &StageRecord) -> Result<RecordStatus, MarqueeError> {
        let envelope: RequestEnvelope = record
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_default();
        let action = classify_request(&envelope.path, &record.payload, self.config.legacy_compat);
        let status = action.status();

        match action {
            RequestAction::Forward {
                payload,
                source,
                recno,
            } => {
                let uuid = requested_uuid(&payload).unwrap_or_else(|| record.uuid.clone());
                let meta = MessageMeta {
                    origin_request: Some(record.uuid.clone()),
                    recno,
                    source: source.to_string(),
                };
                let metadata = serde_json::to_string(&meta).map_err(|e| {
                    MarqueeError::Internal(format!("failed to encode message metadata: {e}"))
                })?;
                let message = StageRecord::new(
                    uuid.as_str(),
                    payload.to_string(),
                    Some(metadata),
                    record.received_at.as_str(),
                );
                match self.store.insert_if_absent(Stage::ReceivedMessages, &message).await? {
                    Some(_) => info!(uuid = %uuid, request = %record.uuid, source, "request forwarded"),
                    None => debug!(uuid = %uuid, request = %record.uuid, "message already forwarded"),
                }
            }
            RequestAction::PublishConfig(doc) => {
                self.device_config.send_replace(Some(doc));
                info!(request = %record.uuid, "device configuration published");
            }
            RequestAction::RevokeRecno(recno) => {
                self.revoker.revoke_recno(&recno).await?;
            }
            RequestAction::RevokeAll => {
                self.revoker.revoke_all().await?;
            }
            RequestAction::Acknowledge => {
                info!(request = %record.uuid, "legacy sequence update acknowledged");
            }
            RequestAction::Reject(reason) => {
                warn!(request = %record.uuid, path = %envelope.path, reason = %reason, "request rejected");
            }
            RequestAction::Unknown => {
                debug!(request = %record.uuid, path = %envelope.path, "unrecognized request");
            }
        }
        Ok(status)
    }

    /// Purge forwarded requests past the short TTL and anything past the absolute TTL.
    pub async fn housekeeping(&self) -> Result<usize, MarqueeError> {
        let now = Utc::now();
        let forwarded_cutoff =
            cutoff_ts(now, Duration::from_secs(self.config.request_forwarded_ttl_secs));
        let absolute_cutoff =
            cutoff_ts(now, Duration::from_secs(self.config.request_absolute_ttl_secs));
        let forwarded = self
            .store
            .delete_by_status_older_than(
                Stage::ReceivedRequests,
                RecordStatus::Forwarded,
                &forwarded_cutoff,
            )
            .await?;
        let aged = self
            .store
            .delete_older_than(Stage::ReceivedRequests, &absolute_cutoff)
            .await?;
        if forwarded + aged > 0 {
            info!(
                stage = %Stage::ReceivedRequests,
                forwarded,
                aged,
                "housekeeping purged requests"
            );
        }
        Ok(forwarded + aged)
    }
}

#[async_trait]
impl Worker for RequestProcessor {
    fn name(&self) -> &str {
        "request_processor"
    }

    async fn tick(&mut self) -> Result<(), MarqueeError> {
        for record in self.store.find_unprocessed(Stage::ReceivedRequests).await? {
            match self.process(&record).await {
                Ok(status) => {
                    self.store
                        .mark_processed(Stage::ReceivedRequests, &record.uuid, status, &now_ts())
                        .await?;
                }
                Err(e) => {
                    warn!(request = %record.uuid, error = %e, "request left for the next pass");
                }
            }
        }

        self.iterations += 1;
        if self.iterations % u64::from(self.config.housekeeping_every.max(1)) == 0 {
            self.housekeeping().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_ignore_query_and_trailing_slash() {
        assert_eq!(route_of("/message?x=1"), "/message");
        assert_eq!(route_of("/config/"), "/config");
        assert_eq!(route_of(""), "/");
    }

    #[test]
    fn message_path() {
        let action = classify_request("/message", r#"{"text":"hello"}"#, true);
        assert_eq!(action.status(), RecordStatus::Forwarded);
        assert_eq!(
            action,
            RequestAction::Forward {
                payload: json!({"text": "hello"}),
                source: "message",
                recno: None,
            }
        );

        let bad = classify_request("/MESSAGE", "[1,2]", true);
        assert_eq!(bad.status(), RecordStatus::ProcessingError);
    }

    #[test]
    fn message_object_without_text_is_forwarded() {
        let action = classify_request("/message", r#"{"priority":70}"#, true);
        assert_eq!(action.status(), RecordStatus::Forwarded);
    }

    #[test]
    fn config_path() {
        let action = classify_request("/config", r#"{"brightness":3}"#, true);
        assert_eq!(action, RequestAction::PublishConfig(json!({"brightness": 3})));
        assert_eq!(
            classify_request("/config", "nope", true).status(),
            RecordStatus::ProcessingError
        );
    }

    #[test]
    fn legacy_bodies() {
        let stop = r#"{"bannerPurpose":"stopScrollingMessage","recno":"17"}"#;
        assert_eq!(
            classify_request("/", stop, true),
            RequestAction::RevokeRecno("17".into())
        );
        assert_eq!(
            classify_request("/", r#"{"bannerPurpose":"stopScrollingMessage"}"#, true).status(),
            RecordStatus::ProcessingError
        );
        assert_eq!(
            classify_request("/x", r#""bannerPurpose":"clearSign""#, true),
            RequestAction::RevokeAll
        );
        assert_eq!(
            classify_request("/x", r#""bannerPurpose":"updateSeq""#, true),
            RequestAction::Acknowledge
        );

        let banner = r#"{"bannerPurpose":"banner","bannerMessage":"Fire drill","recno":5}"#;
        match classify_request("/legacy", banner, true) {
            RequestAction::Forward {
                payload,
                source,
                recno,
            } => {
                assert_eq!(payload["text"], "Fire drill");
                assert_eq!(source, "legacy");
                assert_eq!(recno.as_deref(), Some("5"));
            }
            other => panic!("expected forward, got {other:?}"),
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn unusable_requests_are_closed_out() {
        let db = marquee_storage::Database::open_in_memory().await.unwrap();
        let store: Arc<dyn StageStore> =
            Arc::new(marquee_storage::SqliteStageStore::from_database(db));
        let ram = Arc::new(crate::ram::MessageRam::new());
        let revoker = Revoker::new(
            Arc::clone(&store),
            ram,
            crate::rotator::RotationHandle::new(),
        );
        let (tx, _rx) = watch::channel(None);
        let mut processor = RequestProcessor::new(
            Arc::clone(&store),
            revoker,
            Arc::new(tx),
            PipelineConfig::default(),
        );

        let envelope = serde_json::to_string(&RequestEnvelope {
            method: "POST".into(),
            path: "/message".into(),
            ..Default::default()
        })
        .unwrap();
        store
            .insert(
                Stage::ReceivedRequests,
                &StageRecord::new("r1", "<html>", Some(envelope), now_ts()),
            )
            .await
            .unwrap();

        processor.tick().await.unwrap();
        processor.tick().await.unwrap();

        let record = store
            .find_by_uuid(Stage::ReceivedRequests, "r1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RecordStatus::ProcessingError);
        assert!(record.processed_at.is_some());
        assert_eq!(store.count(Stage::ReceivedMessages).await.unwrap(), 0);
        assert!(logs_contain("request rejected"));
    }

    #[test]
    fn legacy_disabled_or_unmatched_is_unknown() {
        let stop = r#"{"bannerPurpose":"clearSign"}"#;
        assert_eq!(classify_request("/", stop, false), RequestAction::Unknown);
        assert_eq!(classify_request("/favicon.ico", "", true), RequestAction::Unknown);
    }
}
