// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage-to-RAM pipeline tests against an in-memory SQLite store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use marquee_config::model::PipelineConfig;
use marquee_core::time::{format_ts, now_ts};
use marquee_core::{RecordStatus, RequestEnvelope, Stage, StageRecord, Worker};
use marquee_pipeline::PipelineContext;
use marquee_storage::{Database, SqliteStageStore};

async fn context() -> PipelineContext {
    let db = Database::open_in_memory().await.unwrap();
    PipelineContext::new(Arc::new(SqliteStageStore::from_database(db)))
}

fn request(uuid: &str, path: &str, body: &str, received_at: &str) -> StageRecord {
    let envelope = RequestEnvelope {
        method: "POST".into(),
        path: path.into(),
        protocol: "HTTP/1.1".into(),
        content_length: body.len(),
        ..Default::default()
    };
    StageRecord::new(
        uuid,
        body,
        Some(serde_json::to_string(&envelope).unwrap()),
        received_at,
    )
}

fn message(uuid: &str, payload: serde_json::Value, received_at: &str) -> StageRecord {
    StageRecord::new(uuid, payload.to_string(), None, received_at)
}

/// One pass of every stage worker, in pipeline order.
async fn run_pipeline(ctx: &PipelineContext, config: &PipelineConfig) {
    ctx.request_processor(config).tick().await.unwrap();
    ctx.message_processor(config).tick().await.unwrap();
    ctx.raw_sync().tick().await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();
    ctx.delivery_queue().tick().await.unwrap();
}

async fn stage3_uuids(ctx: &PipelineContext) -> BTreeSet<String> {
    ctx.store
        .find_all(Stage::Messages)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.uuid)
        .collect()
}

async fn raw_uuids(ctx: &PipelineContext) -> BTreeSet<String> {
    ctx.ram.raw_snapshot().await.into_iter().map(|m| m.uuid).collect()
}

#[tokio::test]
async fn posted_message_reaches_both_ram_collections() {
    let ctx = context().await;
    let config = PipelineConfig::default();
    let received_at = "2026-03-01T12:00:00.000Z";
    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("req-1", "/message", r#"{"text":"hello"}"#, received_at),
        )
        .await
        .unwrap();

    run_pipeline(&ctx, &config).await;

    let req = ctx
        .store
        .find_by_uuid(Stage::ReceivedRequests, "req-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(req.status, RecordStatus::Forwarded);
    assert!(req.processed_at.is_some());

    let forwarded = ctx
        .store
        .find_by_uuid(Stage::ReceivedMessages, "req-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(forwarded.status, RecordStatus::Forwarded);

    let stored = ctx
        .store
        .find_by_uuid(Stage::Messages, "req-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RecordStatus::New);
    assert_eq!(stored.received_at, received_at);

    let raw = ctx.ram.raw_snapshot().await;
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].uuid, "req-1");
    let deliverable = ctx.ram.find_deliverable("req-1").await.unwrap();
    assert_eq!(deliverable.text, "hello");
    assert!(deliverable.last_modified.is_none());
    assert_eq!(ctx.queue.len().await, 1);
}

#[tokio::test]
async fn resent_message_uuid_is_stored_once() {
    let ctx = context().await;
    let config = PipelineConfig::default();
    let body = r#"{"uuid":"msg-7","text":"again"}"#;
    for i in 0..3 {
        ctx.store
            .insert(
                Stage::ReceivedRequests,
                &request(&format!("req-{i}"), "/message", body, &now_ts()),
            )
            .await
            .unwrap();
        run_pipeline(&ctx, &config).await;
    }

    assert_eq!(ctx.store.count(Stage::ReceivedRequests).await.unwrap(), 3);
    assert_eq!(ctx.store.count(Stage::ReceivedMessages).await.unwrap(), 1);
    assert_eq!(ctx.store.count(Stage::Messages).await.unwrap(), 1);
    assert_eq!(raw_uuids(&ctx).await, BTreeSet::from(["msg-7".to_string()]));
}

#[tokio::test]
async fn message_processor_is_idempotent() {
    let ctx = context().await;
    let config = PipelineConfig::default();
    let record = message("dup", json!({"text": "x"}), &now_ts());

    for _ in 0..4 {
        ctx.store.delete_by_uuid(Stage::ReceivedMessages, "dup").await.unwrap();
        ctx.store.insert(Stage::ReceivedMessages, &record).await.unwrap();
        ctx.message_processor(&config).tick().await.unwrap();
    }

    assert_eq!(ctx.store.count(Stage::Messages).await.unwrap(), 1);
}

#[tokio::test]
async fn stale_requests_are_purged_regardless_of_status() {
    let ctx = context().await;
    let config = PipelineConfig {
        housekeeping_every: 1,
        request_absolute_ttl_secs: 3600,
        ..Default::default()
    };
    let two_hours_ago = format_ts(Utc::now() - Duration::hours(2));
    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("old", "/nowhere", "", &two_hours_ago),
        )
        .await
        .unwrap();
    ctx.store
        .insert(Stage::ReceivedRequests, &request("fresh", "/nowhere", "", &now_ts()))
        .await
        .unwrap();

    ctx.request_processor(&config).tick().await.unwrap();

    assert!(
        ctx.store
            .find_by_uuid(Stage::ReceivedRequests, "old")
            .await
            .unwrap()
            .is_none()
    );
    let fresh = ctx
        .store
        .find_by_uuid(Stage::ReceivedRequests, "fresh")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.status, RecordStatus::Unknown);
}

#[tokio::test]
async fn forwarded_requests_age_out_on_the_short_ttl() {
    let ctx = context().await;
    let config = PipelineConfig {
        housekeeping_every: 1,
        request_forwarded_ttl_secs: 60,
        ..Default::default()
    };
    let ten_minutes_ago = format_ts(Utc::now() - Duration::minutes(10));
    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("fwd", "/message", r#"{"text":"t"}"#, &ten_minutes_ago),
        )
        .await
        .unwrap();
    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("bad", "/message", "not json", &ten_minutes_ago),
        )
        .await
        .unwrap();

    ctx.request_processor(&config).tick().await.unwrap();

    assert!(
        ctx.store
            .find_by_uuid(Stage::ReceivedRequests, "fwd")
            .await
            .unwrap()
            .is_none()
    );
    let bad = ctx
        .store
        .find_by_uuid(Stage::ReceivedRequests, "bad")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bad.status, RecordStatus::ProcessingError);
}

#[tokio::test]
async fn raw_ram_mirrors_stage_three() {
    let ctx = context().await;
    let mut sync = ctx.raw_sync();
    for uuid in ["a", "b", "c"] {
        ctx.store
            .insert(Stage::Messages, &message(uuid, json!({"text": uuid}), &now_ts()))
            .await
            .unwrap();
    }

    sync.tick().await.unwrap();
    assert_eq!(raw_uuids(&ctx).await, stage3_uuids(&ctx).await);

    ctx.store.delete_by_uuid(Stage::Messages, "b").await.unwrap();
    ctx.store
        .insert(Stage::Messages, &message("d", json!({"text": "d"}), &now_ts()))
        .await
        .unwrap();
    sync.tick().await.unwrap();
    assert_eq!(raw_uuids(&ctx).await, stage3_uuids(&ctx).await);
    assert!(!ctx.ram.contains_raw("b").await);
}

#[tokio::test]
async fn raw_order_follows_receipt_time() {
    let ctx = context().await;
    let base = Utc::now();
    for (uuid, offset) in [("late", 30), ("early", 10), ("middle", 20)] {
        let at = format_ts(base - Duration::seconds(60 - offset));
        ctx.store
            .insert(Stage::Messages, &message(uuid, json!({"text": uuid}), &at))
            .await
            .unwrap();
    }
    ctx.raw_sync().tick().await.unwrap();
    let order: Vec<_> = ctx
        .ram
        .raw_snapshot()
        .await
        .into_iter()
        .map(|m| m.uuid)
        .collect();
    assert_eq!(order, vec!["early", "middle", "late"]);
}

#[tokio::test]
async fn expired_and_unreadable_records_never_reach_ram() {
    let ctx = context().await;
    let past = format_ts(Utc::now() - Duration::hours(1));
    ctx.store
        .insert(
            Stage::Messages,
            &message("expired", json!({"text": "x", "expires_at": past}), &now_ts()),
        )
        .await
        .unwrap();
    ctx.store
        .insert(
            Stage::Messages,
            &message(
                "lifespan",
                json!({"text": "x", "lifespan_secs": 60}),
                &format_ts(Utc::now() - Duration::minutes(5)),
            ),
        )
        .await
        .unwrap();
    ctx.store
        .insert(Stage::Messages, &StageRecord::new("garbage", "{{", None, now_ts()))
        .await
        .unwrap();
    ctx.store
        .insert(Stage::Messages, &message("live", json!({"text": "ok"}), &now_ts()))
        .await
        .unwrap();

    ctx.raw_sync().tick().await.unwrap();

    assert_eq!(stage3_uuids(&ctx).await, BTreeSet::from(["live".to_string()]));
    assert_eq!(raw_uuids(&ctx).await, BTreeSet::from(["live".to_string()]));
}

#[tokio::test]
async fn exhausted_deliverable_cascades_to_stage_three() {
    let ctx = context().await;
    ctx.store
        .insert(
            Stage::Messages,
            &message("once", json!({"text": "one shot", "repeat": 1}), &now_ts()),
        )
        .await
        .unwrap();
    ctx.raw_sync().tick().await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();
    assert!(ctx.ram.find_deliverable("once").await.is_some());

    ctx.ram.record_delivery("once", Utc::now()).await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();

    assert!(!ctx.ram.contains_raw("once").await);
    assert!(ctx.ram.find_deliverable("once").await.is_none());
    assert!(stage3_uuids(&ctx).await.is_empty());

    // nothing for the raw synchronizer to resurrect
    ctx.raw_sync().tick().await.unwrap();
    assert!(!ctx.ram.contains_raw("once").await);
}

#[tokio::test]
async fn empty_raw_ram_clears_deliverables() {
    let ctx = context().await;
    ctx.store
        .insert(Stage::Messages, &message("m", json!({"text": "m"}), &now_ts()))
        .await
        .unwrap();
    ctx.raw_sync().tick().await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();
    assert_eq!(ctx.ram.deliverable_len().await, 1);

    ctx.store.delete_all(Stage::Messages).await.unwrap();
    ctx.raw_sync().tick().await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();
    assert_eq!(ctx.ram.raw_len().await, 0);
    assert_eq!(ctx.ram.deliverable_len().await, 0);
}

#[tokio::test]
async fn legacy_stop_revokes_by_recno() {
    let ctx = context().await;
    let config = PipelineConfig::default();
    let banner = r#"{"bannerPurpose":"banner","bannerMessage":"Lunch is served","recno":"42"}"#;
    ctx.store
        .insert(Stage::ReceivedRequests, &request("r1", "/", banner, &now_ts()))
        .await
        .unwrap();
    run_pipeline(&ctx, &config).await;
    let shown = ctx.ram.find_deliverable("r1").await.unwrap();
    assert_eq!(shown.recno.as_deref(), Some("42"));
    assert_eq!(shown.text, "Lunch is served");

    let stop = r#"{"bannerPurpose":"stopScrollingMessage","recno":"42"}"#;
    ctx.store
        .insert(Stage::ReceivedRequests, &request("r2", "/", stop, &now_ts()))
        .await
        .unwrap();
    run_pipeline(&ctx, &config).await;

    let r2 = ctx
        .store
        .find_by_uuid(Stage::ReceivedRequests, "r2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(r2.status, RecordStatus::Processed);
    assert!(stage3_uuids(&ctx).await.is_empty());
    assert_eq!(ctx.ram.raw_len().await, 0);
    assert_eq!(ctx.ram.deliverable_len().await, 0);
}

#[tokio::test]
async fn clear_sign_revokes_everything() {
    let ctx = context().await;
    let config = PipelineConfig::default();
    for i in 0..3 {
        ctx.store
            .insert(
                Stage::ReceivedRequests,
                &request(&format!("m{i}"), "/message", r#"{"text":"x"}"#, &now_ts()),
            )
            .await
            .unwrap();
    }
    run_pipeline(&ctx, &config).await;
    assert_eq!(ctx.ram.raw_len().await, 3);

    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("clear", "/legacy", r#""bannerPurpose" : "ClearSign""#, &now_ts()),
        )
        .await
        .unwrap();
    run_pipeline(&ctx, &config).await;

    assert_eq!(ctx.store.count(Stage::Messages).await.unwrap(), 0);
    assert_eq!(ctx.ram.raw_len().await, 0);
    assert_eq!(ctx.queue.len().await, 0);
}

#[tokio::test]
async fn config_documents_are_published() {
    let ctx = context().await;
    let mut rx = ctx.device_config();
    ctx.store
        .insert(
            Stage::ReceivedRequests,
            &request("cfg", "/config", r#"{"brightness":7}"#, &now_ts()),
        )
        .await
        .unwrap();

    ctx.request_processor(&PipelineConfig::default())
        .tick()
        .await
        .unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Some(json!({"brightness": 7})));
    let cfg = ctx
        .store
        .find_by_uuid(Stage::ReceivedRequests, "cfg")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cfg.status, RecordStatus::Processed);
}

#[tokio::test]
async fn revoke_removes_message_everywhere() {
    let ctx = context().await;
    ctx.store
        .insert(Stage::Messages, &message("gone", json!({"text": "bye"}), &now_ts()))
        .await
        .unwrap();
    ctx.raw_sync().tick().await.unwrap();
    ctx.deliverable_sync().tick().await.unwrap();

    assert!(ctx.revoker.revoke("gone").await.unwrap());
    assert!(!ctx.revoker.revoke("gone").await.unwrap());
    assert!(stage3_uuids(&ctx).await.is_empty());
    assert_eq!(ctx.ram.deliverable_len().await, 0);
}
