// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The two in-memory message collections.
//!
//! `MessageRam` owns the raw mirror of stage 3 and the deliverable
//! projection of it. Writers hold a lock only for the duration of one
//! insert or remove; readers work on cloned snapshots.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use marquee_core::{DeliverableMessage, RawMessage};

#[derive(Debug, Default)]
pub struct MessageRam {
    raw: RwLock<Vec<RawMessage>>,
    deliverable: RwLock<Vec<DeliverableMessage>>,
}

impl MessageRam {
    pub fn new() -> Self {
        Self::default()
    }

    // --- raw collection ---

    pub async fn raw_snapshot(&self) -> Vec<RawMessage> {
        self.raw.read().await.clone()
    }

    pub async fn raw_len(&self) -> usize {
        self.raw.read().await.len()
    }

    pub async fn contains_raw(&self, uuid: &str) -> bool {
        self.raw.read().await.iter().any(|m| m.uuid == uuid)
    }

    /// Appends unless a message with the same UUID is present.
    pub async fn insert_raw_if_absent(&self, message: RawMessage) -> bool {
        let mut raw = self.raw.write().await;
        if raw.iter().any(|m| m.uuid == message.uuid) {
            return false;
        }
        raw.push(message);
        true
    }

    pub async fn remove_raw(&self, uuid: &str) -> bool {
        let mut raw = self.raw.write().await;
        let before = raw.len();
        raw.retain(|m| m.uuid != uuid);
        raw.len() != before
    }

    // --- deliverable collection ---

    pub async fn deliverable_snapshot(&self) -> Vec<DeliverableMessage> {
        self.deliverable.read().await.clone()
    }

    pub async fn deliverable_len(&self) -> usize {
        self.deliverable.read().await.len()
    }

    pub async fn find_deliverable(&self, uuid: &str) -> Option<DeliverableMessage> {
        self.deliverable
            .read()
            .await
            .iter()
            .find(|m| m.uuid == uuid)
            .cloned()
    }

    /// UUIDs of deliverable messages carrying the given legacy correlation id.
    pub async fn uuids_with_recno(&self, recno: &str) -> Vec<String> {
        self.deliverable
            .read()
            .await
            .iter()
            .filter(|m| m.recno.as_deref() == Some(recno))
            .map(|m| m.uuid.clone())
            .collect()
    }

    pub async fn insert_deliverable_if_absent(&self, message: DeliverableMessage) -> bool {
        let mut list = self.deliverable.write().await;
        if list.iter().any(|m| m.uuid == message.uuid) {
            return false;
        }
        list.push(message);
        true
    }

    pub async fn remove_deliverable(&self, uuid: &str) -> bool {
        let mut list = self.deliverable.write().await;
        let before = list.len();
        list.retain(|m| m.uuid != uuid);
        list.len() != before
    }

    pub async fn clear_deliverable(&self) -> usize {
        let mut list = self.deliverable.write().await;
        let n = list.len();
        list.clear();
        n
    }

    /// Counts one completed delivery and stamps `last_modified`.
    ///
    /// Returns the updated message, or `None` if it is no longer present.
    pub async fn record_delivery(
        &self,
        uuid: &str,
        at: DateTime<Utc>,
    ) -> Option<DeliverableMessage> {
        let mut list = self.deliverable.write().await;
        let message = list.iter_mut().find(|m| m.uuid == uuid)?;
        message.deliveries = message.deliveries.saturating_add(1);
        message.last_modified = Some(at);
        Some(message.clone())
    }

    /// Removes a message from both collections.
    pub async fn remove_everywhere(&self, uuid: &str) -> bool {
        let raw = self.remove_raw(uuid).await;
        let deliverable = self.remove_deliverable(uuid).await;
        raw || deliverable
    }

    /// Empties both collections, returning how many raw messages were dropped.
    pub async fn clear(&self) -> usize {
        let n = {
            let mut raw = self.raw.write().await;
            let n = raw.len();
            raw.clear();
            n
        };
        self.clear_deliverable().await;
        n
    }
}
