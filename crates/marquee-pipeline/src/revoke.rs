// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message revocation across stage 3, both RAM collections and the rotator.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use marquee_core::{MarqueeError, Stage, StageStore};

use crate::convert::{raw_to_deliverable, record_to_raw};
use crate::ram::MessageRam;
use crate::rotator::RotationHandle;

/// Removes messages everywhere they live.
///
/// Stage 3 is deleted first: it is authoritative, so a message removed
/// only from RAM would be mirrored back on the next sync.
#[derive(Clone)]
pub struct Revoker {
    store: Arc<dyn StageStore>,
    ram: Arc<MessageRam>,
    rotation: RotationHandle,
}

impl Revoker {
    pub fn new(store: Arc<dyn StageStore>, ram: Arc<MessageRam>, rotation: RotationHandle) -> Self {
        Self {
            store,
            ram,
            rotation,
        }
    }

    /// Revoke one message by UUID. Returns whether anything was removed.
    pub async fn revoke(&self, uuid: &str) -> Result<bool, MarqueeError> {
        let deleted = self.store.delete_by_uuid(Stage::Messages, uuid).await?;
        let removed = self.ram.remove_everywhere(uuid).await;
        self.rotation.request_close(uuid);
        if deleted || removed {
            info!(uuid, "message revoked");
        }
        Ok(deleted || removed)
    }

    /// Revoke every message carrying a legacy correlation id.
    pub async fn revoke_recno(&self, recno: &str) -> Result<usize, MarqueeError> {
        let mut uuids: BTreeSet<String> = self.ram.uuids_with_recno(recno).await.into_iter().collect();
        for record in self.store.find_all(Stage::Messages).await? {
            let matches = record_to_raw(&record)
                .map(|raw| raw_to_deliverable(&raw).recno.as_deref() == Some(recno))
                .unwrap_or(false);
            if matches {
                uuids.insert(record.uuid);
            }
        }

        self.rotation.request_close(recno);
        let mut revoked = 0;
        for uuid in &uuids {
            if self.revoke(uuid).await? {
                revoked += 1;
            }
        }
        info!(recno, revoked, "revoked messages by correlation id");
        Ok(revoked)
    }

    /// Revoke every message.
    pub async fn revoke_all(&self) -> Result<usize, MarqueeError> {
        let deleted = self.store.delete_all(Stage::Messages).await?;
        self.ram.clear().await;
        if let Some(uuid) = self.rotation.currently().or_else(|| self.rotation.loading()) {
            self.rotation.request_close(uuid);
        }
        info!(deleted, "all messages revoked");
        Ok(deleted)
    }
}
