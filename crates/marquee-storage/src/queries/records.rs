// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage record CRUD and housekeeping queries.
//!
//! The three stage tables share one schema, so every function takes the
//! [`Stage`] and interpolates its fixed table name.

use std::str::FromStr;

use marquee_core::{MarqueeError, RecordStatus, Stage, StageRecord};
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

const COLUMNS: &str =
    "id, uuid, payload, metadata, status, received_at, processed_at, modified_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StageRecord> {
    let status: String = row.get(4)?;
    let status = RecordStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StageRecord {
        id: row.get(0)?,
        uuid: row.get(1)?,
        payload: row.get(2)?,
        metadata: row.get(3)?,
        status,
        received_at: row.get(5)?,
        processed_at: row.get(6)?,
        modified_at: row.get(7)?,
    })
}

/// Run a listing query with an optional `WHERE` clause and positional params.
async fn select(
    db: &Database,
    stage: Stage,
    filter: &'static str,
    status: Option<RecordStatus>,
) -> Result<Vec<StageRecord>, MarqueeError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM {} {filter} ORDER BY received_at ASC, id ASC",
        stage.table()
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = match status {
                Some(status) => stmt.query_map(params![status.to_string()], row_to_record)?,
                None => stmt.query_map([], row_to_record)?,
            };
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_all(db: &Database, stage: Stage) -> Result<Vec<StageRecord>, MarqueeError> {
    select(db, stage, "", None).await
}

pub async fn find_by_status(
    db: &Database,
    stage: Stage,
    status: RecordStatus,
) -> Result<Vec<StageRecord>, MarqueeError> {
    select(db, stage, "WHERE status = ?1", Some(status)).await
}

pub async fn find_unprocessed(
    db: &Database,
    stage: Stage,
) -> Result<Vec<StageRecord>, MarqueeError> {
    select(db, stage, "WHERE processed_at IS NULL", None).await
}

pub async fn find_processed(
    db: &Database,
    stage: Stage,
) -> Result<Vec<StageRecord>, MarqueeError> {
    select(db, stage, "WHERE processed_at IS NOT NULL", None).await
}

pub async fn find_by_uuid(
    db: &Database,
    stage: Stage,
    uuid: &str,
) -> Result<Option<StageRecord>, MarqueeError> {
    let sql = format!("SELECT {COLUMNS} FROM {} WHERE uuid = ?1", stage.table());
    let uuid = uuid.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(&sql, params![uuid], row_to_record)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database, stage: Stage) -> Result<u64, MarqueeError> {
    let sql = format!("SELECT COUNT(*) FROM {}", stage.table());
    db.connection()
        .call(move |conn| {
            let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

fn insert_sql(stage: Stage, verb: &str) -> String {
    format!(
        "{verb} INTO {} (uuid, payload, metadata, status, received_at, processed_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        stage.table()
    )
}

/// Insert a record. A duplicate UUID violates the unique constraint and fails.
pub async fn insert(db: &Database, stage: Stage, record: &StageRecord) -> Result<i64, MarqueeError> {
    let sql = insert_sql(stage, "INSERT");
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &sql,
                params![
                    r.uuid,
                    r.payload,
                    r.metadata,
                    r.status.to_string(),
                    r.received_at,
                    r.processed_at,
                    r.modified_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert unless the UUID already exists. `None` means the row was already there.
pub async fn insert_if_absent(
    db: &Database,
    stage: Stage,
    record: &StageRecord,
) -> Result<Option<i64>, MarqueeError> {
    let sql = insert_sql(stage, "INSERT OR IGNORE");
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &sql,
                params![
                    r.uuid,
                    r.payload,
                    r.metadata,
                    r.status.to_string(),
                    r.received_at,
                    r.processed_at,
                    r.modified_at,
                ],
            )?;
            Ok((changed > 0).then(|| conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome of an update attempt, decided inside the connection thread.
enum UpdateOutcome {
    Updated,
    Missing,
    Rejected(RecordStatus),
}

/// Overwrite the mutable columns of the record with the same UUID.
///
/// The status check and write happen in one transaction. A status
/// regression fails with [`MarqueeError::InvalidTransition`]; a `None`
/// `processed_at` never clears a stored one.
pub async fn update(db: &Database, stage: Stage, record: &StageRecord) -> Result<(), MarqueeError> {
    let table = stage.table();
    let r = record.clone();
    let next = record.status;
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    &format!("SELECT status FROM {table} WHERE uuid = ?1"),
                    params![r.uuid],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(UpdateOutcome::Missing);
            };
            let current = RecordStatus::from_str(&current).unwrap_or(RecordStatus::Unknown);
            if !current.can_transition_to(next) {
                return Ok(UpdateOutcome::Rejected(current));
            }
            tx.execute(
                &format!(
                    "UPDATE {table} SET payload = ?2, metadata = ?3, status = ?4,
                     processed_at = COALESCE(processed_at, ?5), modified_at = ?6
                     WHERE uuid = ?1"
                ),
                params![
                    r.uuid,
                    r.payload,
                    r.metadata,
                    next.to_string(),
                    r.processed_at,
                    r.modified_at,
                ],
            )?;
            tx.commit()?;
            Ok(UpdateOutcome::Updated)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        UpdateOutcome::Updated => Ok(()),
        UpdateOutcome::Missing => Err(MarqueeError::Storage {
            source: format!("no {stage} record with uuid {}", record.uuid).into(),
        }),
        UpdateOutcome::Rejected(current) => Err(MarqueeError::InvalidTransition {
            uuid: record.uuid.clone(),
            from: current.to_string(),
            to: next.to_string(),
        }),
    }
}

/// Set status and `processed_at` once. Returns `false` if the record is
/// missing or already processed.
pub async fn mark_processed(
    db: &Database,
    stage: Stage,
    uuid: &str,
    status: RecordStatus,
    at: &str,
) -> Result<bool, MarqueeError> {
    let sql = format!(
        "UPDATE {} SET status = ?2, processed_at = ?3, modified_at = ?3
         WHERE uuid = ?1 AND processed_at IS NULL",
        stage.table()
    );
    let uuid = uuid.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params![uuid, status.to_string(), at])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

async fn delete_where(
    db: &Database,
    stage: Stage,
    filter: &'static str,
    args: Vec<String>,
) -> Result<usize, MarqueeError> {
    let sql = format!("DELETE FROM {} WHERE {filter}", stage.table());
    db.connection()
        .call(move |conn| conn.execute(&sql, rusqlite::params_from_iter(args.iter())))
        .await
        .map_err(map_tr_err)
}

pub async fn delete_by_uuid(db: &Database, stage: Stage, uuid: &str) -> Result<bool, MarqueeError> {
    let n = delete_where(db, stage, "uuid = ?1", vec![uuid.to_string()]).await?;
    Ok(n > 0)
}

pub async fn delete_by_status_older_than(
    db: &Database,
    stage: Stage,
    status: RecordStatus,
    cutoff: &str,
) -> Result<usize, MarqueeError> {
    delete_where(
        db,
        stage,
        "status = ?1 AND received_at < ?2",
        vec![status.to_string(), cutoff.to_string()],
    )
    .await
}

pub async fn delete_processed_older_than(
    db: &Database,
    stage: Stage,
    cutoff: &str,
) -> Result<usize, MarqueeError> {
    delete_where(
        db,
        stage,
        "processed_at IS NOT NULL AND received_at < ?1",
        vec![cutoff.to_string()],
    )
    .await
}

pub async fn delete_older_than(
    db: &Database,
    stage: Stage,
    cutoff: &str,
) -> Result<usize, MarqueeError> {
    delete_where(db, stage, "received_at < ?1", vec![cutoff.to_string()]).await
}

pub async fn delete_all(db: &Database, stage: Stage) -> Result<usize, MarqueeError> {
    delete_where(db, stage, "1 = 1", Vec::new()).await
}
