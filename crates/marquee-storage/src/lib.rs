// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the three pipeline stages.
//!
//! One WAL-mode database holds the `received_requests`, `received_messages`
//! and `messages` tables. Every statement runs on the single background
//! thread owned by `tokio-rusqlite`, so writers never contend for locks.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStageStore;
pub use database::Database;
