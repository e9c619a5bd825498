// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket server for the Marquee daemon.
//!
//! Accepts one minimal HTTP/1.x request per connection, answers `/ping`
//! directly and persists everything else as a stage-1 record for the
//! request processor.

pub mod pong;
pub mod request;
pub mod response;
pub mod server;

pub use pong::{PongStatus, ping_authorized};
pub use request::{Limits, MAX_LINE_BYTES, ParseError, Request, read_request};
pub use response::Response;
pub use server::{ServerState, bind, handle_connection, serve};
