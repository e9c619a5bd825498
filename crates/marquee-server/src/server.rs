// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP accept loop and per-connection worker.
//!
//! Each accepted connection gets its own task that owns the socket until it
//! answers exactly one request and closes it. A semaphore bounds the number
//! of live connection tasks; the accept loop waits for a permit before it
//! accepts the next connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use marquee_config::model::ServerConfig;
use marquee_core::time::now_ts;
use marquee_core::{MarqueeError, RequestEnvelope, Stage, StageRecord, StageStore, TelemetrySnapshot};
use marquee_pipeline::DeliveryQueue;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pong::{PongStatus, ping_authorized};
use crate::request::{Limits, ParseError, Request, read_request};
use crate::response::Response;

/// Everything a connection worker needs, cheap to clone per connection.
#[derive(Clone)]
pub struct ServerState {
    config: Arc<ServerConfig>,
    limits: Limits,
    store: Arc<dyn StageStore>,
    queue: Arc<DeliveryQueue>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    started: Instant,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn StageStore>,
        queue: Arc<DeliveryQueue>,
        telemetry: watch::Receiver<TelemetrySnapshot>,
    ) -> Self {
        Self {
            limits: Limits::from_config(&config),
            config: Arc::new(config),
            store,
            queue,
            telemetry,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current extended status.
    pub async fn pong_status(&self) -> Result<PongStatus, MarqueeError> {
        let records = self.store.count(Stage::ReceivedRequests).await?;
        let queue_len = self.queue.len().await;
        let telemetry = self.telemetry.borrow().clone();
        Ok(PongStatus::new(
            records,
            queue_len,
            self.started.elapsed().as_secs(),
            &telemetry,
        ))
    }

    async fn ping(&self, request: &Request) -> Response {
        if !ping_authorized(&request.path, self.config.ping_password.as_deref()) {
            return Response::pong();
        }
        let status = match self.pong_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "failed to collect ping status");
                return Response::unavailable();
            }
        };
        match serde_json::to_vec(&status) {
            Ok(body) => Response::json(body),
            Err(e) => {
                warn!(error = %e, "failed to serialize ping status");
                Response::unavailable()
            }
        }
    }

    /// Persist `request` as a new stage-1 record.
    pub async fn persist(
        &self,
        request: &Request,
        peer: Option<SocketAddr>,
    ) -> Result<String, MarqueeError> {
        let envelope = RequestEnvelope {
            method: request.method.clone(),
            path: request.path.clone(),
            protocol: request.protocol.clone(),
            user_agent: request.user_agent.clone(),
            content_type: request.content_type.clone(),
            content_length: request.content_length,
            peer: peer.map(|p| p.to_string()),
        };
        let metadata = serde_json::to_string(&envelope)
            .map_err(|e| MarqueeError::Internal(format!("request envelope: {e}")))?;
        let body = request
            .body_text()
            .ok_or_else(|| MarqueeError::protocol("request body is not valid UTF-8"))?;
        let uuid = uuid::Uuid::new_v4().to_string();
        let record = StageRecord::new(uuid.clone(), body, Some(metadata), now_ts());
        self.store.insert(Stage::ReceivedRequests, &record).await?;
        Ok(uuid)
    }

    async fn respond(&self, request: Request, peer: Option<SocketAddr>) -> Response {
        if request.is_ping() {
            return self.ping(&request).await;
        }
        match self.persist(&request, peer).await {
            Ok(uuid) => {
                debug!(uuid = %uuid, path = %request.path, "request persisted");
                Response::echo(&request.body)
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "failed to persist request");
                Response::unavailable()
            }
        }
    }
}

/// Serve a single request on `stream`, then close it.
///
/// Read timeouts and early closes drop the connection without a reply.
pub async fn handle_connection<S>(
    stream: S,
    peer: Option<SocketAddr>,
    state: &ServerState,
) -> Result<(), MarqueeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let timeout = state.config.read_timeout();
    let parsed = match tokio::time::timeout(timeout, read_request(&mut reader, &state.limits)).await
    {
        Ok(parsed) => parsed,
        Err(_) => return Err(MarqueeError::Timeout { duration: timeout }),
    };

    let response = match parsed {
        Ok(request) => state.respond(request, peer).await,
        Err(ParseError::Closed) => return Err(MarqueeError::protocol("connection closed early")),
        Err(ParseError::Io(e)) => return Err(e.into()),
        Err(ParseError::TooLarge { len, max }) => {
            debug!(len, max, "request body too large");
            Response::payload_too_large()
        }
        Err(ParseError::Malformed(reason)) => {
            debug!(reason = %reason, "malformed request");
            Response::bad_request(&reason)
        }
    };

    writer.write_all(&response.to_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Bind the configured listening socket.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, MarqueeError> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .map_err(|e| {
            MarqueeError::Config(format!(
                "failed to bind {}:{}: {e}",
                config.bind_address, config.port
            ))
        })?;
    Ok(listener)
}

/// Accept connections until `cancel` fires.
///
/// Connection tasks already running finish their request on their own.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    cancel: CancellationToken,
) -> Result<(), MarqueeError> {
    let permits = Arc::new(Semaphore::new(state.config.max_connections.max(1)));
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "socket server listening");
    }

    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => permit
                .map_err(|_| MarqueeError::Internal("connection semaphore closed".into()))?,
        };

        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let state = state.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, Some(peer), &state).await {
                debug!(peer = %peer, error = %e, "connection dropped");
            }
        });
    }

    info!("socket server stopped accepting connections");
    Ok(())
}
