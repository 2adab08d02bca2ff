// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Transport
//!
//! The session engine talks to the remote signer through a relay: it
//! subscribes to its own topic and publishes to the peer's topic. A
//! transport owns exactly one underlying connection per opened channel and
//! takes care of payload encryption with the session's shared key.
//!
//! - `envelope` - JSON-RPC messages addressed by topic
//! - `cipher` - AES-256-GCM payload sealing
//! - `websocket` - relay over a WebSocket pub/sub bridge
//! - `memory` - in-process relay hub

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::SessionConfig;

pub mod cipher;
pub mod envelope;
pub mod memory;
pub mod websocket;

pub use envelope::{Envelope, RpcErrorObject, RpcMessage, RpcRequest, RpcResponse};
pub use memory::MemoryRelay;
pub use websocket::WebSocketRelay;

/// Buffer size for outbound and inbound envelope queues.
pub(crate) const CHANNEL_CAPACITY: usize = 64;

/// Opens relay connections for a session.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Open one connection for `config`, subscribed to `topic`.
    ///
    /// Inbound envelopes are delivered on the returned channel until it is
    /// closed or the connection drops.
    async fn open(&self, config: &SessionConfig, topic: &str) -> Result<RelayChannel, TransportError>;
}

/// An open relay connection split into its sending handle and inbound queue.
pub struct RelayChannel {
    pub sender: RelaySender,
    pub inbound: mpsc::Receiver<Envelope>,
}

impl RelayChannel {
    pub fn new(
        outbound: mpsc::Sender<Envelope>,
        inbound: mpsc::Receiver<Envelope>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            sender: RelaySender { outbound, closer },
            inbound,
        }
    }
}

/// Cloneable handle used to publish envelopes and release the connection.
#[derive(Clone)]
pub struct RelaySender {
    outbound: mpsc::Sender<Envelope>,
    closer: CancellationToken,
}

impl RelaySender {
    pub async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.closer.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Release the underlying connection. Idempotent.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("relay connection failed: {0}")]
    Connect(String),

    #[error("relay connection is closed")]
    Closed,

    #[error("relay payload error: {0}")]
    Crypto(String),

    #[error("relay framing error: {0}")]
    Framing(String),
}
