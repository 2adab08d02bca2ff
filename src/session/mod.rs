// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relayed Session
//!
//! A single pairing with an external signer, reached through a relay:
//!
//! - `types` - session configuration, peer data, state snapshots
//! - `store` - persisted session record (redb)
//! - `dispatcher` - JSON-RPC request/response correlation
//! - `engine` - session lifecycle, update subscription, remote calls

pub mod dispatcher;
pub mod engine;
pub mod store;
pub mod types;

pub use dispatcher::RequestDispatcher;
pub use engine::{EngineSettings, SessionEngine, SessionUpdates};
pub use store::{SessionStore, SessionStoreError, StoredSession};
pub use types::{
    PeerInfo, PeerMeta, SessionConfig, SessionInfo, SessionParams, SessionState, SessionStatus,
};

use crate::relay::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a session already exists")]
    Exists,

    #[error("the session was closed")]
    Closed,

    #[error("no active session")]
    NotActive,

    #[error("peer returned error {code}: {message}")]
    RemoteCall { code: i64, message: String },

    #[error("`{method}` got no response within {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error(transparent)]
    Transport(TransportError),

    #[error("session storage failed: {0}")]
    Store(SessionStoreError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("secure random source is unavailable")]
    Entropy,
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => SessionError::Closed,
            other => SessionError::Transport(other),
        }
    }
}

impl From<SessionStoreError> for SessionError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::Exists(_) => SessionError::Exists,
            other => SessionError::Store(other),
        }
    }
}
