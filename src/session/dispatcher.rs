// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Correlates outgoing JSON-RPC requests with their responses.
//!
//! Every call gets a fresh id and a completion slot. The session's reader
//! hands responses to [`RequestDispatcher::resolve`]; a call that sees no
//! response within its timeout fails with [`SessionError::Timeout`]. Closing
//! the dispatcher fails everything still pending with
//! [`SessionError::Closed`], and late responses are ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::oneshot;

use super::SessionError;
use crate::relay::{Envelope, RelaySender, RpcRequest, RpcResponse};

/// Clock-derived starting point for request ids, so ids from one
/// process run do not collide with those of an earlier run.
pub fn time_based_id() -> u64 {
    Utc::now().timestamp_micros().unsigned_abs()
}

struct PendingCall {
    method: String,
    completion: oneshot::Sender<Result<Value, SessionError>>,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    calls: HashMap<u64, PendingCall>,
}

/// Removes a call's slot once its caller stops waiting, however that happens.
struct PendingGuard<'a> {
    dispatcher: &'a RequestDispatcher,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.dispatcher.table().calls.remove(&self.id).is_some() {
            tracing::debug!(id = self.id, "Dropped pending request");
        }
    }
}

pub struct RequestDispatcher {
    outbound: RelaySender,
    /// Relay topic of the approved peer; unset until approval.
    peer_topic: Mutex<Option<String>>,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(outbound: RelaySender, first_id: u64, default_timeout: Duration) -> Self {
        Self {
            outbound,
            peer_topic: Mutex::new(None),
            pending: Mutex::new(PendingTable::default()),
            next_id: AtomicU64::new(first_id),
            default_timeout,
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn set_peer(&self, topic: impl Into<String>) {
        *self.peer_topic.lock().unwrap_or_else(PoisonError::into_inner) = Some(topic.into());
    }

    pub fn peer_topic(&self) -> Option<String> {
        self.peer_topic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.call_with_timeout(method, params, self.default_timeout)
            .await
    }

    /// Send a request to the peer and wait for its response.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, SessionError> {
        let topic = self.peer_topic().ok_or(SessionError::NotActive)?;
        let id = self.next_id();
        let (completion, result) = oneshot::channel();

        {
            let mut table = self.table();
            if table.closed {
                return Err(SessionError::Closed);
            }
            table.calls.insert(
                id,
                PendingCall {
                    method: method.to_string(),
                    completion,
                },
            );
        }

        let _pending = PendingGuard { dispatcher: self, id };
        tracing::debug!(id, method, "Dispatching request to peer");

        let request = RpcRequest::new(id, method, params);
        self.outbound.send(Envelope::new(topic, request)).await?;

        match tokio::time::timeout(timeout, result).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                tracing::warn!(id, method, "Request to peer timed out");
                Err(SessionError::Timeout {
                    method: method.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Complete the pending call matching `response.id`.
    ///
    /// Returns `false` for responses nobody is waiting for.
    pub fn resolve(&self, response: RpcResponse) -> bool {
        let id = response.id;
        let Some(call) = self.table().calls.remove(&id) else {
            tracing::debug!(id, "Ignoring response without a pending request");
            return false;
        };

        let outcome = response.into_result().map_err(|error| {
            tracing::info!(
                id,
                method = %call.method,
                code = error.code,
                "Peer rejected request"
            );
            SessionError::RemoteCall {
                code: error.code,
                message: error.message,
            }
        });
        // The caller may have given up already.
        let _ = call.completion.send(outcome);
        true
    }

    /// Fail every pending call with [`SessionError::Closed`] and refuse new
    /// ones. Returns the number of calls failed. Idempotent.
    pub fn close(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.table();
            table.closed = true;
            table.calls.drain().map(|(_, call)| call).collect()
        };

        let failed = drained.len();
        for call in drained {
            let _ = call.completion.send(Err(SessionError::Closed));
        }
        failed
    }

    pub fn pending_count(&self) -> usize {
        self.table().calls.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table().closed
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
