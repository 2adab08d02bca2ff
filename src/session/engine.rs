// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle.
//!
//! ```text
//! Absent --create_session()--> Connecting --approved--> Active
//! Connecting | Active --closed / disconnect()--> Closed --> Absent
//! ```
//!
//! The engine owns at most one live session and exactly one relay
//! connection for it. A background reader task consumes inbound envelopes:
//! the handshake response moves the session to `Active`, other responses go
//! to the [`RequestDispatcher`], and `wc_sessionUpdate` requests from the
//! peer update or close the session. Closing is idempotent and always fails
//! pending calls, releases the connection and removes the persisted record.
//!
//! State changes are published on a watch channel. [`SessionEngine::subscribe_updates`]
//! replays the current state and then yields changes; a newer subscription
//! ends the previous one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use futures::Stream;
use ring::rand::SystemRandom;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch, Mutex};
use url::Url;

use super::dispatcher::{time_based_id, RequestDispatcher};
use super::store::{SessionStore, StoredSession};
use super::types::{PeerInfo, PeerMeta, SessionConfig, SessionInfo, SessionParams, SessionState};
use super::SessionError;
use crate::chain::MethodCaller;
use crate::relay::{Envelope, RelaySender, RelayTransport, RpcMessage, RpcRequest, RpcResponse};

const SESSION_REQUEST: &str = "wc_sessionRequest";
const SESSION_UPDATE: &str = "wc_sessionUpdate";

/// Static inputs of the engine, usually from [`crate::config::AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub relay_endpoint: Url,
    pub client_meta: PeerMeta,
    /// Chain requested in the handshake; the peer decides when unset.
    pub chain_id: Option<u64>,
    pub call_timeout: Duration,
}

struct LiveSession {
    session_id: String,
    handshake_id: u64,
    record: StdMutex<StoredSession>,
    state: StdMutex<SessionState>,
    sender: RelaySender,
    dispatcher: RequestDispatcher,
    closed: AtomicBool,
}

impl LiveSession {
    fn new(record: StoredSession, sender: RelaySender, call_timeout: Duration) -> Self {
        let first_id = time_based_id().max(record.handshake_id.saturating_add(1));
        let dispatcher = RequestDispatcher::new(sender.clone(), first_id, call_timeout);
        let state = match &record.peer {
            Some(peer) => {
                dispatcher.set_peer(peer.peer_id.clone());
                SessionState::Active(peer.clone())
            }
            None => SessionState::Connecting,
        };

        Self {
            session_id: record.session_id().to_string(),
            handshake_id: record.handshake_id,
            record: StdMutex::new(record),
            state: StdMutex::new(state),
            sender,
            dispatcher,
            closed: AtomicBool::new(false),
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo::from_state(&self.session_id, &self.state())
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self) -> MutexGuard<'_, StoredSession> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct Shared {
    store: SessionStore,
    transport: Arc<dyn RelayTransport>,
    settings: EngineSettings,
    rng: SystemRandom,
    slot: Mutex<Option<Arc<LiveSession>>>,
    updates: watch::Sender<SessionInfo>,
    subscribers: watch::Sender<u64>,
}

impl Shared {
    fn publish(&self, info: SessionInfo) {
        tracing::debug!(status = ?info.status, session_id = ?info.session_id, "Session update");
        self.updates.send_replace(info);
    }

    fn persist(&self, record: &StoredSession) {
        if let Err(e) = self.store.upsert(record) {
            tracing::error!(session_id = %record.session_id(), error = %e, "Failed to persist session");
        }
    }

    /// Mark `live` active with `peer`, then persist and publish it.
    ///
    /// Runs under the state lock, like [`Shared::teardown`], so a closed
    /// session is never re-activated or re-persisted. Returns `false` once
    /// the session is closed.
    fn activate(&self, live: &LiveSession, peer: PeerInfo) -> bool {
        let mut state = live.state();
        if live.is_closed() {
            return false;
        }

        live.dispatcher.set_peer(peer.peer_id.clone());
        *state = SessionState::Active(peer.clone());
        let record = {
            let mut record = live.record();
            record.peer = Some(peer);
            record.updated_at = Utc::now();
            record.clone()
        };
        self.persist(&record);
        self.publish(SessionInfo::from_state(&live.session_id, &state));
        true
    }

    /// Close `live` once. Later calls return `false` and do nothing.
    fn teardown(&self, live: &LiveSession, reason: &str) -> bool {
        {
            let mut state = live.state();
            if live.closed.swap(true, Ordering::SeqCst) {
                return false;
            }
            *state = SessionState::Closed;
            if let Err(e) = self.store.remove(&live.session_id) {
                tracing::error!(session_id = %live.session_id, error = %e, "Failed to remove session record");
            }
            self.publish(SessionInfo::from_state(&live.session_id, &state));
        }

        let failed = live.dispatcher.close();
        live.sender.close();
        tracing::info!(
            session_id = %live.session_id,
            reason,
            failed_requests = failed,
            "Session closed"
        );
        true
    }

    /// Close `live` and, if it still occupies the slot, free the slot.
    async fn end_session(&self, live: &Arc<LiveSession>, reason: &str) {
        self.teardown(live, reason);

        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, live)) {
            *slot = None;
            self.publish(SessionInfo::absent());
        }
    }

    async fn handle_handshake(&self, live: &Arc<LiveSession>, response: RpcResponse) {
        let params = match response.into_result() {
            Ok(result) => serde_json::from_value::<SessionParams>(result)
                .map_err(|e| SessionError::Protocol(format!("malformed approval: {e}"))),
            Err(error) => Err(SessionError::RemoteCall {
                code: error.code,
                message: error.message,
            }),
        };

        match params {
            Ok(params) if params.approved => match PeerInfo::from_approval(&params) {
                Ok(peer) => {
                    tracing::info!(
                        session_id = %live.session_id,
                        peer = ?peer.name,
                        accounts = peer.accounts.len(),
                        chain_id = ?peer.chain_id,
                        "Session approved"
                    );
                    if !self.activate(live, peer) {
                        tracing::debug!(session_id = %live.session_id, "Approval after close ignored");
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %live.session_id, error = %e, "Unusable approval");
                    self.end_session(live, "unusable approval").await;
                }
            },
            Ok(_) => self.end_session(live, "rejected by peer").await,
            Err(e) => {
                tracing::warn!(session_id = %live.session_id, error = %e, "Handshake failed");
                self.end_session(live, "handshake failed").await;
            }
        }
    }

    async fn handle_request(&self, live: &Arc<LiveSession>, request: RpcRequest) {
        if request.method != SESSION_UPDATE {
            tracing::debug!(method = %request.method, "Ignoring request from peer");
            return;
        }

        let update = request
            .params
            .get(0)
            .cloned()
            .map(serde_json::from_value::<SessionParams>);
        match update {
            Some(Ok(params)) if !params.approved => {
                self.end_session(live, "closed by peer").await;
            }
            Some(Ok(params)) => {
                let updated = {
                    let mut state = live.state();
                    match &mut *state {
                        SessionState::Active(peer) => {
                            peer.apply_update(&params);
                            Some(peer.clone())
                        }
                        _ => None,
                    }
                };
                if let Some(peer) = updated {
                    self.activate(live, peer);
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Malformed session update from peer");
            }
            None => tracing::warn!("Session update without parameters"),
        }
    }
}

/// Owner of the single relayed session. Clones share the same session.
#[derive(Clone)]
pub struct SessionEngine {
    shared: Arc<Shared>,
}

impl SessionEngine {
    pub fn new(
        store: SessionStore,
        transport: Arc<dyn RelayTransport>,
        settings: EngineSettings,
    ) -> Self {
        let (updates, _) = watch::channel(SessionInfo::absent());
        let (subscribers, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                store,
                transport,
                settings,
                rng: SystemRandom::new(),
                slot: Mutex::new(None),
                updates,
                subscribers,
            }),
        }
    }

    /// Reconnect the persisted session, if any. Call once at startup.
    pub async fn restore(&self) -> Result<Option<SessionInfo>, SessionError> {
        let mut slot = self.shared.slot.lock().await;
        if let Some(live) = slot.as_ref().filter(|live| !live.is_closed()) {
            return Ok(Some(live.info()));
        }

        let Some(record) = self.shared.store.list()?.into_iter().next() else {
            return Ok(None);
        };

        let channel = self
            .shared
            .transport
            .open(&record.config, &record.client_id)
            .await?;

        let live = Arc::new(LiveSession::new(
            record,
            channel.sender,
            self.shared.settings.call_timeout,
        ));
        self.spawn_reader(live.clone(), channel.inbound);
        *slot = Some(live.clone());

        let info = live.info();
        tracing::info!(session_id = %live.session_id, status = ?info.status, "Session restored");
        self.shared.publish(info.clone());
        Ok(Some(info))
    }

    /// Start a new session and return the URI the external signer opens.
    ///
    /// Fails with [`SessionError::Exists`] while another session is live or
    /// persisted. Concurrent calls are serialized; only the first succeeds.
    pub async fn create_session(&self) -> Result<String, SessionError> {
        let shared = &self.shared;
        let mut slot = shared.slot.lock().await;
        match slot.as_ref() {
            Some(live) if !live.is_closed() => return Err(SessionError::Exists),
            Some(stale) => {
                shared.store.remove(&stale.session_id)?;
            }
            None => {}
        }

        let config = SessionConfig::generate(shared.settings.relay_endpoint.clone(), &shared.rng)?;
        let client_id = uuid::Uuid::new_v4().to_string();
        let record = StoredSession::new(config.clone(), client_id.clone(), time_based_id());
        shared.store.insert_new(&record)?;

        let channel = match shared.transport.open(&config, &client_id).await {
            Ok(channel) => channel,
            Err(e) => {
                shared.store.remove(&config.session_id)?;
                return Err(e.into());
            }
        };

        let live = Arc::new(LiveSession::new(
            record,
            channel.sender,
            shared.settings.call_timeout,
        ));

        let handshake = RpcRequest::new(
            live.handshake_id,
            SESSION_REQUEST,
            json!([{
                "peerId": client_id,
                "peerMeta": shared.settings.client_meta,
                "chainId": shared.settings.chain_id,
            }]),
        );
        if let Err(e) = live
            .sender
            .send(Envelope::new(config.session_id.clone(), handshake))
            .await
        {
            live.sender.close();
            shared.store.remove(&config.session_id)?;
            return Err(e.into());
        }

        self.spawn_reader(live.clone(), channel.inbound);
        *slot = Some(live.clone());
        shared.publish(live.info());

        tracing::info!(session_id = %config.session_id, "Session created, awaiting approval");
        Ok(config.to_uri())
    }

    /// Close the current session and tell the peer.
    ///
    /// Returns `false` when there was nothing to close.
    pub async fn disconnect(&self) -> Result<bool, SessionError> {
        let shared = &self.shared;
        let mut slot = shared.slot.lock().await;

        let Some(live) = slot.take() else {
            let mut removed = false;
            for stale in shared.store.list()? {
                removed |= shared.store.remove(stale.session_id())?;
            }
            return Ok(removed);
        };

        if let Some(topic) = live.dispatcher.peer_topic().filter(|_| !live.is_closed()) {
            let update = RpcRequest::new(
                live.dispatcher.next_id(),
                SESSION_UPDATE,
                json!([{ "approved": false, "chainId": null, "accounts": null }]),
            );
            if let Err(e) = live.sender.send(Envelope::new(topic, update)).await {
                tracing::warn!(session_id = %live.session_id, error = %e, "Could not notify peer of disconnect");
            }
        }

        let closed = shared.teardown(&live, "disconnected locally");
        shared.publish(SessionInfo::absent());
        Ok(closed)
    }

    /// Snapshot of the current session, `None` when there is none.
    pub fn active_session(&self) -> Option<SessionInfo> {
        let info = self.shared.updates.borrow().clone();
        info.session_id.is_some().then_some(info)
    }

    /// Current state followed by every change.
    ///
    /// Only one subscription is served at a time: subscribing again ends
    /// the previous [`SessionUpdates`].
    pub fn subscribe_updates(&self) -> SessionUpdates {
        let mut generation = 0;
        self.shared.subscribers.send_modify(|current| {
            *current += 1;
            generation = *current;
        });

        let mut updates = self.shared.updates.subscribe();
        updates.mark_changed();
        SessionUpdates {
            updates,
            subscribers: self.shared.subscribers.subscribe(),
            generation,
        }
    }

    /// Send a JSON-RPC call to the approved peer.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let live = {
            let slot = self.shared.slot.lock().await;
            slot.as_ref()
                .filter(|live| !live.is_closed())
                .cloned()
                .ok_or(SessionError::NotActive)?
        };
        live.dispatcher.call(method, params).await
    }

    /// First account approved by the peer.
    pub fn primary_account(&self) -> Option<Address> {
        self.shared
            .updates
            .borrow()
            .peer
            .as_ref()
            .and_then(PeerInfo::primary_account)
    }

    fn spawn_reader(&self, live: Arc<LiveSession>, mut inbound: mpsc::Receiver<Envelope>) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                if live.is_closed() {
                    break;
                }
                match envelope.message {
                    RpcMessage::Response(response) if response.id == live.handshake_id => {
                        shared.handle_handshake(&live, response).await;
                    }
                    RpcMessage::Response(response) => {
                        live.dispatcher.resolve(response);
                    }
                    RpcMessage::Request(request) => shared.handle_request(&live, request).await,
                }
                if live.is_closed() {
                    break;
                }
            }
            shared.end_session(&live, "relay connection ended").await;
        });
    }
}

#[async_trait]
impl MethodCaller for SessionEngine {
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.call(method, params).await
    }

    fn sender_account(&self) -> Option<Address> {
        self.primary_account()
    }
}

/// Subscription handle returned by [`SessionEngine::subscribe_updates`].
pub struct SessionUpdates {
    updates: watch::Receiver<SessionInfo>,
    subscribers: watch::Receiver<u64>,
    generation: u64,
}

impl SessionUpdates {
    /// Next state, or `None` once superseded or the engine is gone.
    pub async fn next(&mut self) -> Option<SessionInfo> {
        let generation = self.generation;
        tokio::select! {
            biased;
            _ = self.subscribers.wait_for(|current| *current != generation) => None,
            changed = self.updates.changed() => match changed {
                Ok(()) => Some(self.updates.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SessionInfo> + Send {
        futures::stream::unfold(self, |mut updates| async move {
            updates.next().await.map(|info| (info, updates))
        })
    }
}
