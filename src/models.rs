// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation.
//!
//! Addresses travel as 0x-prefixed hex strings (checksummed in responses),
//! 256-bit integers as decimal strings, and locations as geohash strings.
//!
//! ## Model Categories
//!
//! - **Session**: pairing with the remote signer
//! - **Recovery**: mnemonic generation, recovery, execution and setup

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::recovery::{EnableReceipt, ExecutionReceipt, RecoveryMode, RecoveryReceipt};
use crate::session::{PeerInfo, SessionInfo, SessionStatus};

// =============================================================================
// Session Models
// =============================================================================

/// Returned when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateSessionResponse {
    /// Connection URI for the remote signer to open (usually shown as QR code).
    pub uri: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatusView {
    Absent,
    Connecting,
    Active,
    Closed,
}

impl From<SessionStatus> for SessionStatusView {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Absent => SessionStatusView::Absent,
            SessionStatus::Connecting => SessionStatusView::Connecting,
            SessionStatus::Active => SessionStatusView::Active,
            SessionStatus::Closed => SessionStatusView::Closed,
        }
    }
}

/// The approved remote signer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PeerView {
    pub peer_id: String,
    pub name: Option<String>,
    pub accounts: Vec<String>,
    pub chain_id: Option<u64>,
}

impl From<PeerInfo> for PeerView {
    fn from(peer: PeerInfo) -> Self {
        Self {
            peer_id: peer.peer_id,
            name: peer.name,
            accounts: peer.accounts,
            chain_id: peer.chain_id,
        }
    }
}

/// Session snapshot. `peer` is only present while the session is active.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SessionView {
    pub session_id: Option<String>,
    pub status: SessionStatusView,
    pub peer: Option<PeerView>,
}

impl From<SessionInfo> for SessionView {
    fn from(info: SessionInfo) -> Self {
        Self {
            session_id: info.session_id,
            status: info.status.into(),
            peer: info.peer.map(PeerView::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DisconnectResponse {
    /// False when there was no session to close.
    pub disconnected: bool,
}

// =============================================================================
// Recovery Models
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GenerateMnemonicRequest {
    /// Number of owner addresses to preview (defaults to 2).
    #[serde(default)]
    pub owner_count: Option<usize>,
}

/// A fresh recovery phrase. The user must write it down before recovering.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MnemonicResponse {
    pub mnemonic: String,
    /// Owners that recovery with this phrase installs.
    pub owners: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryModeParam {
    /// Trigger and execute at once; requires a module without delay.
    #[default]
    Immediate,
    /// Trigger only; call `/v1/recovery/execute` after the delay.
    Trigger,
}

impl From<RecoveryModeParam> for RecoveryMode {
    fn from(mode: RecoveryModeParam) -> Self {
        match mode {
            RecoveryModeParam::Immediate => RecoveryMode::Immediate,
            RecoveryModeParam::Trigger => RecoveryMode::Trigger,
        }
    }
}

impl From<RecoveryMode> for RecoveryModeParam {
    fn from(mode: RecoveryMode) -> Self {
        match mode {
            RecoveryMode::Immediate => RecoveryModeParam::Immediate,
            RecoveryMode::Trigger => RecoveryModeParam::Trigger,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RecoverRequest {
    /// Safe to recover.
    pub account: String,
    /// The secret geohashes, in any order.
    pub locations: Vec<String>,
    /// Recovery phrase the new owners are derived from.
    pub mnemonic: String,
    #[serde(default)]
    pub mode: RecoveryModeParam,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RecoverResponse {
    pub module: String,
    pub recoverer: String,
    pub new_owners: Vec<String>,
    /// Module nonce the signature was made for.
    pub nonce: String,
    pub mode: RecoveryModeParam,
    pub tx_hash: String,
}

impl From<RecoveryReceipt> for RecoverResponse {
    fn from(receipt: RecoveryReceipt) -> Self {
        Self {
            module: receipt.module.to_checksum(None),
            recoverer: receipt.recoverer.to_checksum(None),
            new_owners: receipt
                .new_owners
                .iter()
                .map(|owner| owner.to_checksum(None))
                .collect(),
            nonce: receipt.nonce.to_string(),
            mode: receipt.mode.into(),
            tx_hash: receipt.tx_hash.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ExecuteRecoveryRequest {
    pub account: String,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ExecuteRecoveryResponse {
    pub module: String,
    pub tx_hash: String,
}

impl From<ExecutionReceipt> for ExecuteRecoveryResponse {
    fn from(receipt: ExecutionReceipt) -> Self {
        Self {
            module: receipt.module.to_checksum(None),
            tx_hash: receipt.tx_hash.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct EnableRecoveryRequest {
    pub locations: Vec<String>,
    /// Seconds between trigger and execution.
    #[serde(default)]
    pub delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct EnableRecoveryResponse {
    pub account: String,
    pub recoverer: String,
    pub delay: u64,
}

impl From<EnableReceipt> for EnableRecoveryResponse {
    fn from(receipt: EnableReceipt) -> Self {
        Self {
            account: receipt.account.to_checksum(None),
            recoverer: receipt.recoverer.to_checksum(None),
            delay: receipt.delay,
        }
    }
}
