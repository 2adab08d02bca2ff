// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session configuration, peer data and state snapshots.

use std::fmt;

use alloy::primitives::Address;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use url::Url;

use super::SessionError;

/// Protocol version embedded in connection URIs.
const URI_VERSION: &str = "1";

/// Connection parameters of a session. At most one is persisted at a time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier, also the handshake topic on the relay.
    pub session_id: String,
    pub relay_endpoint: Url,
    /// Hex-encoded 32-byte key shared with the peer through the URI.
    shared_key: String,
}

impl SessionConfig {
    pub fn new(session_id: impl Into<String>, relay_endpoint: Url, shared_key: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            relay_endpoint,
            shared_key: shared_key.into(),
        }
    }

    /// Fresh session id and shared key.
    pub fn generate(relay_endpoint: Url, rng: &SystemRandom) -> Result<Self, SessionError> {
        let mut key = [0u8; 32];
        rng.fill(&mut key).map_err(|_| SessionError::Entropy)?;
        Ok(Self::new(
            uuid::Uuid::new_v4().to_string(),
            relay_endpoint,
            alloy::hex::encode(key),
        ))
    }

    pub fn shared_key(&self) -> &str {
        &self.shared_key
    }

    /// Connection URI handed to the external signer:
    /// `wc:{session_id}@1?bridge={relay}&key={shared_key}`.
    pub fn to_uri(&self) -> String {
        let bridge: String =
            url::form_urlencoded::byte_serialize(self.relay_endpoint.as_str().as_bytes()).collect();
        format!(
            "wc:{}@{URI_VERSION}?bridge={bridge}&key={}",
            self.session_id, self.shared_key
        )
    }

    /// Parse a connection URI produced by [`SessionConfig::to_uri`].
    pub fn from_uri(uri: &str) -> Result<Self, SessionError> {
        let malformed = |what: &str| SessionError::Protocol(format!("malformed session URI: {what}"));

        let rest = uri.strip_prefix("wc:").ok_or_else(|| malformed("missing `wc:` prefix"))?;
        let (topic, rest) = rest.split_once('@').ok_or_else(|| malformed("missing version"))?;
        let (version, query) = rest.split_once('?').ok_or_else(|| malformed("missing query"))?;
        if version != URI_VERSION {
            return Err(malformed("unsupported version"));
        }

        let mut bridge = None;
        let mut key = None;
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "bridge" => bridge = Some(value.into_owned()),
                "key" => key = Some(value.into_owned()),
                _ => {}
            }
        }

        let bridge = bridge.ok_or_else(|| malformed("missing bridge"))?;
        let relay_endpoint = Url::parse(&bridge).map_err(|_| malformed("invalid bridge"))?;
        let key = key.ok_or_else(|| malformed("missing key"))?;

        Ok(Self::new(topic, relay_endpoint, key))
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("session_id", &self.session_id)
            .field("relay_endpoint", &self.relay_endpoint.as_str())
            .field("shared_key", &"<redacted>")
            .finish()
    }
}

/// Metadata a peer announces about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// Session parameters carried by approvals and `wc_sessionUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub approved: bool,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub peer_meta: Option<PeerMeta>,
}

/// The approved remote signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Relay topic the peer listens on.
    pub peer_id: String,
    pub name: Option<String>,
    /// Checksummed account addresses approved for this session.
    pub accounts: Vec<String>,
    pub chain_id: Option<u64>,
}

impl PeerInfo {
    /// Build peer info from an approval. Accounts that are not addresses are dropped.
    pub fn from_approval(params: &SessionParams) -> Result<Self, SessionError> {
        let peer_id = params
            .peer_id
            .clone()
            .ok_or_else(|| SessionError::Protocol("approval without peerId".to_string()))?;
        Ok(Self {
            peer_id,
            name: params.peer_meta.as_ref().map(|meta| meta.name.clone()),
            accounts: normalize_accounts(params.accounts.as_deref().unwrap_or_default()),
            chain_id: params.chain_id,
        })
    }

    /// Apply a `wc_sessionUpdate` that kept the session approved.
    pub fn apply_update(&mut self, params: &SessionParams) {
        if let Some(accounts) = params.accounts.as_deref() {
            self.accounts = normalize_accounts(accounts);
        }
        if params.chain_id.is_some() {
            self.chain_id = params.chain_id;
        }
    }

    /// First approved account; used as sender for write calls.
    pub fn primary_account(&self) -> Option<Address> {
        self.accounts.first().and_then(|a| a.parse().ok())
    }
}

fn normalize_accounts(accounts: &[String]) -> Vec<String> {
    accounts
        .iter()
        .filter_map(|raw| match raw.parse::<Address>() {
            Ok(address) => Some(address.to_checksum(None)),
            Err(_) => {
                tracing::warn!(account = %raw, "Ignoring malformed account from peer");
                None
            }
        })
        .collect()
}

/// Lifecycle of the single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Connecting,
    Active(PeerInfo),
    Closed,
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Absent => SessionStatus::Absent,
            SessionState::Connecting => SessionStatus::Connecting,
            SessionState::Active(_) => SessionStatus::Active,
            SessionState::Closed => SessionStatus::Closed,
        }
    }

    pub fn peer(&self) -> Option<&PeerInfo> {
        match self {
            SessionState::Active(peer) => Some(peer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Absent,
    Connecting,
    Active,
    Closed,
}

/// Snapshot of the session as seen by callers and subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    /// Present only while the session is active.
    pub peer: Option<PeerInfo>,
}

impl SessionInfo {
    pub fn absent() -> Self {
        Self {
            session_id: None,
            status: SessionStatus::Absent,
            peer: None,
        }
    }

    pub fn from_state(session_id: &str, state: &SessionState) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            status: state.status(),
            peer: state.peer().cloned(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// True once the session has been torn down (or never existed).
    pub fn is_closed(&self) -> bool {
        matches!(self.status, SessionStatus::Closed | SessionStatus::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relay() -> Url {
        "https://relay.example.org/bridge?x=1".parse().unwrap()
    }

    #[test]
    fn uri_embeds_relay_and_key() {
        let config = SessionConfig::new("topic-1", relay(), "ab".repeat(32));
        let uri = config.to_uri();
        assert!(uri.starts_with("wc:topic-1@1?bridge=https%3A%2F%2Frelay.example.org"));
        assert!(uri.ends_with(&format!("&key={}", "ab".repeat(32))));
        assert_eq!(SessionConfig::from_uri(&uri).unwrap(), config);
    }

    #[test]
    fn malformed_uris_are_rejected() {
        assert!(SessionConfig::from_uri("topic@1?bridge=x&key=y").is_err());
        assert!(SessionConfig::from_uri("wc:topic@2?bridge=http%3A%2F%2Fa&key=y").is_err());
        assert!(SessionConfig::from_uri("wc:topic@1?key=y").is_err());
    }

    #[test]
    fn generated_configs_are_unique() {
        let rng = SystemRandom::new();
        let a = SessionConfig::generate(relay(), &rng).unwrap();
        let b = SessionConfig::generate(relay(), &rng).unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.shared_key(), b.shared_key());
        assert_eq!(a.shared_key().len(), 64);
    }

    #[test]
    fn debug_redacts_shared_key() {
        let config = SessionConfig::new("topic-1", relay(), "cd".repeat(32));
        assert!(!format!("{config:?}").contains(&"cd".repeat(32)));
    }

    #[test]
    fn approval_builds_peer_info() {
        let params: SessionParams = serde_json::from_value(json!({
            "approved": true,
            "chainId": 4,
            "accounts": ["0x70997970c51812dc3a010c7d01b50e0d17dc79c8", "nonsense"],
            "peerId": "wallet-topic",
            "peerMeta": { "name": "Safe", "icons": [] }
        }))
        .unwrap();

        let peer = PeerInfo::from_approval(&params).unwrap();
        assert_eq!(peer.peer_id, "wallet-topic");
        assert_eq!(peer.name.as_deref(), Some("Safe"));
        assert_eq!(peer.accounts, vec!["0x70997970C51812dc3A010C7d01b50e0d17dc79C8"]);
        assert_eq!(
            peer.primary_account(),
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap())
        );
    }

    #[test]
    fn approval_without_peer_id_is_a_protocol_error() {
        let params = SessionParams {
            approved: true,
            ..Default::default()
        };
        assert!(matches!(
            PeerInfo::from_approval(&params),
            Err(SessionError::Protocol(_))
        ));
    }
}
