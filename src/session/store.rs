// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted session record backed by redb.
//!
//! ## Table Layout
//!
//! - `sessions`: session_id → serialized StoredSession
//!
//! The table holds at most one record. Creating a session while a record
//! exists fails, so a second session can never be persisted alongside the
//! first, even across restarts.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::types::{PeerInfo, SessionConfig};

const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session {0} is already persisted")]
    Exists(String),
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// What survives a restart: connection parameters plus the approved peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub config: SessionConfig,
    /// Our own topic on the relay.
    pub client_id: String,
    /// Request id of the handshake, matched against the approval response.
    pub handshake_id: u64,
    pub peer: Option<PeerInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(config: SessionConfig, client_id: String, handshake_id: u64) -> Self {
        let now = Utc::now();
        Self {
            config,
            client_id,
            handshake_id,
            peer: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }
}

pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> SessionStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn list(&self) -> SessionStoreResult<Vec<StoredSession>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        let mut sessions = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            sessions.push(serde_json::from_slice(value.value())?);
        }
        Ok(sessions)
    }

    /// Persist a new session, refusing if any session is already stored.
    pub fn insert_new(&self, session: &StoredSession) -> SessionStoreResult<()> {
        let json = serde_json::to_vec(session)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let existing = match table.iter()?.next() {
                Some(entry) => Some(entry?.0.value().to_string()),
                None => None,
            };
            if let Some(existing) = existing {
                drop(table);
                write_txn.abort()?;
                return Err(SessionStoreError::Exists(existing));
            }
            table.insert(session.session_id(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert or replace the record for `session`.
    pub fn upsert(&self, session: &StoredSession) -> SessionStoreResult<()> {
        let json = serde_json::to_vec(session)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            table.insert(session.session_id(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub fn remove(&self, session_id: &str) -> SessionStoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let removed = table.remove(session_id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
