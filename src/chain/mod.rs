// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Access
//!
//! Contract reads and writes travel through the remote signer: reads as
//! `eth_call`, writes as `eth_sendTransaction` signed by the peer's account.
//!
//! - `contracts` - Safe and recovery module ABI
//! - `client` - typed calls over a [`MethodCaller`]

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::Value;

use crate::session::SessionError;

pub mod client;
pub mod contracts;

#[cfg(test)]
pub(crate) mod scripted;

pub use client::{ChainClient, ChainError};

/// Sends JSON-RPC calls to whoever holds the signing account.
#[async_trait]
pub trait MethodCaller: Send + Sync {
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, SessionError>;

    /// Account used as `from` for transactions, when one is connected.
    fn sender_account(&self) -> Option<Address>;
}
