// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed contract calls routed through a [`MethodCaller`].

use std::sync::Arc;

use alloy::hex;
use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use serde_json::json;

use super::contracts::{IGnosisSafe, IRecoveryModule};
use super::MethodCaller;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no connected account to send from")]
    NoAccount,

    #[error("unexpected response to {method}: {reason}")]
    Decode { method: String, reason: String },
}

pub struct ChainClient<C: ?Sized> {
    caller: Arc<C>,
}

impl<C: ?Sized> Clone for ChainClient<C> {
    fn clone(&self) -> Self {
        Self {
            caller: Arc::clone(&self.caller),
        }
    }
}

impl<C: MethodCaller + ?Sized> ChainClient<C> {
    pub fn new(caller: Arc<C>) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Arc<C> {
        &self.caller
    }

    pub fn sender(&self) -> Option<Address> {
        self.caller.sender_account()
    }

    /// Read-only contract call via `eth_call` at the latest block.
    pub async fn read<T: SolCall>(&self, to: Address, call: &T) -> Result<T::Return, ChainError> {
        let params = json!([
            {
                "to": to.to_checksum(None),
                "data": hex::encode_prefixed(call.abi_encode()),
            },
            "latest"
        ]);
        let result = self.caller.call_method("eth_call", params).await?;

        let decode_error = |reason: String| ChainError::Decode {
            method: T::SIGNATURE.to_string(),
            reason,
        };
        let raw = result
            .as_str()
            .ok_or_else(|| decode_error(format!("expected hex string, got {result}")))?;
        let bytes = hex::decode(raw).map_err(|e| decode_error(e.to_string()))?;
        T::abi_decode_returns(&bytes).map_err(|e| decode_error(e.to_string()))
    }

    /// Submit a contract call with `eth_sendTransaction`; returns the tx hash.
    pub async fn send<T: SolCall>(&self, to: Address, call: &T) -> Result<B256, ChainError> {
        let from = self.sender().ok_or(ChainError::NoAccount)?;
        let params = json!([{
            "from": from.to_checksum(None),
            "to": to.to_checksum(None),
            "data": hex::encode_prefixed(call.abi_encode()),
            "value": "0x0",
        }]);

        tracing::info!(%from, %to, method = T::SIGNATURE, "Submitting transaction through peer");
        let result = self
            .caller
            .call_method("eth_sendTransaction", params)
            .await?;

        result
            .as_str()
            .and_then(|hash| hash.parse::<B256>().ok())
            .ok_or_else(|| ChainError::Decode {
                method: T::SIGNATURE.to_string(),
                reason: format!("expected transaction hash, got {result}"),
            })
    }

    pub async fn modules(&self, safe: Address) -> Result<Vec<Address>, ChainError> {
        self.read(safe, &IGnosisSafe::getModulesCall {}).await
    }

    pub async fn recoverer(&self, module: Address) -> Result<Address, ChainError> {
        self.read(module, &IRecoveryModule::recovererCall {}).await
    }

    pub async fn nonce(&self, module: Address) -> Result<U256, ChainError> {
        self.read(module, &IRecoveryModule::nonceCall {}).await
    }

    pub async fn delay(&self, module: Address) -> Result<U256, ChainError> {
        self.read(module, &IRecoveryModule::delayCall {}).await
    }
}
