// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted chain used by tests in place of a connected wallet.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{address, keccak256, Address, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::contracts::{IGnosisSafe, IRecoveryModule};
use super::MethodCaller;
use crate::session::SessionError;

pub const WALLET_ACCOUNT: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

#[derive(Debug, Clone)]
pub struct ScriptedModule {
    pub address: Address,
    /// `None` makes every read of this module revert.
    pub recoverer: Option<Address>,
    pub nonce: U256,
    pub delay: U256,
}

impl ScriptedModule {
    pub fn new(address: Address, recoverer: Address) -> Self {
        Self {
            address,
            recoverer: Some(recoverer),
            nonce: U256::ZERO,
            delay: U256::ZERO,
        }
    }

    pub fn reverting(address: Address) -> Self {
        Self {
            address,
            recoverer: None,
            nonce: U256::ZERO,
            delay: U256::ZERO,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = U256::from(nonce);
        self
    }

    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delay = U256::from(delay);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentTransaction {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub hash: B256,
}

pub struct ScriptedChain {
    safe: Address,
    modules: Vec<ScriptedModule>,
    account: Option<Address>,
    latency: Duration,
    sent: Mutex<Vec<SentTransaction>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedChain {
    pub fn new(safe: Address, modules: Vec<ScriptedModule>) -> Self {
        Self {
            safe,
            modules,
            account: Some(WALLET_ACCOUNT),
            latency: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn without_account(mut self) -> Self {
        self.account = None;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        lock(&self.sent).clone()
    }

    /// Every method called so far with its params.
    pub fn requests(&self) -> Vec<(String, Value)> {
        lock(&self.requests).clone()
    }

    fn eth_call(&self, params: &Value) -> Result<Value, SessionError> {
        let (to, data) = call_target(params)?;
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| revert("missing selector"))?;

        let encoded = if to == self.safe && selector == IGnosisSafe::getModulesCall::SELECTOR {
            let modules: Vec<Address> = self.modules.iter().map(|m| m.address).collect();
            (modules,).abi_encode_params()
        } else {
            let module = self
                .modules
                .iter()
                .find(|m| m.address == to)
                .ok_or_else(|| revert("no contract"))?;
            let recoverer = module.recoverer.ok_or_else(|| revert("execution reverted"))?;
            if selector == IRecoveryModule::recovererCall::SELECTOR {
                (recoverer,).abi_encode_params()
            } else if selector == IRecoveryModule::nonceCall::SELECTOR {
                (module.nonce,).abi_encode_params()
            } else if selector == IRecoveryModule::delayCall::SELECTOR {
                (module.delay,).abi_encode_params()
            } else {
                return Err(revert("unknown selector"));
            }
        };
        Ok(json!(hex::encode_prefixed(encoded)))
    }

    fn send_transaction(&self, params: &Value) -> Result<Value, SessionError> {
        let tx = &params[0];
        let from = tx["from"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| revert("missing from"))?;
        let (to, data) = call_target(params)?;
        let hash = keccak256(&data);

        lock(&self.sent).push(SentTransaction {
            from,
            to,
            data,
            hash,
        });
        Ok(json!(hex::encode_prefixed(hash)))
    }
}

#[async_trait]
impl MethodCaller for ScriptedChain {
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        lock(&self.requests).push((method.to_string(), params.clone()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match method {
            "eth_call" => self.eth_call(&params),
            "eth_sendTransaction" => self.send_transaction(&params),
            "gs_enableSimpleRecovery" => Ok(json!(true)),
            other => Err(SessionError::RemoteCall {
                code: -32601,
                message: format!("method {other} not found"),
            }),
        }
    }

    fn sender_account(&self) -> Option<Address> {
        self.account
    }
}

fn call_target(params: &Value) -> Result<(Address, Vec<u8>), SessionError> {
    let tx = &params[0];
    let to = tx["to"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| revert("missing to"))?;
    let data = tx["data"]
        .as_str()
        .and_then(|s| hex::decode(s).ok())
        .ok_or_else(|| revert("missing data"))?;
    Ok((to, data))
}

fn revert(message: &str) -> SessionError {
    SessionError::RemoteCall {
        code: -32000,
        message: message.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
