// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end recovery flow.
//!
//! 1. Canonicalize the locations and derive the recoverer key.
//! 2. Derive the new owners from the recovery mnemonic.
//! 3. Find the Safe module whose `recoverer()` is the derived address.
//! 4. For an immediate recovery, require the module delay to be zero.
//! 5. Read the module nonce, sign the recovery payload, submit.
//!
//! Only one recovery call runs at a time. A second call made while one is
//! in flight is rejected with [`RecoveryError::InProgress`]. Each attempt
//! runs on its own task and holds the slot until its last call to the
//! wallet has returned, even if the caller stops waiting.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::payload::recovery_payload_hash;
use crate::chain::contracts::IRecoveryModule;
use crate::chain::{ChainClient, ChainError, MethodCaller};
use crate::geo::{canonicalize, GeoSecretError, LocationSecret};
use crate::keys::{derive_key, KeyError, MnemonicError, RecoveryKeyPair, RecoveryMnemonic, DEFAULT_OWNER_COUNT};

const ENABLE_RECOVERY_METHOD: &str = "gs_enableSimpleRecovery";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Trigger and execute in one call; only valid when the module has no delay.
    #[default]
    Immediate,
    /// Trigger only; execution follows once the module delay has passed.
    Trigger,
}

pub struct RecoveryRequest {
    /// The Safe being recovered.
    pub account: Address,
    pub locations: Vec<LocationSecret>,
    /// Source of the new owners.
    pub mnemonic: RecoveryMnemonic,
    pub mode: RecoveryMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReceipt {
    pub module: Address,
    pub recoverer: Address,
    pub new_owners: Vec<Address>,
    pub nonce: U256,
    pub mode: RecoveryMode,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub module: Address,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnableReceipt {
    pub account: Address,
    pub recoverer: Address,
    pub delay: u64,
    /// Whatever the wallet answered.
    pub result: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("invalid locations: {0}")]
    InvalidInput(#[from] GeoSecretError),

    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("recovery module {module} has a delay of {delay}s; trigger the recovery and execute it later")]
    DelayConfigured { module: Address, delay: U256 },

    #[error("no recovery module of {account} accepts this recoverer")]
    NoRecoveryModule { account: Address },

    #[error("a recovery is already in progress")]
    InProgress,

    #[error("no connected account")]
    NotConnected,

    #[error("recovery task ended unexpectedly: {0}")]
    Interrupted(String),
}

/// Clears the in-flight flag when the recovery work ends.
///
/// Owned by the spawned task, not by the caller, so an abandoned caller
/// cannot release the slot while a write is still pending at the wallet.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Flows<C: ?Sized> {
    chain: ChainClient<C>,
    owner_count: usize,
}

pub struct RecoveryOrchestrator<C: ?Sized> {
    flows: Arc<Flows<C>>,
    in_flight: Arc<AtomicBool>,
}

impl<C: MethodCaller + ?Sized + 'static> RecoveryOrchestrator<C> {
    pub fn new(caller: Arc<C>) -> Self {
        Self {
            flows: Arc::new(Flows {
                chain: ChainClient::new(caller),
                owner_count: DEFAULT_OWNER_COUNT,
            }),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a recovery to completion.
    ///
    /// The attempt runs on its own task: dropping the returned future does
    /// not cancel it, and the single-flight slot stays taken until it ends.
    pub async fn recover(&self, request: RecoveryRequest) -> Result<RecoveryReceipt, RecoveryError> {
        let flows = self.flows.clone();
        self.run_detached(async move { flows.recover(request).await })
            .await
    }

    /// Second phase of a delayed recovery.
    pub async fn execute_recovery(
        &self,
        account: Address,
        locations: &[LocationSecret],
    ) -> Result<ExecutionReceipt, RecoveryError> {
        let flows = self.flows.clone();
        let locations = locations.to_vec();
        self.run_detached(async move { flows.execute_recovery(account, &locations).await })
            .await
    }

    /// Ask the connected wallet to install a recovery module for the derived
    /// recoverer.
    pub async fn enable_recovery(
        &self,
        locations: &[LocationSecret],
        delay: u64,
    ) -> Result<EnableReceipt, RecoveryError> {
        let flows = self.flows.clone();
        let locations = locations.to_vec();
        self.run_detached(async move { flows.enable_recovery(&locations, delay).await })
            .await
    }

    /// First module of `account` whose `recoverer()` is `recoverer`.
    pub async fn find_module(&self, account: Address, recoverer: Address) -> Result<Address, RecoveryError> {
        self.flows.find_module(account, recoverer).await
    }

    async fn run_detached<T, F>(&self, work: F) -> Result<T, RecoveryError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, RecoveryError>> + Send + 'static,
    {
        let flight = self.begin()?;
        let task = tokio::spawn(async move {
            let _flight = flight;
            work.await
        });
        task.await.map_err(|e| {
            tracing::error!(error = %e, "Recovery task failed");
            RecoveryError::Interrupted(e.to_string())
        })?
    }

    fn begin(&self) -> Result<FlightGuard, RecoveryError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RecoveryError::InProgress)?;
        Ok(FlightGuard(self.in_flight.clone()))
    }
}

impl<C: MethodCaller + ?Sized> Flows<C> {
    async fn recover(&self, request: RecoveryRequest) -> Result<RecoveryReceipt, RecoveryError> {
        self.chain.sender().ok_or(RecoveryError::NotConnected)?;

        let key = recoverer_key(&request.locations)?;
        let new_owners = request.mnemonic.derive_owners(self.owner_count)?;
        tracing::info!(
            account = %request.account,
            recoverer = %key.address(),
            mode = ?request.mode,
            "Starting recovery"
        );

        let module = self.find_module(request.account, key.address()).await?;

        if request.mode == RecoveryMode::Immediate {
            let delay = self.chain.delay(module).await?;
            if !delay.is_zero() {
                tracing::warn!(%module, %delay, "Module delay rules out immediate recovery");
                return Err(RecoveryError::DelayConfigured { module, delay });
            }
        }

        let nonce = self.chain.nonce(module).await?;
        let hash = recovery_payload_hash(&new_owners, nonce);
        let signature = key.sign_hash(&hash)?;
        tracing::info!(%module, %nonce, "Recovery payload signed");

        let tx_hash = match request.mode {
            RecoveryMode::Immediate => {
                let call = IRecoveryModule::triggerAndExecuteRecoveryWithoutDelayCall {
                    r: signature.r,
                    s: signature.s,
                    v: signature.v,
                    recoveryOwners: new_owners.clone(),
                };
                self.chain.send(module, &call).await?
            }
            RecoveryMode::Trigger => {
                let call = IRecoveryModule::triggerRecoveryCall {
                    r: signature.r,
                    s: signature.s,
                    v: signature.v,
                    recoveryOwners: new_owners.clone(),
                };
                self.chain.send(module, &call).await?
            }
        };

        tracing::info!(%module, %tx_hash, "Recovery submitted");
        Ok(RecoveryReceipt {
            module,
            recoverer: key.address(),
            new_owners,
            nonce,
            mode: request.mode,
            tx_hash,
        })
    }

    async fn execute_recovery(
        &self,
        account: Address,
        locations: &[LocationSecret],
    ) -> Result<ExecutionReceipt, RecoveryError> {
        self.chain.sender().ok_or(RecoveryError::NotConnected)?;

        let key = recoverer_key(locations)?;
        let module = self.find_module(account, key.address()).await?;
        let tx_hash = self
            .chain
            .send(module, &IRecoveryModule::executeRecoveryCall {})
            .await?;

        tracing::info!(%module, %tx_hash, "Recovery execution submitted");
        Ok(ExecutionReceipt { module, tx_hash })
    }

    async fn enable_recovery(
        &self,
        locations: &[LocationSecret],
        delay: u64,
    ) -> Result<EnableReceipt, RecoveryError> {
        let account = self.chain.sender().ok_or(RecoveryError::NotConnected)?;

        let recoverer = recoverer_key(locations)?.address();
        let params = json!([account.to_checksum(None), recoverer.to_checksum(None), delay]);
        let result = self
            .chain
            .caller()
            .call_method(ENABLE_RECOVERY_METHOD, params)
            .await
            .map_err(ChainError::from)?;

        tracing::info!(%account, %recoverer, delay, "Recovery enabled");
        Ok(EnableReceipt {
            account,
            recoverer,
            delay,
            result,
        })
    }

    /// Modules that fail to answer `recoverer()` are not recovery modules
    /// and are skipped.
    async fn find_module(&self, account: Address, recoverer: Address) -> Result<Address, RecoveryError> {
        for module in self.chain.modules(account).await? {
            match self.chain.recoverer(module).await {
                Ok(candidate) if candidate == recoverer => return Ok(module),
                Ok(_) => {}
                Err(ChainError::Session(e)) if !is_fatal(&e) => {
                    tracing::debug!(%module, error = %e, "Skipping module without recoverer");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RecoveryError::NoRecoveryModule { account })
    }
}

fn recoverer_key(locations: &[LocationSecret]) -> Result<RecoveryKeyPair, RecoveryError> {
    let digest = canonicalize(locations)?;
    Ok(derive_key(&digest)?)
}

/// Errors that end the whole flow rather than just ruling out one module.
fn is_fatal(error: &crate::session::SessionError) -> bool {
    !matches!(error, crate::session::SessionError::RemoteCall { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::scripted::{ScriptedChain, ScriptedModule, WALLET_ACCOUNT};
    use crate::keys::RecoverySignature;
    use alloy::primitives::address;
    use alloy::sol_types::SolCall;
    use std::time::Duration;

    const SAFE: Address = address!("0x5afe5afe5afe5afe5afe5afe5afe5afe5afe5afe");
    const MODULE: Address = address!("0x2222222222222222222222222222222222222222");
    const OTHER_MODULE: Address = address!("0x4444444444444444444444444444444444444444");
    const BROKEN_MODULE: Address = address!("0x6666666666666666666666666666666666666666");
    const HARDHAT_PHRASE: &str = "test test test test test test test test test test test junk";

    fn locations() -> Vec<LocationSecret> {
        ["u33dc0", "u33db8", "u281zb", "gcpvj0", "dr5reg"]
            .iter()
            .map(|g| LocationSecret::new(g).unwrap())
            .collect()
    }

    fn recoverer() -> Address {
        recoverer_key(&locations()).unwrap().address()
    }

    fn request(mode: RecoveryMode) -> RecoveryRequest {
        RecoveryRequest {
            account: SAFE,
            locations: locations(),
            mnemonic: RecoveryMnemonic::parse(HARDHAT_PHRASE).unwrap(),
            mode,
        }
    }

    fn orchestrator(modules: Vec<ScriptedModule>) -> (RecoveryOrchestrator<ScriptedChain>, Arc<ScriptedChain>) {
        let chain = Arc::new(ScriptedChain::new(SAFE, modules));
        (RecoveryOrchestrator::new(chain.clone()), chain)
    }

    fn writes(chain: &ScriptedChain) -> usize {
        chain
            .requests()
            .iter()
            .filter(|(method, _)| method == "eth_sendTransaction")
            .count()
    }

    #[tokio::test]
    async fn zero_delay_recovers_with_one_combined_call() {
        let (orchestrator, chain) =
            orchestrator(vec![ScriptedModule::new(MODULE, recoverer()).with_nonce(3)]);

        let receipt = orchestrator.recover(request(RecoveryMode::Immediate)).await.unwrap();
        assert_eq!(receipt.module, MODULE);
        assert_eq!(receipt.nonce, U256::from(3));
        assert_eq!(
            receipt.new_owners,
            vec![
                address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
                address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            ]
        );

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, WALLET_ACCOUNT);
        assert_eq!(sent[0].to, MODULE);
        assert_eq!(receipt.tx_hash, sent[0].hash);

        let call =
            IRecoveryModule::triggerAndExecuteRecoveryWithoutDelayCall::abi_decode(&sent[0].data)
                .unwrap();
        assert_eq!(call.recoveryOwners, receipt.new_owners);

        let signature = RecoverySignature {
            r: call.r,
            s: call.s,
            v: call.v,
        };
        let hash = recovery_payload_hash(&receipt.new_owners, U256::from(3));
        assert_eq!(signature.recover_address(&hash).unwrap(), recoverer());
    }

    #[tokio::test]
    async fn configured_delay_rejects_immediate_recovery_before_any_write() {
        let (orchestrator, chain) =
            orchestrator(vec![ScriptedModule::new(MODULE, recoverer()).with_delay(3600)]);

        match orchestrator.recover(request(RecoveryMode::Immediate)).await {
            Err(RecoveryError::DelayConfigured { module, delay }) => {
                assert_eq!(module, MODULE);
                assert_eq!(delay, U256::from(3600));
            }
            other => panic!("expected DelayConfigured, got {other:?}"),
        }
        assert_eq!(writes(&chain), 0);
    }

    #[tokio::test]
    async fn trigger_mode_works_with_a_delay() {
        let (orchestrator, chain) =
            orchestrator(vec![ScriptedModule::new(MODULE, recoverer()).with_delay(3600)]);

        let receipt = orchestrator.recover(request(RecoveryMode::Trigger)).await.unwrap();
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        let call = IRecoveryModule::triggerRecoveryCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(call.recoveryOwners, receipt.new_owners);

        let executed = orchestrator.execute_recovery(SAFE, &locations()).await.unwrap();
        assert_eq!(executed.module, MODULE);
        let sent = chain.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].data, IRecoveryModule::executeRecoveryCall {}.abi_encode());
    }

    #[tokio::test]
    async fn picks_the_module_registered_for_the_recoverer() {
        let (orchestrator, chain) = orchestrator(vec![
            ScriptedModule::reverting(BROKEN_MODULE),
            ScriptedModule::new(OTHER_MODULE, address!("0x9999999999999999999999999999999999999999")),
            ScriptedModule::new(MODULE, recoverer()),
        ]);

        let receipt = orchestrator.recover(request(RecoveryMode::Immediate)).await.unwrap();
        assert_eq!(receipt.module, MODULE);
        assert_eq!(chain.sent()[0].to, MODULE);
    }

    #[tokio::test]
    async fn wrong_locations_find_no_module() {
        let (orchestrator, chain) = orchestrator(vec![ScriptedModule::new(
            MODULE,
            address!("0x9999999999999999999999999999999999999999"),
        )]);

        assert!(matches!(
            orchestrator.recover(request(RecoveryMode::Immediate)).await,
            Err(RecoveryError::NoRecoveryModule { account }) if account == SAFE
        ));
        assert_eq!(writes(&chain), 0);
    }

    #[tokio::test]
    async fn invalid_locations_fail_before_any_call() {
        let (orchestrator, chain) = orchestrator(vec![ScriptedModule::new(MODULE, recoverer())]);
        let mut request = request(RecoveryMode::Immediate);
        request.locations.pop();

        assert!(matches!(
            orchestrator.recover(request).await,
            Err(RecoveryError::InvalidInput(GeoSecretError::WrongCount { expected: 5, actual: 4 }))
        ));
        assert!(chain.requests().is_empty());
    }

    #[tokio::test]
    async fn requires_a_connected_account() {
        let chain = Arc::new(
            ScriptedChain::new(SAFE, vec![ScriptedModule::new(MODULE, recoverer())]).without_account(),
        );
        let orchestrator = RecoveryOrchestrator::new(chain.clone());

        assert!(matches!(
            orchestrator.recover(request(RecoveryMode::Immediate)).await,
            Err(RecoveryError::NotConnected)
        ));
        assert!(chain.requests().is_empty());
        assert!(!orchestrator.is_in_flight());
    }

    #[tokio::test]
    async fn concurrent_recovery_is_rejected() {
        let chain = Arc::new(
            ScriptedChain::new(SAFE, vec![ScriptedModule::new(MODULE, recoverer())])
                .with_latency(Duration::from_millis(30)),
        );
        let orchestrator = RecoveryOrchestrator::new(chain.clone());

        let (first, second) = tokio::join!(
            orchestrator.recover(request(RecoveryMode::Immediate)),
            orchestrator.recover(request(RecoveryMode::Immediate)),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(RecoveryError::InProgress)));
        assert_eq!(chain.sent().len(), 1);

        // The slot frees up once the first call finishes.
        orchestrator.recover(request(RecoveryMode::Immediate)).await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_recovery_keeps_the_slot_until_the_write_settles() {
        let chain = Arc::new(
            ScriptedChain::new(SAFE, vec![ScriptedModule::new(MODULE, recoverer())])
                .with_latency(Duration::from_millis(100)),
        );
        let orchestrator = Arc::new(RecoveryOrchestrator::new(chain.clone()));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.recover(request(RecoveryMode::Immediate)).await })
        };
        while writes(&chain) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        first.abort();
        let _ = first.await;

        assert!(orchestrator.is_in_flight());
        assert!(matches!(
            orchestrator.recover(request(RecoveryMode::Immediate)).await,
            Err(RecoveryError::InProgress)
        ));

        while orchestrator.is_in_flight() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(writes(&chain), 1);
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn enable_sends_wallet_request_with_recoverer() {
        let (orchestrator, chain) = orchestrator(vec![]);

        let receipt = orchestrator.enable_recovery(&locations(), 0).await.unwrap();
        assert_eq!(receipt.account, WALLET_ACCOUNT);
        assert_eq!(receipt.recoverer, recoverer());

        let requests = chain.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, ENABLE_RECOVERY_METHOD);
        assert_eq!(
            requests[0].1,
            json!([
                WALLET_ACCOUNT.to_checksum(None),
                recoverer().to_checksum(None),
                0
            ])
        );
    }
}
