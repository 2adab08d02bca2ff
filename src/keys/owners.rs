// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery mnemonic generation and new-owner derivation.
//!
//! A fresh BIP-39 phrase is generated for every recovery attempt. The new
//! Safe owners are the first `count` accounts on the standard Ethereum
//! path `m/44'/60'/0'/0/{index}`; uniqueness comes from the phrase.

use std::fmt;

use alloy::{
    primitives::Address,
    signers::local::{coins_bip39::English, MnemonicBuilder},
};
use bip39::{Language, Mnemonic};
use ring::rand::{SecureRandom, SystemRandom};

/// Number of owners installed by a recovery.
pub const DEFAULT_OWNER_COUNT: usize = 2;

/// BIP-44 prefix for Ethereum external accounts.
pub const ETHEREUM_DERIVATION_PREFIX: &str = "m/44'/60'/0'/0";

/// 128 bits of entropy, i.e. a 12 word phrase.
const ENTROPY_BYTES: usize = 16;

/// Source of secure randomness for mnemonic generation.
pub trait EntropySource {
    fn fill_entropy(&self, dest: &mut [u8]) -> Result<(), MnemonicError>;
}

impl EntropySource for SystemRandom {
    fn fill_entropy(&self, dest: &mut [u8]) -> Result<(), MnemonicError> {
        self.fill(dest).map_err(|_| MnemonicError::Entropy)
    }
}

/// Seed phrase for the new owners of a recovered Safe.
///
/// Held in memory until the attempt completes; never sent over the session.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryMnemonic {
    phrase: String,
}

impl RecoveryMnemonic {
    /// Generate a new phrase from the operating system RNG.
    pub fn generate() -> Result<Self, MnemonicError> {
        Self::generate_with(&SystemRandom::new())
    }

    /// Generate a new phrase from the given entropy source.
    pub fn generate_with(source: &dyn EntropySource) -> Result<Self, MnemonicError> {
        let mut entropy = [0u8; ENTROPY_BYTES];
        source.fill_entropy(&mut entropy)?;
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|e| MnemonicError::InvalidPhrase(e.to_string()))?;
        Ok(Self {
            phrase: mnemonic.to_string(),
        })
    }

    /// Accept a caller-supplied English phrase (checksum verified).
    pub fn parse(phrase: &str) -> Result<Self, MnemonicError> {
        let normalized = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| MnemonicError::InvalidPhrase(e.to_string()))?;
        Ok(Self {
            phrase: mnemonic.to_string(),
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// Derive the first `count` owner addresses, in index order.
    pub fn derive_owners(&self, count: usize) -> Result<Vec<Address>, MnemonicError> {
        if count == 0 {
            return Err(MnemonicError::Derivation(
                "at least one owner is required".to_string(),
            ));
        }

        (0..count)
            .map(|index| {
                let signer = MnemonicBuilder::<English>::default()
                    .phrase(self.phrase.as_str())
                    .derivation_path(format!("{ETHEREUM_DERIVATION_PREFIX}/{index}"))
                    .map_err(|e| MnemonicError::Derivation(e.to_string()))?
                    .build()
                    .map_err(|e| MnemonicError::Derivation(e.to_string()))?;
                Ok(signer.address())
            })
            .collect()
    }
}

impl fmt::Debug for RecoveryMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryMnemonic")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MnemonicError {
    #[error("secure random source is unavailable")]
    Entropy,

    #[error("invalid mnemonic: {0}")]
    InvalidPhrase(String),

    #[error("owner derivation failed: {0}")]
    Derivation(String),
}
