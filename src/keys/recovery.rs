// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recoverer key derivation and signing.
//!
//! The canonical location digest is used as the secp256k1 private scalar.
//! The matching address is what the recovery module stores as its
//! `recoverer`, so the same five locations always reproduce it.

use std::fmt;

use alloy::{
    primitives::{keccak256, Address, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::ecdsa::{SigningKey, VerifyingKey};

use crate::geo::CanonicalSecretDigest;

/// Recoverer keypair. Lives only in memory for the duration of an attempt.
pub struct RecoveryKeyPair {
    signer: PrivateKeySigner,
    address: Address,
}

impl RecoveryKeyPair {
    /// Address registered on-chain as the module's recoverer.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte prehash (no message prefix is applied).
    pub fn sign_hash(&self, hash: &B256) -> Result<RecoverySignature, KeyError> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|e| KeyError::Signing(e.to_string()))?;

        Ok(RecoverySignature {
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
            v: 27 + u8::from(signature.v()),
        })
    }
}

impl fmt::Debug for RecoveryKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryKeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// ECDSA signature split into the components the module expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySignature {
    pub r: B256,
    pub s: B256,
    /// 27 or 28.
    pub v: u8,
}

impl RecoverySignature {
    /// Recover the signing address for `hash`.
    pub fn recover_address(&self, hash: &B256) -> Result<Address, KeyError> {
        let parity = match self.v {
            27 => false,
            28 => true,
            other => return Err(KeyError::Signing(format!("invalid recovery id {other}"))),
        };
        let signature = alloy::primitives::Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            parity,
        );
        signature
            .recover_address_from_prehash(hash)
            .map_err(|e| KeyError::Signing(e.to_string()))
    }
}

/// Derive the recoverer keypair from a canonical digest. Pure and repeatable.
pub fn derive_key(digest: &CanonicalSecretDigest) -> Result<RecoveryKeyPair, KeyError> {
    let signing_key = SigningKey::from_slice(digest.as_bytes())
        .map_err(|_| KeyError::InvalidScalar)?;
    let address = address_of(signing_key.verifying_key());
    let signer = PrivateKeySigner::from_signing_key(signing_key);

    Ok(RecoveryKeyPair { signer, address })
}

/// EVM address of an uncompressed secp256k1 public key.
fn address_of(verifying_key: &VerifyingKey) -> Address {
    let public_key = verifying_key.to_encoded_point(false);
    let hash = keccak256(&public_key.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("location digest is not a valid secp256k1 private key")]
    InvalidScalar,

    #[error("signing failed: {0}")]
    Signing(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::canonicalize_geohashes;

    fn scenario_digest() -> CanonicalSecretDigest {
        canonicalize_geohashes(&["u33db", "u33dc", "u33dd", "u33de", "u33df"]).unwrap()
    }

    #[test]
    fn derivation_is_repeatable() {
        let one = derive_key(&scenario_digest()).unwrap();
        let two = derive_key(&scenario_digest()).unwrap();
        assert_eq!(one.address(), two.address());
        assert_eq!(one.address(), one.signer.address());
    }

    #[test]
    fn address_matches_signer_for_reordered_input() {
        let reordered =
            canonicalize_geohashes(&["u33df", "u33de", "u33dc", "u33db", "u33dd"]).unwrap();
        assert_eq!(
            derive_key(&reordered).unwrap().address(),
            derive_key(&scenario_digest()).unwrap().address()
        );
    }

    #[test]
    fn signature_recovers_to_recoverer() {
        let key = derive_key(&scenario_digest()).unwrap();
        let hash = keccak256(b"recovery payload");
        let signature = key.sign_hash(&hash).unwrap();

        assert!(signature.v == 27 || signature.v == 28);
        assert_eq!(signature.recover_address(&hash).unwrap(), key.address());
    }

    #[test]
    fn signing_is_deterministic() {
        let key = derive_key(&scenario_digest()).unwrap();
        let hash = keccak256(b"payload");
        assert_eq!(key.sign_hash(&hash).unwrap(), key.sign_hash(&hash).unwrap());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = derive_key(&scenario_digest()).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("address"));
        assert!(!rendered.contains(&alloy::hex::encode(scenario_digest().as_bytes())));
    }
}
