// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payload sealing for relayed messages.
//!
//! Payloads are sealed with AES-256-GCM under the session's 32-byte shared
//! key. A fresh random nonce is used for every message and travels next to
//! the ciphertext.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use super::TransportError;

/// Wire form of a sealed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Hex ciphertext with the authentication tag appended.
    pub data: String,
    /// Hex nonce.
    pub iv: String,
}

pub struct EnvelopeCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl EnvelopeCipher {
    /// Build a cipher from the hex shared key of a session.
    pub fn from_hex_key(shared_key: &str) -> Result<Self, TransportError> {
        let bytes = alloy::hex::decode(shared_key)
            .map_err(|e| TransportError::Crypto(format!("shared key is not hex: {e}")))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &bytes)
            .map_err(|_| TransportError::Crypto("shared key must be 32 bytes".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedPayload, TransportError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| TransportError::Crypto("random source unavailable".to_string()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| TransportError::Crypto("seal failed".to_string()))?;

        Ok(SealedPayload {
            data: alloy::hex::encode(in_out),
            iv: alloy::hex::encode(nonce),
        })
    }

    pub fn open(&self, sealed: &SealedPayload) -> Result<Vec<u8>, TransportError> {
        let nonce: [u8; NONCE_LEN] = alloy::hex::decode(&sealed.iv)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| TransportError::Crypto("malformed nonce".to_string()))?;
        let mut in_out = alloy::hex::decode(&sealed.data)
            .map_err(|e| TransportError::Crypto(format!("malformed ciphertext: {e}")))?;

        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| TransportError::Crypto("payload failed authentication".to_string()))?;
        Ok(plaintext.to_vec())
    }
}
