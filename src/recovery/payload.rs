// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing payload accepted by the recovery module.
//!
//! `keccak256(0x19 || 0x00 || pad32(owner_0) || ... || pad32(owner_n) || uint256(nonce))`
//!
//! The module nonce is part of the payload, so a signature authorizes one
//! recovery only; after the module advances its nonce the same signature
//! is rejected.

use alloy::primitives::{keccak256, Address, FixedBytes, B256, U256};
use alloy::sol_types::SolValue;

/// Leading byte of EIP-191 style signed data.
pub const SIGNED_DATA_PREFIX: u8 = 0x19;
/// Version byte following the prefix.
pub const SIGNED_DATA_VERSION: u8 = 0x00;

/// Solidity packed encoding of `(bytes1, bytes1, address[], uint256)`.
/// Array elements are padded to full words.
pub fn recovery_payload(owners: &[Address], nonce: U256) -> Vec<u8> {
    (
        FixedBytes::<1>::new([SIGNED_DATA_PREFIX]),
        FixedBytes::<1>::new([SIGNED_DATA_VERSION]),
        owners.to_vec(),
        nonce,
    )
        .abi_encode_packed()
}

pub fn recovery_payload_hash(owners: &[Address], nonce: U256) -> B256 {
    keccak256(recovery_payload(owners, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::hex;
    use alloy::primitives::address;

    const OWNER_A: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const OWNER_B: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn layout_pads_owners_and_nonce_to_words() {
        let payload = recovery_payload(&[OWNER_A, OWNER_B], U256::from(5));

        let expected = format!(
            "1900{:0>64}{:0>64}{:0>64}",
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "5"
        );
        assert_eq!(hex::encode(&payload), expected);
        assert_eq!(payload.len(), 2 + 3 * 32);
    }

    #[test]
    fn nonce_changes_the_hash() {
        let owners = [OWNER_A, OWNER_B];
        assert_ne!(
            recovery_payload_hash(&owners, U256::ZERO),
            recovery_payload_hash(&owners, U256::from(1))
        );
    }

    #[test]
    fn owner_order_matters() {
        assert_ne!(
            recovery_payload_hash(&[OWNER_A, OWNER_B], U256::ZERO),
            recovery_payload_hash(&[OWNER_B, OWNER_A], U256::ZERO)
        );
    }
}
