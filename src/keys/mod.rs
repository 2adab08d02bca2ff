// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material used during a recovery attempt.
//!
//! - `recovery` - the recoverer key, re-derived from the location digest
//! - `owners` - fresh mnemonic and the new Safe owners derived from it

pub mod owners;
pub mod recovery;

pub use owners::{EntropySource, MnemonicError, RecoveryMnemonic, DEFAULT_OWNER_COUNT};
pub use recovery::{derive_key, KeyError, RecoveryKeyPair, RecoverySignature};
