// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Location Recovery - Safe owner recovery from secret locations
//!
//! A recoverer key is derived from five secret geohashes. Through a relayed
//! session with the user's wallet, that key authorizes a recovery module to
//! replace the Safe's owners with addresses from a fresh mnemonic.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `geo` - location secrets and their canonical digest
//! - `keys` - recoverer key derivation and owner mnemonics
//! - `relay` - encrypted pub/sub transport to the wallet
//! - `session` - session lifecycle, persistence and request dispatch
//! - `chain` - contract calls routed through the session
//! - `recovery` - recovery orchestration

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod geo;
pub mod keys;
pub mod models;
pub mod recovery;
pub mod relay;
pub mod session;
pub mod state;
