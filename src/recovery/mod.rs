// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Recovery
//!
//! - `payload` - the hash the recoverer key signs
//! - `orchestrator` - module lookup, signing and submission

pub mod orchestrator;
pub mod payload;

pub use orchestrator::{
    EnableReceipt, ExecutionReceipt, RecoveryError, RecoveryMode, RecoveryOrchestrator,
    RecoveryReceipt, RecoveryRequest,
};
pub use payload::{recovery_payload, recovery_payload_hash};
