// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::recovery::RecoveryOrchestrator;
use crate::session::SessionEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: SessionEngine,
    pub recovery: Arc<RecoveryOrchestrator<SessionEngine>>,
    /// Cancelled on server shutdown; ends long-lived responses.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: SessionEngine, shutdown: CancellationToken) -> Self {
        Self {
            recovery: Arc::new(RecoveryOrchestrator::new(Arc::new(engine.clone()))),
            engine,
            shutdown,
        }
    }
}
