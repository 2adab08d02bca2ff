// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::SessionStatusView;
use crate::session::SessionStatus;
use crate::state::AppState;

/// Liveness response with the session status for dashboards.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub session: SessionStatusView,
    /// True while a recovery call is running.
    pub recovery_in_flight: bool,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state
        .engine
        .active_session()
        .map(|info| info.status)
        .unwrap_or(SessionStatus::Absent);

    Json(HealthResponse {
        status: "ok".to_string(),
        session: session.into(),
        recovery_in_flight: state.recovery.is_in_flight(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::TestApp;

    #[tokio::test]
    async fn health_reports_idle_service() {
        let app = TestApp::new();
        let Json(response) = health(State(app.state.clone())).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.session, SessionStatusView::Absent);
        assert!(!response.recovery_in_flight);
    }
}
