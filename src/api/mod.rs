// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateSessionResponse, DisconnectResponse, EnableRecoveryRequest,
        EnableRecoveryResponse, ExecuteRecoveryRequest, ExecuteRecoveryResponse,
        GenerateMnemonicRequest, MnemonicResponse, PeerView, RecoverRequest, RecoverResponse,
        RecoveryModeParam, SessionStatusView, SessionView,
    },
    state::AppState,
};

pub mod health;
pub mod recovery;
pub mod session;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/session",
            get(session::get_session)
                .post(session::create_session)
                .delete(session::disconnect_session),
        )
        .route("/session/updates", get(session::session_updates))
        .route("/recovery", post(recovery::recover))
        .route("/recovery/mnemonic", post(recovery::generate_mnemonic))
        .route("/recovery/execute", post(recovery::execute_recovery))
        .route("/recovery/enable", post(recovery::enable_recovery))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session::create_session,
        session::get_session,
        session::disconnect_session,
        session::session_updates,
        recovery::generate_mnemonic,
        recovery::recover,
        recovery::execute_recovery,
        recovery::enable_recovery
    ),
    components(
        schemas(
            health::HealthResponse,
            CreateSessionResponse,
            SessionView,
            SessionStatusView,
            PeerView,
            DisconnectResponse,
            GenerateMnemonicRequest,
            MnemonicResponse,
            RecoverRequest,
            RecoverResponse,
            RecoveryModeParam,
            ExecuteRecoveryRequest,
            ExecuteRecoveryResponse,
            EnableRecoveryRequest,
            EnableRecoveryResponse
        )
    ),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Session", description = "Pairing with the remote signer"),
        (name = "Recovery", description = "Location-based Safe recovery")
    )
)]
struct ApiDoc;
