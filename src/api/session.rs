// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};

use crate::{
    error::ApiError,
    models::{CreateSessionResponse, DisconnectResponse, SessionView},
    state::AppState,
};

/// Start pairing with a remote signer.
///
/// Only one session may exist at a time.
#[utoipa::path(
    post,
    path = "/v1/session",
    tag = "Session",
    responses(
        (status = 201, body = CreateSessionResponse),
        (status = 409, description = "A session already exists")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let uri = state.engine.create_session().await?;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { uri })))
}

#[utoipa::path(
    get,
    path = "/v1/session",
    tag = "Session",
    responses(
        (status = 200, body = SessionView),
        (status = 404, description = "No session")
    )
)]
pub async fn get_session(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    state
        .engine
        .active_session()
        .map(|info| Json(info.into()))
        .ok_or_else(|| ApiError::not_found("No session"))
}

/// Close the session and notify the signer.
#[utoipa::path(
    delete,
    path = "/v1/session",
    tag = "Session",
    responses((status = 200, body = DisconnectResponse))
)]
pub async fn disconnect_session(
    State(state): State<AppState>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let disconnected = state.engine.disconnect().await?;
    Ok(Json(DisconnectResponse { disconnected }))
}

/// Server-sent `session` events: the current state, then every change.
///
/// Opening a new stream ends the previous one. Streams end on shutdown.
#[utoipa::path(
    get,
    path = "/v1/session/updates",
    tag = "Session",
    responses((status = 200, description = "Stream of SessionView events", content_type = "text/event-stream"))
)]
pub async fn session_updates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = session_events(&state);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn session_events(state: &AppState) -> impl Stream<Item = Result<Event, Infallible>> {
    state
        .engine
        .subscribe_updates()
        .into_stream()
        .take_until(state.shutdown.clone().cancelled_owned())
        .filter_map(|info| async move {
            let view = SessionView::from(info);
            match Event::default().event("session").json_data(&view) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode session event");
                    None
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatusView;
    use crate::session::SessionConfig;
    use crate::state::testing::TestApp;

    #[tokio::test]
    async fn create_then_get_reports_connecting() {
        let app = TestApp::new();

        let (status, Json(created)) = create_session(State(app.state.clone()))
            .await
            .expect("create succeeds");
        assert_eq!(status, StatusCode::CREATED);
        let config = SessionConfig::from_uri(&created.uri).unwrap();

        let Json(view) = get_session(State(app.state.clone())).await.unwrap();
        assert_eq!(view.status, SessionStatusView::Connecting);
        assert_eq!(view.session_id.as_deref(), Some(config.session_id.as_str()));
        assert!(view.peer.is_none());
    }

    #[tokio::test]
    async fn second_create_conflicts() {
        let app = TestApp::new();
        let (status, _) = create_session(State(app.state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = create_session(State(app.state.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn get_without_session_is_not_found() {
        let app = TestApp::new();
        let err = get_session(State(app.state.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disconnect_clears_the_session() {
        let app = TestApp::new();
        let _created = create_session(State(app.state.clone())).await.unwrap();

        let Json(first) = disconnect_session(State(app.state.clone())).await.unwrap();
        assert!(first.disconnected);
        assert!(get_session(State(app.state.clone())).await.is_err());

        let Json(second) = disconnect_session(State(app.state.clone())).await.unwrap();
        assert!(!second.disconnected);

        // Pairing can start over.
        let (status, _) = create_session(State(app.state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn update_stream_starts_with_current_state() {
        let app = TestApp::new();
        let _created = create_session(State(app.state.clone())).await.unwrap();

        let mut events = Box::pin(session_events(&app.state));
        let first = tokio::time::timeout(std::time::Duration::from_secs(1), events.next())
            .await
            .expect("event arrives");
        assert!(matches!(first, Some(Ok(_))));

        app.state.shutdown.cancel();
        let end = tokio::time::timeout(std::time::Duration::from_secs(1), events.next())
            .await
            .expect("stream ends");
        assert!(end.is_none());
    }
}
