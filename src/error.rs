// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::chain::ChainError;
use crate::keys::MnemonicError;
use crate::recovery::RecoveryError;
use crate::session::SessionError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::Exists | SessionError::Closed | SessionError::NotActive => {
                Self::conflict(message)
            }
            SessionError::RemoteCall { .. } => Self::bad_gateway(message),
            SessionError::Timeout { .. } => Self::gateway_timeout(message),
            SessionError::Transport(_) => Self::bad_gateway(message),
            SessionError::Store(_) | SessionError::Protocol(_) | SessionError::Entropy => {
                Self::internal(message)
            }
        }
    }
}

impl From<MnemonicError> for ApiError {
    fn from(err: MnemonicError) -> Self {
        match err {
            MnemonicError::InvalidPhrase(_) => Self::bad_request(err.to_string()),
            MnemonicError::Entropy | MnemonicError::Derivation(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<RecoveryError> for ApiError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::InvalidInput(_) => Self::bad_request(err.to_string()),
            RecoveryError::Mnemonic(inner) => inner.into(),
            RecoveryError::Key(_) => Self::bad_request(err.to_string()),
            RecoveryError::Chain(ChainError::Session(inner)) => inner.into(),
            RecoveryError::Chain(ChainError::NoAccount) | RecoveryError::NotConnected => {
                Self::conflict(err.to_string())
            }
            RecoveryError::Chain(ChainError::Decode { .. }) => Self::bad_gateway(err.to_string()),
            RecoveryError::DelayConfigured { .. } | RecoveryError::InProgress => {
                Self::conflict(err.to_string())
            }
            RecoveryError::NoRecoveryModule { .. } => Self::not_found(err.to_string()),
            RecoveryError::Interrupted(_) => Self::internal(err.to_string()),
        }
    }
}
