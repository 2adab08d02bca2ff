// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use axum::{extract::State, Json};

use crate::{
    error::ApiError,
    geo::LocationSecret,
    keys::{RecoveryMnemonic, DEFAULT_OWNER_COUNT},
    models::{
        EnableRecoveryRequest, EnableRecoveryResponse, ExecuteRecoveryRequest,
        ExecuteRecoveryResponse, GenerateMnemonicRequest, MnemonicResponse, RecoverRequest,
        RecoverResponse,
    },
    recovery::{RecoveryError, RecoveryRequest},
    state::AppState,
};

/// Upper bound on previewed owners per phrase.
const MAX_OWNER_COUNT: usize = 10;

fn parse_address(field: &str, value: &str) -> Result<Address, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{field} is not a valid address: {value}")))
}

fn parse_locations(locations: &[String]) -> Result<Vec<LocationSecret>, ApiError> {
    locations
        .iter()
        .map(LocationSecret::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::from(RecoveryError::InvalidInput(e)))
}

/// Generate a recovery phrase and preview the owners it yields.
#[utoipa::path(
    post,
    path = "/v1/recovery/mnemonic",
    request_body = GenerateMnemonicRequest,
    tag = "Recovery",
    responses(
        (status = 200, body = MnemonicResponse),
        (status = 400, description = "Invalid owner count")
    )
)]
pub async fn generate_mnemonic(
    Json(request): Json<GenerateMnemonicRequest>,
) -> Result<Json<MnemonicResponse>, ApiError> {
    let count = request.owner_count.unwrap_or(DEFAULT_OWNER_COUNT);
    if count == 0 || count > MAX_OWNER_COUNT {
        return Err(ApiError::bad_request(format!(
            "owner_count must be between 1 and {MAX_OWNER_COUNT}"
        )));
    }

    let mnemonic = RecoveryMnemonic::generate()?;
    let owners = mnemonic
        .derive_owners(count)?
        .iter()
        .map(|owner| owner.to_checksum(None))
        .collect();

    Ok(Json(MnemonicResponse {
        mnemonic: mnemonic.phrase().to_string(),
        owners,
    }))
}

/// Replace the owners of a Safe using the secret locations.
///
/// The connected wallet submits the transaction.
#[utoipa::path(
    post,
    path = "/v1/recovery",
    request_body = RecoverRequest,
    tag = "Recovery",
    responses(
        (status = 200, body = RecoverResponse),
        (status = 400, description = "Invalid locations, address or mnemonic"),
        (status = 404, description = "No recovery module for these locations"),
        (status = 409, description = "No active session, recovery in progress, or module delay set"),
        (status = 502, description = "The wallet rejected a call"),
        (status = 504, description = "The wallet did not answer in time")
    )
)]
pub async fn recover(
    State(state): State<AppState>,
    Json(request): Json<RecoverRequest>,
) -> Result<Json<RecoverResponse>, ApiError> {
    let request = RecoveryRequest {
        account: parse_address("account", &request.account)?,
        locations: parse_locations(&request.locations)?,
        mnemonic: RecoveryMnemonic::parse(&request.mnemonic)?,
        mode: request.mode.into(),
    };

    let receipt = state.recovery.recover(request).await?;
    Ok(Json(receipt.into()))
}

/// Execute a recovery triggered earlier, once the module delay has passed.
#[utoipa::path(
    post,
    path = "/v1/recovery/execute",
    request_body = ExecuteRecoveryRequest,
    tag = "Recovery",
    responses(
        (status = 200, body = ExecuteRecoveryResponse),
        (status = 400, description = "Invalid locations or address"),
        (status = 404, description = "No recovery module for these locations"),
        (status = 409, description = "No active session or recovery in progress")
    )
)]
pub async fn execute_recovery(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRecoveryRequest>,
) -> Result<Json<ExecuteRecoveryResponse>, ApiError> {
    let account = parse_address("account", &request.account)?;
    let locations = parse_locations(&request.locations)?;

    let receipt = state.recovery.execute_recovery(account, &locations).await?;
    Ok(Json(receipt.into()))
}

/// Ask the connected wallet to enable recovery with the key of these locations.
#[utoipa::path(
    post,
    path = "/v1/recovery/enable",
    request_body = EnableRecoveryRequest,
    tag = "Recovery",
    responses(
        (status = 200, body = EnableRecoveryResponse),
        (status = 400, description = "Invalid locations"),
        (status = 409, description = "No active session or recovery in progress")
    )
)]
pub async fn enable_recovery(
    State(state): State<AppState>,
    Json(request): Json<EnableRecoveryRequest>,
) -> Result<Json<EnableRecoveryResponse>, ApiError> {
    let locations = parse_locations(&request.locations)?;

    let receipt = state
        .recovery
        .enable_recovery(&locations, request.delay)
        .await?;
    Ok(Json(receipt.into()))
}
