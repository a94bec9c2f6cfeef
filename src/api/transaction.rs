// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction workflow endpoints.
//!
//! Thin layer over [`TransactionWorkflow`]: each handler forwards one user
//! intent and answers with the resulting state snapshot. Polling after a
//! successful broadcast runs in the background; clients follow it through
//! `GET /v1/transaction` and `GET /v1/notifications`.
//!
//! Steps keep running when the client disconnects mid-request.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    blockchain::{
        create_delegation_transaction_message, create_rewards_claim_transaction,
        create_transaction_request_metadata, network_by_name, AccountInformation, GasSettings,
        TransactionData, ValidatorReward,
    },
    error::ApiError,
    state::AppState,
    workflow::{Location, Notification, Step, TransactionSnapshot, TransactionWorkflow},
};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to stage a delegation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DelegationRequest {
    /// Delegator address; defaults to the active account
    #[serde(default)]
    pub address: Option<String>,
    /// Validator operator address
    pub validator_address: String,
    /// Amount in base units (e.g., "50" uatom)
    pub amount: String,
    pub gas: GasSettings,
    pub account: AccountInformation,
}

/// Request to stage a rewards claim.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RewardsClaimRequest {
    /// Delegator address; defaults to the active account
    #[serde(default)]
    pub address: Option<String>,
    pub gas: GasSettings,
    pub account: AccountInformation,
    /// Selected validators and their pending rewards
    pub rewards: Vec<ValidatorReward>,
}

/// Page-sync request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetPageRequest {
    /// History page, starting at 1
    pub page: u32,
    /// Whether the backend reported more results past this page
    #[serde(default)]
    pub more_results: Option<bool>,
}

/// Active account switch.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetAccountRequest {
    /// Account address; `null` signs out
    #[serde(default)]
    pub address: Option<String>,
    /// Network name (`COSMOS`, `KAVA`, `TERRA`); defaults to the active network
    #[serde(default)]
    pub network: Option<String>,
}

/// Deep link into the transaction history.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeepLinkRequest {
    /// Query string, e.g. "address=cosmos1...&page=2"
    pub search: String,
}

/// Outcome of one workflow step.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepResponse {
    pub attempt: Uuid,
    /// Action dispatched by the step (e.g., "sign_transaction_success")
    pub action: String,
    pub transaction: TransactionSnapshot,
}

async fn step_response(workflow: &TransactionWorkflow, step: Step) -> StepResponse {
    StepResponse {
        attempt: step.attempt,
        action: step.action.name().to_string(),
        transaction: workflow.snapshot().await,
    }
}

async fn resolve_address(
    workflow: &TransactionWorkflow,
    requested: Option<String>,
) -> Result<String, ApiError> {
    match requested {
        Some(address) if !address.trim().is_empty() => Ok(address),
        _ => workflow
            .current_state()
            .await
            .address
            .ok_or_else(|| ApiError::bad_request("No address given and no active account")),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Current transaction state.
#[utoipa::path(
    get,
    path = "/v1/transaction",
    tag = "Transaction",
    responses(
        (status = 200, description = "Current transaction state", body = TransactionSnapshot)
    )
)]
pub async fn get_transaction(State(state): State<AppState>) -> Json<TransactionSnapshot> {
    Json(state.workflow.snapshot().await)
}

/// Start a new cycle with prepared transaction data.
#[utoipa::path(
    post,
    path = "/v1/transaction",
    tag = "Transaction",
    request_body = TransactionData,
    responses(
        (status = 200, description = "Cycle started", body = TransactionSnapshot)
    )
)]
pub async fn begin_transaction(
    State(state): State<AppState>,
    Json(data): Json<TransactionData>,
) -> Json<TransactionSnapshot> {
    state.workflow.begin(data).await;
    Json(state.workflow.snapshot().await)
}

/// Build a delegation for the active network and start a new cycle.
#[utoipa::path(
    post,
    path = "/v1/transaction/delegation",
    tag = "Transaction",
    request_body = DelegationRequest,
    responses(
        (status = 200, description = "Delegation staged", body = TransactionSnapshot),
        (status = 400, description = "No address available"),
        (status = 422, description = "Invalid amount or gas settings")
    )
)]
pub async fn create_delegation(
    State(state): State<AppState>,
    Json(request): Json<DelegationRequest>,
) -> Result<Json<TransactionSnapshot>, ApiError> {
    let workflow = &state.workflow;
    let address = resolve_address(workflow, request.address).await?;
    let network = workflow.current_state().await.network;

    let data = TransactionData {
        tx_msg: create_delegation_transaction_message(
            &address,
            &request.validator_address,
            &request.amount,
            network.denom,
            &request.gas,
        )?,
        tx_request_metadata: create_transaction_request_metadata(
            &address,
            &request.gas,
            &request.account,
            &network,
        )?,
    };

    tracing::info!(
        network = network.name,
        validator = %request.validator_address,
        amount = %request.amount,
        "Delegation staged"
    );
    workflow.begin(data).await;
    Ok(Json(workflow.snapshot().await))
}

/// Build a rewards claim for the active network and start a new cycle.
#[utoipa::path(
    post,
    path = "/v1/transaction/rewards",
    tag = "Transaction",
    request_body = RewardsClaimRequest,
    responses(
        (status = 200, description = "Rewards claim staged", body = TransactionSnapshot),
        (status = 400, description = "No address available"),
        (status = 422, description = "No claimable rewards or invalid gas settings")
    )
)]
pub async fn create_rewards_claim(
    State(state): State<AppState>,
    Json(request): Json<RewardsClaimRequest>,
) -> Result<Json<TransactionSnapshot>, ApiError> {
    let workflow = &state.workflow;
    let address = resolve_address(workflow, request.address).await?;
    let network = workflow.current_state().await.network;

    let data = TransactionData {
        tx_msg: create_rewards_claim_transaction(
            &address,
            network.denom,
            &request.gas,
            &request.rewards,
        )?,
        tx_request_metadata: create_transaction_request_metadata(
            &address,
            &request.gas,
            &request.account,
            &network,
        )?,
    };

    tracing::info!(
        network = network.name,
        validators = data.tx_msg.value.msg.len(),
        "Rewards claim staged"
    );
    workflow.begin(data).await;
    Ok(Json(workflow.snapshot().await))
}

/// Ask the signing device to sign the staged transaction.
#[utoipa::path(
    post,
    path = "/v1/transaction/sign",
    tag = "Transaction",
    responses(
        (status = 200, description = "Sign step finished; see action for the outcome", body = StepResponse),
        (status = 409, description = "Workflow is not waiting for a signature")
    )
)]
pub async fn sign_transaction(
    State(state): State<AppState>,
) -> Result<Json<StepResponse>, ApiError> {
    let workflow = &state.workflow;
    let step = workflow
        .sign()
        .await
        .ok_or_else(|| ApiError::conflict("Transaction is not waiting for a signature"))?;
    Ok(Json(step_response(workflow, step).await))
}

/// Broadcast the signed transaction and start confirmation polling.
#[utoipa::path(
    post,
    path = "/v1/transaction/broadcast",
    tag = "Transaction",
    responses(
        (status = 200, description = "Broadcast step finished; see action for the outcome", body = StepResponse),
        (status = 409, description = "Transaction is not signed")
    )
)]
pub async fn broadcast_transaction(
    State(state): State<AppState>,
) -> Result<Json<StepResponse>, ApiError> {
    let workflow = &state.workflow;
    let step = workflow
        .broadcast()
        .await
        .ok_or_else(|| ApiError::conflict("Transaction is not signed"))?;
    Ok(Json(step_response(workflow, step).await))
}

/// Abandon the current cycle.
#[utoipa::path(
    delete,
    path = "/v1/transaction",
    tag = "Transaction",
    responses(
        (status = 200, description = "Workflow reset", body = TransactionSnapshot)
    )
)]
pub async fn reset_transaction(State(state): State<AppState>) -> Json<TransactionSnapshot> {
    state.workflow.reset().await;
    Json(state.workflow.snapshot().await)
}

/// Switch the active account or network.
///
/// Any change abandons the current cycle and returns the history to page 1.
#[utoipa::path(
    put,
    path = "/v1/account",
    tag = "Transaction",
    request_body = SetAccountRequest,
    responses(
        (status = 200, description = "State after the switch", body = TransactionSnapshot),
        (status = 400, description = "Unknown network")
    )
)]
pub async fn set_account(
    State(state): State<AppState>,
    Json(request): Json<SetAccountRequest>,
) -> Result<Json<TransactionSnapshot>, ApiError> {
    let workflow = &state.workflow;
    let network = match request.network {
        Some(name) => network_by_name(&name)?,
        None => workflow.current_state().await.network,
    };
    let address = request.address.filter(|a| !a.trim().is_empty());

    workflow.set_account(address, network).await;
    Ok(Json(workflow.snapshot().await))
}

/// Change the transaction-history page and mirror it into the location.
#[utoipa::path(
    put,
    path = "/v1/transactions/page",
    tag = "History",
    request_body = SetPageRequest,
    responses(
        (status = 200, description = "Location after the page change", body = Location),
        (status = 400, description = "Page numbers start at 1")
    )
)]
pub async fn set_transactions_page(
    State(state): State<AppState>,
    Json(request): Json<SetPageRequest>,
) -> Result<Json<Location>, ApiError> {
    let location = state.workflow.set_transactions_page(request.page).await?;
    if let Some(more_results) = request.more_results {
        state.workflow.set_more_results(more_results).await;
    }
    Ok(Json(location))
}

/// Advance to the next history page.
#[utoipa::path(
    post,
    path = "/v1/transactions/page/next",
    tag = "History",
    responses(
        (status = 200, description = "Location after the page change", body = Location)
    )
)]
pub async fn next_transactions_page(State(state): State<AppState>) -> Json<Location> {
    Json(state.workflow.next_page().await)
}

/// Go back one history page, stopping at page 1.
#[utoipa::path(
    post,
    path = "/v1/transactions/page/previous",
    tag = "History",
    responses(
        (status = 200, description = "Location after the page change", body = Location)
    )
)]
pub async fn previous_transactions_page(State(state): State<AppState>) -> Json<Location> {
    Json(state.workflow.previous_page().await)
}

/// Current navigable location.
#[utoipa::path(
    get,
    path = "/v1/location",
    tag = "History",
    responses(
        (status = 200, description = "Current location", body = Location)
    )
)]
pub async fn get_location(State(state): State<AppState>) -> Json<Location> {
    Json(state.workflow.history().location())
}

/// Open a deep link, switching account and page.
#[utoipa::path(
    post,
    path = "/v1/location",
    tag = "History",
    request_body = DeepLinkRequest,
    responses(
        (status = 200, description = "Location after opening the link", body = Location),
        (status = 400, description = "Query lacks an address or a valid page")
    )
)]
pub async fn open_location(
    State(state): State<AppState>,
    Json(request): Json<DeepLinkRequest>,
) -> Result<Json<Location>, ApiError> {
    Ok(Json(state.workflow.open_deep_link(&request.search).await?))
}

/// Step the location back.
#[utoipa::path(
    post,
    path = "/v1/location/back",
    tag = "History",
    responses(
        (status = 200, description = "Location after stepping back", body = Location),
        (status = 409, description = "Already at the oldest location")
    )
)]
pub async fn location_back(State(state): State<AppState>) -> Result<Json<Location>, ApiError> {
    state
        .workflow
        .navigate_back()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::conflict("No earlier location"))
}

/// Step the location forward.
#[utoipa::path(
    post,
    path = "/v1/location/forward",
    tag = "History",
    responses(
        (status = 200, description = "Location after stepping forward", body = Location),
        (status = 409, description = "Already at the newest location")
    )
)]
pub async fn location_forward(State(state): State<AppState>) -> Result<Json<Location>, ApiError> {
    state
        .workflow
        .navigate_forward()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::conflict("No later location"))
}

/// Recent notifications, oldest first.
#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Transaction",
    responses(
        (status = 200, description = "Recent notifications", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.workflow.notifier().recent())
}
