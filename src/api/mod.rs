// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::{
        AccountInformation, Coin, Fee, GasSettings, PubKey, SignedTransactionBody, StdSignature,
        TransactionData, TxMsg, TxRequestMetadata, TxValue, ValidatorReward,
    },
    state::AppState,
    workflow::{Location, Notification, NotificationLevel, PageCursor, TransactionPhase, TransactionSnapshot},
};

pub mod health;
pub mod transaction;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/transaction",
            get(transaction::get_transaction)
                .post(transaction::begin_transaction)
                .delete(transaction::reset_transaction),
        )
        .route(
            "/transaction/delegation",
            post(transaction::create_delegation),
        )
        .route(
            "/transaction/rewards",
            post(transaction::create_rewards_claim),
        )
        .route("/transaction/sign", post(transaction::sign_transaction))
        .route(
            "/transaction/broadcast",
            post(transaction::broadcast_transaction),
        )
        .route("/account", put(transaction::set_account))
        .route(
            "/transactions/page",
            put(transaction::set_transactions_page),
        )
        .route(
            "/transactions/page/next",
            post(transaction::next_transactions_page),
        )
        .route(
            "/transactions/page/previous",
            post(transaction::previous_transactions_page),
        )
        .route(
            "/location",
            get(transaction::get_location).post(transaction::open_location),
        )
        .route("/location/back", post(transaction::location_back))
        .route("/location/forward", post(transaction::location_forward))
        .route("/notifications", get(transaction::list_notifications))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
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
        health::liveness,
        transaction::get_transaction,
        transaction::begin_transaction,
        transaction::create_delegation,
        transaction::create_rewards_claim,
        transaction::sign_transaction,
        transaction::broadcast_transaction,
        transaction::reset_transaction,
        transaction::set_account,
        transaction::set_transactions_page,
        transaction::next_transactions_page,
        transaction::previous_transactions_page,
        transaction::get_location,
        transaction::open_location,
        transaction::location_back,
        transaction::location_forward,
        transaction::list_notifications
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            transaction::DelegationRequest,
            transaction::RewardsClaimRequest,
            transaction::SetPageRequest,
            transaction::SetAccountRequest,
            transaction::DeepLinkRequest,
            transaction::StepResponse,
            TransactionSnapshot,
            TransactionPhase,
            TransactionData,
            TxMsg,
            TxValue,
            TxRequestMetadata,
            Fee,
            Coin,
            PubKey,
            StdSignature,
            SignedTransactionBody,
            GasSettings,
            AccountInformation,
            ValidatorReward,
            PageCursor,
            Location,
            Notification,
            NotificationLevel
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Transaction", description = "Sign, broadcast and poll workflow"),
        (name = "History", description = "Transaction history paging")
    )
)]
struct ApiDoc;
