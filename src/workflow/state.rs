// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-slot transaction state and its reducer.
//!
//! Exactly one transaction attempt occupies the state at a time. Each
//! attempt is tagged with a fresh [`AttemptId`] when it begins so that
//! results of a superseded attempt can be recognised and dropped.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::history::PageCursor;
use crate::blockchain::{NetworkDefinition, NormalizedTransaction, SignedTransactionBody, TransactionData};

/// Identifier of one sign/broadcast/poll cycle.
pub type AttemptId = Uuid;

/// Lifecycle phase of the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    Idle,
    Signing,
    Signed,
    Broadcasting,
    Broadcast,
    Polling,
    Confirmed,
    Failed,
}

impl TransactionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// A transaction that the network reported as successful.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedTransaction {
    pub height: u64,
    pub transaction: NormalizedTransaction,
}

/// Actions produced by the workflow steps and applied by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    SignTransaction,
    SignTransactionSuccess(SignedTransactionBody),
    SignTransactionFailure,
    BroadcastTransaction,
    BroadcastTransactionSuccess(String),
    BroadcastTransactionFailure,
    PollForTransaction,
    TransactionConfirmed(ConfirmedTransaction),
    TransactionFailed,
}

impl TransactionAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignTransaction => "sign_transaction",
            Self::SignTransactionSuccess(_) => "sign_transaction_success",
            Self::SignTransactionFailure => "sign_transaction_failure",
            Self::BroadcastTransaction => "broadcast_transaction",
            Self::BroadcastTransactionSuccess(_) => "broadcast_transaction_success",
            Self::BroadcastTransactionFailure => "broadcast_transaction_failure",
            Self::PollForTransaction => "poll_for_transaction",
            Self::TransactionConfirmed(_) => "transaction_confirmed",
            Self::TransactionFailed => "transaction_failed",
        }
    }
}

/// Workflow state container. The presentation layer only reads snapshots.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub attempt: AttemptId,
    pub phase: TransactionPhase,
    pub transaction_data: Option<TransactionData>,
    pub post_body: Option<SignedTransactionBody>,
    pub transaction_hash: Option<String>,
    pub confirmed: Option<ConfirmedTransaction>,
    pub network: NetworkDefinition,
    pub address: Option<String>,
    pub transactions_page: PageCursor,
}

impl TransactionState {
    pub fn new(network: NetworkDefinition, address: Option<String>) -> Self {
        Self {
            attempt: Uuid::new_v4(),
            phase: TransactionPhase::Idle,
            transaction_data: None,
            post_body: None,
            transaction_hash: None,
            confirmed: None,
            network,
            address,
            transactions_page: PageCursor::default(),
        }
    }

    fn clear_cycle(&mut self) -> AttemptId {
        self.attempt = Uuid::new_v4();
        self.phase = TransactionPhase::Idle;
        self.post_body = None;
        self.transaction_hash = None;
        self.confirmed = None;
        self.attempt
    }

    /// Start a new cycle with fresh transaction data.
    pub fn begin(&mut self, data: TransactionData) -> AttemptId {
        let attempt = self.clear_cycle();
        self.transaction_data = Some(data);
        attempt
    }

    /// Abandon the current cycle.
    pub fn reset(&mut self) -> AttemptId {
        self.transaction_data = None;
        self.clear_cycle()
    }

    pub fn apply(&mut self, action: TransactionAction) {
        match action {
            TransactionAction::SignTransaction => self.phase = TransactionPhase::Signing,
            TransactionAction::SignTransactionSuccess(body) => {
                self.post_body = Some(body);
                self.phase = TransactionPhase::Signed;
            }
            // Signing can be retried
            TransactionAction::SignTransactionFailure => self.phase = TransactionPhase::Idle,
            TransactionAction::BroadcastTransaction => self.phase = TransactionPhase::Broadcasting,
            TransactionAction::BroadcastTransactionSuccess(hash) => {
                self.transaction_hash = Some(hash);
                self.phase = TransactionPhase::Broadcast;
            }
            TransactionAction::BroadcastTransactionFailure => self.phase = TransactionPhase::Failed,
            TransactionAction::PollForTransaction => self.phase = TransactionPhase::Polling,
            TransactionAction::TransactionConfirmed(confirmed) => {
                self.confirmed = Some(confirmed);
                self.phase = TransactionPhase::Confirmed;
            }
            TransactionAction::TransactionFailed => self.phase = TransactionPhase::Failed,
        }
    }
}

/// Read-only view of the state for the presentation layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionSnapshot {
    pub attempt: Uuid,
    pub phase: TransactionPhase,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_data: Option<TransactionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_body: Option<SignedTransactionBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub confirmed_transaction: Option<NormalizedTransaction>,
    pub transactions_page: PageCursor,
}

impl From<&TransactionState> for TransactionSnapshot {
    fn from(state: &TransactionState) -> Self {
        Self {
            attempt: state.attempt,
            phase: state.phase,
            network: state.network.name.to_string(),
            address: state.address.clone(),
            transaction_data: state.transaction_data.clone(),
            post_body: state.post_body.clone(),
            transaction_hash: state.transaction_hash.clone(),
            confirmed_height: state.confirmed.as_ref().map(|c| c.height),
            confirmed_transaction: state.confirmed.as_ref().map(|c| c.transaction.clone()),
            transactions_page: state.transactions_page,
        }
    }
}
