// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction workflow.
//!
//! - `state` - single-slot transaction state, actions and reducer
//! - `machine` - sign, broadcast and poll steps over the device and network
//! - `poll` - poll-result classification and re-poll delays
//! - `notify` - user-facing notifications
//! - `history` - transaction-history paging mirrored into the location

pub mod history;
pub mod machine;
pub mod notify;
pub mod poll;
pub mod state;

pub use history::{
    page_query, parse_page_query, sync_transactions_page, HistoryError, InMemoryHistory, Location,
    LocationHistory, PageCursor,
};
pub use machine::{Step, TransactionWorkflow, DEFAULT_DEVICE_TIMEOUT};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use poll::{classify_poll_result, PollOutcome, PollTiming};
pub use state::{
    AttemptId, ConfirmedTransaction, TransactionAction, TransactionPhase, TransactionSnapshot,
    TransactionState,
};
