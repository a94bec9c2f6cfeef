// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger Transaction Service
//!
//! Drives the sign → broadcast → poll cycle of Cosmos-SDK staking
//! transactions (delegations and rewards claims) through a signing device
//! and a network backend, and exposes the cycle over HTTP.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - transaction building, signing, network backend, result normalization
//! - `workflow` - transaction state machine, notifications and history paging
//! - `config` - environment configuration
//! - `logging` - tracing subscriber setup

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod workflow;
