// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for Cosmos-SDK networks.
//!
//! This module provides functionality for:
//! - Building unsigned delegation and rewards claim transactions
//! - Signing through a signing device
//! - Broadcasting and polling through the network backend
//! - Normalizing node results across chain families

pub mod adapt;
pub mod client;
pub mod signing;
pub mod types;

pub use adapt::{adapt_raw_transaction_data, NormalizedTransaction};
pub use client::{
    BroadcastMode, BroadcastRequest, BroadcastResponse, NetworkAdapter, NetworkError,
    RawTransactionResult, RestNetworkAdapter, DEFAULT_REQUEST_TIMEOUT,
};
pub use signing::{
    create_cosmos_transaction_post_body, create_sign_message, encode_base64, DeviceError,
    LocalKeyDevice, SignedTransactionBody, SigningDevice,
};
pub use types::*;
