// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Adaptation of raw node transaction results into a network-agnostic record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::client::RawTransactionResult;
use super::types::{ChainFamily, Coin, NetworkDefinition};

/// One message of a normalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    /// Message type without its module prefix (e.g. `MsgDelegate`)
    pub message_type: String,
    /// Original amino type (e.g. `cosmos-sdk/MsgDelegate`)
    pub raw_type: String,
    pub value: Value,
}

/// Per-message execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedLog {
    pub msg_index: u64,
    pub success: bool,
    pub log: String,
}

/// Network-agnostic transaction record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTransaction {
    pub hash: String,
    pub height: Option<u64>,
    pub chain_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub gas_wanted: Option<u64>,
    pub gas_used: Option<u64>,
    pub memo: String,
    pub fees: Vec<Coin>,
    pub messages: Vec<NormalizedMessage>,
    pub logs: Vec<NormalizedLog>,
}

impl ChainFamily {
    /// Strip the module prefix from an amino message type.
    pub fn message_type(&self, raw_type: &str) -> String {
        match self {
            ChainFamily::CosmosSdk => raw_type
                .strip_prefix("cosmos-sdk/")
                .unwrap_or(raw_type)
                .to_string(),
            ChainFamily::Terra => raw_type
                .split_once('/')
                .map(|(_, name)| name)
                .unwrap_or(raw_type)
                .to_string(),
        }
    }
}

/// Convert a raw poll result into a [`NormalizedTransaction`].
///
/// Missing fields default instead of failing; the poll step has already
/// classified the result by the time this runs.
pub fn adapt_raw_transaction_data(
    raw: &RawTransactionResult,
    network: &NetworkDefinition,
) -> NormalizedTransaction {
    // Some nodes return the bare StdTx body, others the amino wrapper
    let body = raw
        .tx
        .as_ref()
        .map(|tx| tx.get("value").unwrap_or(tx))
        .cloned()
        .unwrap_or(Value::Null);

    let messages = body
        .get("msg")
        .and_then(Value::as_array)
        .map(|msgs| {
            msgs.iter()
                .map(|msg| {
                    let raw_type = msg
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    NormalizedMessage {
                        message_type: network.family.message_type(&raw_type),
                        raw_type,
                        value: msg.get("value").cloned().unwrap_or(Value::Null),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let fees = body
        .get("fee")
        .and_then(|fee| fee.get("amount"))
        .cloned()
        .and_then(|amount| serde_json::from_value::<Vec<Coin>>(amount).ok())
        .unwrap_or_default();

    let memo = body
        .get("memo")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let logs = raw
        .logs
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, log)| NormalizedLog {
            msg_index: log.msg_index.unwrap_or(index as u64),
            success: log.success,
            log: log.log.clone(),
        })
        .collect();

    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    NormalizedTransaction {
        hash: raw.txhash.clone().unwrap_or_default(),
        height: raw.height,
        chain_id: network.chain_id.to_string(),
        timestamp,
        gas_wanted: raw.gas_wanted,
        gas_used: raw.gas_used,
        memo,
        fees,
        messages,
        logs,
    }
}
