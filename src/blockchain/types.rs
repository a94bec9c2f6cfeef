// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types, network definitions and unsigned transaction builders.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Result adaptation family for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Stock Cosmos-SDK amino types (`cosmos-sdk/MsgSend`, ...)
    CosmosSdk,
    /// Terra columbus types (`bank/MsgSend`, `market/MsgSwap`, ...)
    Terra,
}

/// Cosmos-SDK network configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Network name, also used as the backend route segment
    pub name: &'static str,
    /// Chain ID
    pub chain_id: &'static str,
    /// Staking denomination
    pub denom: &'static str,
    /// Display name
    pub descriptor: &'static str,
    /// Result adaptation family
    pub family: ChainFamily,
}

/// Cosmos Hub.
pub const COSMOS: NetworkDefinition = NetworkDefinition {
    name: "COSMOS",
    chain_id: "cosmoshub-3",
    denom: "uatom",
    descriptor: "Cosmos Hub",
    family: ChainFamily::CosmosSdk,
};

/// Kava.
pub const KAVA: NetworkDefinition = NetworkDefinition {
    name: "KAVA",
    chain_id: "kava-3",
    denom: "ukava",
    descriptor: "Kava",
    family: ChainFamily::CosmosSdk,
};

/// Terra.
pub const TERRA: NetworkDefinition = NetworkDefinition {
    name: "TERRA",
    chain_id: "columbus-3",
    denom: "uluna",
    descriptor: "Terra",
    family: ChainFamily::Terra,
};

/// Networks whose transactions can be signed on the device.
pub const SUPPORTED_NETWORKS: [NetworkDefinition; 3] = [COSMOS, KAVA, TERRA];

/// Resolve a network by name (case-insensitive).
pub fn network_by_name(raw: &str) -> Result<NetworkDefinition, TransactionBuildError> {
    let wanted = raw.trim();
    SUPPORTED_NETWORKS
        .iter()
        .find(|network| network.name.eq_ignore_ascii_case(wanted))
        .copied()
        .ok_or_else(|| TransactionBuildError::UnknownNetwork(raw.to_string()))
}

/// A denomination/amount pair. Amounts are decimal strings in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// Transaction fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas: String,
}

/// Public key attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

/// Signature entry of a signed `StdTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StdSignature {
    pub signature: String,
    pub pub_key: PubKey,
}

/// Body of a `StdTx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TxValue {
    #[schema(value_type = Vec<Object>)]
    pub msg: Vec<Value>,
    pub fee: Fee,
    /// Empty until the transaction is signed
    #[serde(default, deserialize_with = "null_as_empty")]
    pub signatures: Vec<StdSignature>,
    #[serde(default)]
    pub memo: String,
}

/// Amino-wrapped `StdTx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TxMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub value: TxValue,
}

/// Account, chain and fee metadata needed to sign a `StdTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TxRequestMetadata {
    pub account_number: String,
    pub chain_id: String,
    pub fees: String,
    pub from: String,
    #[serde(default)]
    pub generate_only: bool,
    pub sequence: String,
}

/// Unsigned payload owned by one sign/broadcast cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub tx_msg: TxMsg,
    pub tx_request_metadata: TxRequestMetadata,
}

/// Auth account fields used for request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountInformation {
    pub account_number: String,
    pub sequence: String,
}

/// Gas limit and price, both integer strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GasSettings {
    pub gas_amount: String,
    pub gas_price: String,
}

/// Pending rewards for one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidatorReward {
    pub validator_address: String,
    #[serde(default)]
    pub reward: Vec<Coin>,
}

/// Errors raised while assembling unsigned transactions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionBuildError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid {field}: {value:?} is not a non-negative integer")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Fee overflow for gas {gas_amount} at price {gas_price}")]
    FeeOverflow { gas_amount: String, gas_price: String },

    #[error("No validator with pending rewards was selected")]
    NoRewards,
}

/// `StdTx` type tag.
pub const STD_TX_TYPE: &str = "cosmos-sdk/StdTx";

const MSG_DELEGATE: &str = "cosmos-sdk/MsgDelegate";
const MSG_WITHDRAW_REWARD: &str = "cosmos-sdk/MsgWithdrawDelegationReward";

fn parse_integer(field: &'static str, value: &str) -> Result<u128, TransactionBuildError> {
    let invalid = || TransactionBuildError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<u128>().map_err(|_| invalid())
}

/// Total fee: gas amount multiplied by gas price.
pub fn compute_fees(gas: &GasSettings) -> Result<String, TransactionBuildError> {
    let gas_amount = parse_integer("gas_amount", &gas.gas_amount)?;
    let gas_price = parse_integer("gas_price", &gas.gas_price)?;
    gas_amount
        .checked_mul(gas_price)
        .map(|fees| fees.to_string())
        .ok_or_else(|| TransactionBuildError::FeeOverflow {
            gas_amount: gas.gas_amount.clone(),
            gas_price: gas.gas_price.clone(),
        })
}

fn fee_for(denom: &str, gas: &GasSettings) -> Result<Fee, TransactionBuildError> {
    Ok(Fee {
        amount: vec![Coin {
            denom: denom.to_string(),
            amount: compute_fees(gas)?,
        }],
        gas: gas.gas_amount.clone(),
    })
}

fn std_tx(msg: Vec<Value>, fee: Fee) -> TxMsg {
    TxMsg {
        msg_type: STD_TX_TYPE.to_string(),
        value: TxValue {
            msg,
            fee,
            signatures: Vec::new(),
            memo: String::new(),
        },
    }
}

/// Build the signing metadata for an account on a network.
pub fn create_transaction_request_metadata(
    address: &str,
    gas: &GasSettings,
    account: &AccountInformation,
    network: &NetworkDefinition,
) -> Result<TxRequestMetadata, TransactionBuildError> {
    parse_integer("account_number", &account.account_number)?;
    parse_integer("sequence", &account.sequence)?;

    Ok(TxRequestMetadata {
        account_number: account.account_number.clone(),
        chain_id: network.chain_id.to_string(),
        fees: compute_fees(gas)?,
        from: address.to_string(),
        generate_only: false,
        sequence: account.sequence.clone(),
    })
}

/// Build an unsigned delegation `StdTx`.
pub fn create_delegation_transaction_message(
    address: &str,
    validator_operator_address: &str,
    amount: &str,
    denom: &str,
    gas: &GasSettings,
) -> Result<TxMsg, TransactionBuildError> {
    parse_integer("amount", amount)?;

    let msg = json!({
        "type": MSG_DELEGATE,
        "value": {
            "delegator_address": address,
            "validator_address": validator_operator_address,
            "amount": { "denom": denom, "amount": amount },
        },
    });

    Ok(std_tx(vec![msg], fee_for(denom, gas)?))
}

/// Build an unsigned rewards claim `StdTx` with one withdraw message per
/// validator that has a non-zero reward.
pub fn create_rewards_claim_transaction(
    address: &str,
    denom: &str,
    gas: &GasSettings,
    selected_rewards: &[ValidatorReward],
) -> Result<TxMsg, TransactionBuildError> {
    let msgs: Vec<Value> = selected_rewards
        .iter()
        .filter(|reward| {
            reward.reward.iter().any(|coin| {
                coin.amount
                    .chars()
                    .any(|c| c.is_ascii_digit() && c != '0')
            })
        })
        .map(|reward| {
            json!({
                "type": MSG_WITHDRAW_REWARD,
                "value": {
                    "delegator_address": address,
                    "validator_address": reward.validator_address,
                },
            })
        })
        .collect();

    if msgs.is_empty() {
        return Err(TransactionBuildError::NoRewards);
    }

    Ok(std_tx(msgs, fee_for(denom, gas)?))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
