// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network adapter for broadcasting and polling Cosmos-SDK transactions.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::types::{NetworkDefinition, TxValue};

/// Broadcast mode understood by the node's REST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Return once the node accepted the transaction into its mempool
    #[default]
    Async,
    /// Return after `CheckTx`
    Sync,
    /// Return after block inclusion (debugging only)
    Block,
}

/// Broadcast request body: `{"tx": ..., "mode": "async"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastRequest {
    pub tx: TxValue,
    pub mode: BroadcastMode,
}

impl BroadcastRequest {
    /// Asynchronous broadcast of a signed transaction body.
    pub fn new(tx: TxValue) -> Self {
        Self {
            tx,
            mode: BroadcastMode::Async,
        }
    }
}

/// Node response to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastResponse {
    pub txhash: String,
}

/// Per-message log entry of a transaction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    #[serde(default, deserialize_with = "string_or_number")]
    pub msg_index: Option<u64>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub log: String,
}

/// Transaction lookup result as returned by the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransactionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<RawLog>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_log: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txhash: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub gas_wanted: Option<u64>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Errors that can occur while talking to the network backend.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable response ({status}): {message}")]
    Decode { status: u16, message: String },
}

/// Chain RPC capability used by the transaction workflow.
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    /// Submit a signed transaction.
    async fn broadcast(
        &self,
        request: &BroadcastRequest,
        network: &NetworkDefinition,
    ) -> Result<BroadcastResponse, NetworkError>;

    /// Look a transaction up by hash.
    async fn poll(
        &self,
        tx_hash: &str,
        network: &NetworkDefinition,
    ) -> Result<RawTransactionResult, NetworkError>;
}

/// Default per-request timeout of the REST adapter.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST adapter talking to `{base}/{network}/txs`.
///
/// Every request is bounded by a timeout; a node that never answers
/// surfaces as [`NetworkError::Http`] and feeds the poll retry.
pub struct RestNetworkAdapter {
    http: reqwest::Client,
    base_url: url::Url,
}

impl RestNetworkAdapter {
    /// Create an adapter for the given backend base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let mut base_url: url::Url = base_url
            .parse()
            .map_err(|e: url::ParseError| NetworkError::InvalidUrl(e.to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(NetworkError::InvalidUrl(base_url.to_string()));
        }
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http, base_url })
    }

    fn txs_url(&self, network: &NetworkDefinition) -> Result<url::Url, NetworkError> {
        self.base_url
            .join(&format!("{}/txs", network.name.to_ascii_lowercase()))
            .map_err(|e| NetworkError::InvalidUrl(e.to_string()))
    }

    fn tx_url(&self, network: &NetworkDefinition, tx_hash: &str) -> Result<url::Url, NetworkError> {
        let mut url = self.txs_url(network)?;
        url.path_segments_mut()
            .map_err(|_| NetworkError::InvalidUrl(self.base_url.to_string()))?
            .push(tx_hash);
        Ok(url)
    }
}

#[async_trait]
impl NetworkAdapter for RestNetworkAdapter {
    async fn broadcast(
        &self,
        request: &BroadcastRequest,
        network: &NetworkDefinition,
    ) -> Result<BroadcastResponse, NetworkError> {
        let url = self.txs_url(network)?;
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| NetworkError::Decode {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }

    async fn poll(
        &self,
        tx_hash: &str,
        network: &NetworkDefinition,
    ) -> Result<RawTransactionResult, NetworkError> {
        let url = self.tx_url(network, tx_hash)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Not-yet-indexed transactions come back as a JSON error with a non-2xx status
        serde_json::from_str(&body).map_err(|e| NetworkError::Decode {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(u64),
        String(String),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
