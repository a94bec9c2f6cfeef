// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction signing for Cosmos-SDK networks.
//!
//! The signing device is an external capability: the workflow only asks it
//! for a signature over the canonical sign bytes and for its public key.
//! `LocalKeyDevice` is a software implementation backed by a PEM key, used
//! for development and integration environments.

use std::path::Path;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use k256::{
    ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey},
    SecretKey,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::types::{PubKey, StdSignature, TransactionData, TxValue};

/// Amino type of a compressed secp256k1 public key.
pub const PUB_KEY_TYPE: &str = "tendermint/PubKeySecp256k1";

/// Errors reported by a signing device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Signing rejected on device: {0}")]
    Rejected(String),

    #[error("Device did not respond in time")]
    Timeout,

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
}

/// Hardware-wallet capability used by the transaction workflow.
#[async_trait]
pub trait SigningDevice: Send + Sync {
    /// Sign the canonical sign bytes of a transaction.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DeviceError>;

    /// Public key matching the signing key.
    async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError>;
}

/// Signed `StdTx` ready for broadcast. Built once per successful sign step.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SignedTransactionBody {
    #[serde(rename = "type")]
    msg_type: String,
    value: TxValue,
}

impl SignedTransactionBody {
    /// Amino type tag of the transaction.
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Transaction body including its signature. This is what gets broadcast.
    pub fn value(&self) -> &TxValue {
        &self.value
    }

    /// Base64 signature.
    pub fn signature(&self) -> Option<&str> {
        self.value.signatures.first().map(|s| s.signature.as_str())
    }

    /// Base64 public key.
    pub fn public_key(&self) -> Option<&str> {
        self.value.signatures.first().map(|s| s.pub_key.value.as_str())
    }
}

// serde_json::Map is only ordered while the `preserve_order` feature is off,
// and any crate in the build may turn it on. Sign bytes must be sorted either way.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Canonical amino sign document: sorted keys, no whitespace.
pub fn create_sign_message(data: &TransactionData) -> Result<String, serde_json::Error> {
    let value = &data.tx_msg.value;
    let meta = &data.tx_request_metadata;

    let doc = json!({
        "account_number": meta.account_number,
        "chain_id": meta.chain_id,
        "fee": serde_json::to_value(&value.fee)?,
        "memo": value.memo,
        "msgs": value.msg,
        "sequence": meta.sequence,
    });

    serde_json::to_string(&sort_keys(doc))
}

/// Attach a base64 signature and public key to the unsigned transaction.
pub fn create_cosmos_transaction_post_body(
    data: &TransactionData,
    signature: String,
    public_key: String,
) -> SignedTransactionBody {
    let mut value = data.tx_msg.value.clone();
    value.signatures = vec![StdSignature {
        signature,
        pub_key: PubKey {
            key_type: PUB_KEY_TYPE.to_string(),
            value: public_key,
        },
    }];

    SignedTransactionBody {
        msg_type: data.tx_msg.msg_type.clone(),
        value,
    }
}

/// Base64 encoding used for signatures and public keys.
pub fn encode_base64(bytes: &[u8]) -> String {
    Base64::encode_string(bytes)
}

/// Software signing device holding a secp256k1 key.
pub struct LocalKeyDevice {
    signing_key: SigningKey,
}

impl LocalKeyDevice {
    /// Build a device from a secret key.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        Self {
            signing_key: SigningKey::from(secret_key),
        }
    }

    /// Parse a SEC1 or PKCS#8 PEM private key.
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, DeviceError> {
        let pem_str = std::str::from_utf8(pem_bytes)
            .map_err(|e| DeviceError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

        let pem = pem::parse(pem_str)
            .map_err(|e| DeviceError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

        let secret_key = SecretKey::from_sec1_der(pem.contents())
            .or_else(|_| {
                use k256::pkcs8::DecodePrivateKey;
                SecretKey::from_pkcs8_der(pem.contents())
            })
            .map_err(|e| DeviceError::InvalidPrivateKey(format!("Invalid key format: {}", e)))?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Read and parse a PEM private key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            DeviceError::InvalidPrivateKey(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_pem(&bytes)
    }
}

#[async_trait]
impl SigningDevice for LocalKeyDevice {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let digest = Sha256::digest(message);
        let signature: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|e| DeviceError::Rejected(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError> {
        Ok(self
            .signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec())
    }
}
