// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `BACKEND_URL` | Network backend base URL | `http://localhost:9000/` |
//! | `BACKEND_TIMEOUT_SECS` | Per-request timeout towards the backend | `30` |
//! | `NETWORK` | Active network (`COSMOS`, `KAVA`, `TERRA`) | `COSMOS` |
//! | `ADDRESS` | Active account address | Optional |
//! | `LEDGER_KEY_PEM` | PEM key file for the software signing device | Optional |
//! | `DEVICE_TIMEOUT_SECS` | Time allowed per device call | `120` |
//! | `POLL_NOT_FOUND_DELAY_MS` | Re-poll delay while the transaction is not indexed | `1500` |
//! | `POLL_ERROR_DELAY_MS` | Re-poll delay after a failed poll | `2500` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::{network_by_name, NetworkDefinition, COSMOS, DEFAULT_REQUEST_TIMEOUT};
use crate::logging::LogFormat;
use crate::workflow::{PollTiming, DEFAULT_DEVICE_TIMEOUT};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Base URL of the network backend. Routes are `{base}/{network}/txs`.
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// Per-request timeout towards the backend. A silent node becomes a poll error.
pub const BACKEND_TIMEOUT_SECS_ENV: &str = "BACKEND_TIMEOUT_SECS";

pub const NETWORK_ENV: &str = "NETWORK";
pub const ADDRESS_ENV: &str = "ADDRESS";

/// Path to a SEC1 or PKCS#8 PEM secp256k1 key.
///
/// When unset the service runs without a signing device and every sign
/// intent fails its precondition.
pub const LEDGER_KEY_PEM_ENV: &str = "LEDGER_KEY_PEM";

pub const DEVICE_TIMEOUT_SECS_ENV: &str = "DEVICE_TIMEOUT_SECS";
pub const POLL_NOT_FOUND_DELAY_MS_ENV: &str = "POLL_NOT_FOUND_DELAY_MS";
pub const POLL_ERROR_DELAY_MS_ENV: &str = "POLL_ERROR_DELAY_MS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9000/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid bind address: {0}")]
    BindAddress(String),
}

/// Settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub backend_timeout: Duration,
    pub network: NetworkDefinition,
    pub address: Option<String>,
    pub ledger_key_pem: Option<PathBuf>,
    pub device_timeout: Duration,
    pub poll_timing: PollTiming,
    pub log_format: LogFormat,
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Resolve settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let network = match lookup(NETWORK_ENV) {
            Some(name) => network_by_name(&name).map_err(|_| ConfigError::Invalid {
                name: NETWORK_ENV,
                value: name,
            })?,
            None => COSMOS,
        };

        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                value,
            })?,
            None => LogFormat::default(),
        };

        let defaults = PollTiming::default();
        let poll_timing = PollTiming {
            not_found_delay: parse_var::<u64>(&lookup, POLL_NOT_FOUND_DELAY_MS_ENV)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.not_found_delay),
            error_delay: parse_var::<u64>(&lookup, POLL_ERROR_DELAY_MS_ENV)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.error_delay),
        };

        Ok(Self {
            host: lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, PORT_ENV)?.unwrap_or(DEFAULT_PORT),
            backend_url: lookup(BACKEND_URL_ENV).unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            backend_timeout: parse_var::<u64>(&lookup, BACKEND_TIMEOUT_SECS_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            network,
            address: lookup(ADDRESS_ENV),
            ledger_key_pem: lookup(LEDGER_KEY_PEM_ENV).map(PathBuf::from),
            device_timeout: parse_var::<u64>(&lookup, DEVICE_TIMEOUT_SECS_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEVICE_TIMEOUT),
            poll_timing,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::BindAddress(raw))
    }
}
