// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Poll-result classification and re-poll timing.

use std::time::Duration;

use crate::blockchain::RawTransactionResult;

/// Delay before re-polling a transaction the node has not indexed yet.
pub const DEFAULT_NOT_FOUND_DELAY: Duration = Duration::from_millis(1500);

/// Delay before re-polling after the poll call itself failed.
pub const DEFAULT_ERROR_DELAY: Duration = Duration::from_millis(2500);

/// Fixed re-poll delays. Polling has no attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub not_found_delay: Duration,
    pub error_delay: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            not_found_delay: DEFAULT_NOT_FOUND_DELAY,
            error_delay: DEFAULT_ERROR_DELAY,
        }
    }
}

/// Why a transaction failed on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    OutOfGas,
    Unknown,
}

/// Classified poll response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not indexed yet; poll again
    NotFoundYet,
    Confirmed { height: u64 },
    Failed(FailureReason),
}

/// A response that fits none of the known shapes. Treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResult {
    #[error("successful result without a block height")]
    MissingHeight,

    #[error("result has neither a successful log nor a raw log")]
    MissingRawLog,
}

/// Classify one poll response.
pub fn classify_poll_result(raw: &RawTransactionResult) -> Result<PollOutcome, MalformedResult> {
    if raw
        .error
        .as_deref()
        .is_some_and(|error| error.contains("not found"))
    {
        return Ok(PollOutcome::NotFoundYet);
    }

    let succeeded = raw
        .logs
        .as_deref()
        .and_then(|logs| logs.first())
        .is_some_and(|log| log.success);

    if succeeded {
        return raw
            .height
            .map(|height| PollOutcome::Confirmed { height })
            .ok_or(MalformedResult::MissingHeight);
    }

    let raw_log = raw.raw_log.as_deref().ok_or(MalformedResult::MissingRawLog)?;
    if raw_log.contains("out of gas") {
        Ok(PollOutcome::Failed(FailureReason::OutOfGas))
    } else {
        Ok(PollOutcome::Failed(FailureReason::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::RawLog;

    fn log(success: bool) -> RawLog {
        RawLog {
            msg_index: Some(0),
            success,
            log: String::new(),
        }
    }

    #[test]
    fn not_found_is_transient() {
        let raw = RawTransactionResult {
            error: Some("tx (ABC) not found".to_string()),
            ..Default::default()
        };
        assert_eq!(classify_poll_result(&raw), Ok(PollOutcome::NotFoundYet));
    }

    #[test]
    fn successful_first_log_confirms() {
        let raw = RawTransactionResult {
            logs: Some(vec![log(true)]),
            height: Some(4200),
            ..Default::default()
        };
        assert_eq!(
            classify_poll_result(&raw),
            Ok(PollOutcome::Confirmed { height: 4200 })
        );
    }

    #[test]
    fn out_of_gas_is_classified() {
        let raw = RawTransactionResult {
            logs: Some(vec![log(false)]),
            raw_log: Some("out of gas in location x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            classify_poll_result(&raw),
            Ok(PollOutcome::Failed(FailureReason::OutOfGas))
        );
    }

    #[test]
    fn other_failures_are_unknown() {
        let raw = RawTransactionResult {
            raw_log: Some("insufficient account funds".to_string()),
            ..Default::default()
        };
        assert_eq!(
            classify_poll_result(&raw),
            Ok(PollOutcome::Failed(FailureReason::Unknown))
        );
    }

    #[test]
    fn shapeless_results_are_malformed() {
        let raw = RawTransactionResult {
            error: Some("internal error".to_string()),
            ..Default::default()
        };
        assert_eq!(classify_poll_result(&raw), Err(MalformedResult::MissingRawLog));

        let raw = RawTransactionResult {
            logs: Some(vec![log(true)]),
            ..Default::default()
        };
        assert_eq!(classify_poll_result(&raw), Err(MalformedResult::MissingHeight));
    }

    #[test]
    fn default_timing_matches_fixed_delays() {
        let timing = PollTiming::default();
        assert_eq!(timing.not_found_delay, Duration::from_millis(1500));
        assert_eq!(timing.error_delay, Duration::from_millis(2500));
    }
}
