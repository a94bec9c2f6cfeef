// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transient user-facing notifications (toasts).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;

pub const MISSING_SIGN_INPUTS: &str =
    "Unable to sign transaction! Ledger or transaction data was missing.";
pub const DEVICE_UNREACHABLE: &str =
    "Could not access Ledger. Is your device still connected and unlocked?";
pub const NO_TRANSACTION_DATA: &str = "No transaction data exists!";
pub const NO_TRANSACTION_HASH: &str = "No transaction hash exists!";
pub const BROADCAST_MAY_HAVE_SUCCEEDED: &str = "Failed to send transaction. Please note, the transaction may have succeeded. Please wait a few seconds and refresh your browser before trying again.";
pub const INSUFFICIENT_GAS: &str = "Transaction failed because of insufficient gas! Please try again with adjusted gas settings.";

/// Text of the generic on-chain failure toast.
pub fn unknown_error_message(received: &str) -> String {
    format!("An unknown error occurred, received: {received}. Please refresh and try again.")
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Warning,
    Danger,
}

/// A transient message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Fans notifications out to subscribers and keeps a bounded backlog.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    recent: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Receive notifications published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Most recent notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn publish(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                tracing::info!(message = %notification.message, "Notification")
            }
            NotificationLevel::Warning | NotificationLevel::Danger => {
                tracing::warn!(
                    level = ?notification.level,
                    message = %notification.message,
                    "Notification"
                )
            }
        }

        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(notification.clone());
        }

        // No subscribers is fine
        let _ = self.sender.send(notification);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.publish(Notification::new(NotificationLevel::Warning, message));
    }

    pub fn danger(&self, message: impl Into<String>) {
        self.publish(Notification::new(NotificationLevel::Danger, message));
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_bounded_backlog() {
        let notifier = Notifier::new(2);
        notifier.warn("one");
        notifier.danger("two");
        notifier.publish(Notification::new(NotificationLevel::Success, "three"));

        let recent = notifier.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "two");
        assert_eq!(recent[1].level, NotificationLevel::Success);
    }

    #[tokio::test]
    async fn subscribers_receive_published_notifications() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.danger(INSUFFICIENT_GAS);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, NotificationLevel::Danger);
        assert!(received.message.contains("insufficient gas"));
    }

    #[test]
    fn unknown_error_includes_raw_result() {
        let message = unknown_error_message(r#"{"raw_log":"boom"}"#);
        assert!(message.contains(r#"{"raw_log":"boom"}"#));
    }
}
