// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Workflow
//!
//! Sequential sign → broadcast → poll state machine over a signing device
//! and a network adapter.
//!
//! ## Steps
//!
//! 1. **Sign**: requires a device and transaction data; asks the device for a
//!    signature over the canonical sign bytes and for its public key, then
//!    assembles the signed post body. Device errors surface as a single
//!    "device unreachable" warning and leave the cycle retryable.
//! 2. **Broadcast**: submits the signed body in `async` mode. A failure is
//!    reported as possibly-succeeded and is never retried automatically.
//! 3. **Poll**: queries the transaction by hash until the network reports a
//!    terminal result. "Not found" and adapter errors re-poll after fixed
//!    delays with no attempt cap.
//!
//! ## Stale results
//!
//! Every step captures the attempt id before it suspends and applies its
//! result only if that attempt is still current. A poll loop whose attempt
//! has been superseded stops at its next check.
//!
//! ## Detached steps
//!
//! Sign and broadcast run on their own tasks. A caller that goes away while
//! the device or network is still answering does not cancel the step, so the
//! workflow always leaves Signing and Broadcasting. Polling after a
//! successful broadcast is started by the broadcast task itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::history::{
    parse_page_query, sync_transactions_page, HistoryError, Location, LocationHistory, PageCursor,
};
use super::notify::{
    unknown_error_message, Notification, NotificationLevel, Notifier, BROADCAST_MAY_HAVE_SUCCEEDED,
    DEVICE_UNREACHABLE, INSUFFICIENT_GAS, MISSING_SIGN_INPUTS, NO_TRANSACTION_DATA,
    NO_TRANSACTION_HASH,
};
use super::poll::{classify_poll_result, FailureReason, PollOutcome, PollTiming};
use super::state::{
    AttemptId, ConfirmedTransaction, TransactionAction, TransactionPhase, TransactionSnapshot,
    TransactionState,
};
use crate::blockchain::{
    adapt_raw_transaction_data, create_cosmos_transaction_post_body, create_sign_message,
    encode_base64, BroadcastRequest, DeviceError, NetworkAdapter, NetworkDefinition,
    SignedTransactionBody, SigningDevice, TransactionData,
};

/// Default time allowed for one device call, including user confirmation.
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(120);

/// The action a step produced, tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub attempt: AttemptId,
    pub action: TransactionAction,
}

#[derive(Debug, thiserror::Error)]
enum SignError {
    #[error("cannot build sign message: {0}")]
    Message(#[from] serde_json::Error),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Transaction workflow over one shared state slot.
#[derive(Clone)]
pub struct TransactionWorkflow {
    device: Option<Arc<dyn SigningDevice>>,
    network: Arc<dyn NetworkAdapter>,
    history: Arc<dyn LocationHistory>,
    notifier: Notifier,
    state: Arc<RwLock<TransactionState>>,
    timing: PollTiming,
    device_timeout: Duration,
}

impl TransactionWorkflow {
    /// Create a workflow with no signing device attached.
    pub fn new(
        network: Arc<dyn NetworkAdapter>,
        history: Arc<dyn LocationHistory>,
        state: TransactionState,
    ) -> Self {
        Self {
            device: None,
            network,
            history,
            notifier: Notifier::default(),
            state: Arc::new(RwLock::new(state)),
            timing: PollTiming::default(),
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
        }
    }

    pub fn with_device(mut self, device: Arc<dyn SigningDevice>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_device_timeout(mut self, timeout: Duration) -> Self {
        self.device_timeout = timeout;
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn history(&self) -> &Arc<dyn LocationHistory> {
        &self.history
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub async fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot::from(&*self.state.read().await)
    }

    pub async fn current_state(&self) -> TransactionState {
        self.state.read().await.clone()
    }

    /// Start a new cycle, replacing any previous transaction data.
    pub async fn begin(&self, data: TransactionData) -> AttemptId {
        let mut state = self.state.write().await;
        let previous = state.attempt;
        if state.phase != TransactionPhase::Idle && !state.phase.is_terminal() {
            warn!(%previous, phase = ?state.phase, "Superseding an unfinished transaction cycle");
        }
        let attempt = state.begin(data);
        info!(%attempt, %previous, "Transaction cycle started");
        attempt
    }

    /// Abandon the current cycle and return to Idle.
    pub async fn reset(&self) -> AttemptId {
        let mut state = self.state.write().await;
        let attempt = state.reset();
        info!(%attempt, "Transaction cycle reset");
        attempt
    }

    /// Switch account or network. Abandons the current cycle if either changes.
    pub async fn set_account(&self, address: Option<String>, network: NetworkDefinition) {
        let mut state = self.state.write().await;
        if state.address != address || state.network != network {
            state.address = address;
            state.network = network;
            state.transactions_page = PageCursor::default();
            let attempt = state.reset();
            info!(%attempt, network = network.name, "Account changed");
        }
    }

    async fn dispatch(&self, attempt: AttemptId, action: TransactionAction) -> bool {
        let mut state = self.state.write().await;
        if state.attempt != attempt {
            debug!(
                %attempt,
                current = %state.attempt,
                action = action.name(),
                "Dropping result of superseded attempt"
            );
            return false;
        }
        debug!(%attempt, action = action.name(), "Dispatch");
        state.apply(action);
        true
    }

    async fn finish(
        &self,
        attempt: AttemptId,
        action: TransactionAction,
        notification: Option<Notification>,
    ) -> Option<Step> {
        if !self.dispatch(attempt, action.clone()).await {
            return None;
        }
        if let Some(notification) = notification {
            self.notifier.publish(notification);
        }
        Some(Step { attempt, action })
    }

    async fn request_signature(
        &self,
        device: &dyn SigningDevice,
        data: &TransactionData,
    ) -> Result<SignedTransactionBody, SignError> {
        let message = create_sign_message(data)?;

        let signature = tokio::time::timeout(self.device_timeout, device.sign(message.as_bytes()))
            .await
            .map_err(|_| DeviceError::Timeout)??;
        let public_key = tokio::time::timeout(self.device_timeout, device.get_public_key())
            .await
            .map_err(|_| DeviceError::Timeout)??;

        Ok(create_cosmos_transaction_post_body(
            data,
            encode_base64(&signature),
            encode_base64(&public_key),
        ))
    }

    async fn detached(step: &'static str, handle: JoinHandle<Option<Step>>) -> Option<Step> {
        match handle.await {
            Ok(step) => step,
            Err(e) => {
                error!(step, error = %e, "Workflow step task failed");
                None
            }
        }
    }

    /// Sign step. Returns `None` when the intent is ignored because the
    /// workflow is not Idle, or when the attempt was superseded meanwhile.
    ///
    /// Dropping the returned future does not cancel the device request.
    pub async fn sign(&self) -> Option<Step> {
        let workflow = self.clone();
        Self::detached("sign", tokio::spawn(async move { workflow.run_sign().await })).await
    }

    /// Broadcast step. Returns `None` when the intent is ignored.
    ///
    /// On success the poll loop is started in the background. Dropping the
    /// returned future cancels neither the broadcast nor the polling.
    pub async fn broadcast(&self) -> Option<Step> {
        let workflow = self.clone();
        Self::detached(
            "broadcast",
            tokio::spawn(async move { workflow.run_broadcast().await }),
        )
        .await
    }

    async fn run_sign(&self) -> Option<Step> {
        let (attempt, device, data) = {
            let mut state = self.state.write().await;
            if state.phase != TransactionPhase::Idle {
                debug!(attempt = %state.attempt, phase = ?state.phase, "Sign intent ignored");
                return None;
            }
            let attempt = state.attempt;

            match (self.device.clone(), state.transaction_data.clone()) {
                (Some(device), Some(data)) => {
                    state.apply(TransactionAction::SignTransaction);
                    (attempt, device, data)
                }
                (device, data) => {
                    warn!(
                        %attempt,
                        device = device.is_some(),
                        transaction_data = data.is_some(),
                        "Unable to sign transaction"
                    );
                    state.apply(TransactionAction::SignTransactionFailure);
                    drop(state);
                    self.notifier.warn(MISSING_SIGN_INPUTS);
                    return Some(Step {
                        attempt,
                        action: TransactionAction::SignTransactionFailure,
                    });
                }
            }
        };

        let (action, notification) = match self.request_signature(device.as_ref(), &data).await {
            Ok(body) => {
                info!(%attempt, "Transaction signed");
                (TransactionAction::SignTransactionSuccess(body), None)
            }
            Err(e) => {
                warn!(%attempt, error = %e, "Signing device unreachable");
                (
                    TransactionAction::SignTransactionFailure,
                    Some(Notification::new(NotificationLevel::Warning, DEVICE_UNREACHABLE)),
                )
            }
        };

        self.finish(attempt, action, notification).await
    }

    async fn run_broadcast(&self) -> Option<Step> {
        let (attempt, body, network) = {
            let mut state = self.state.write().await;
            let attempt = state.attempt;

            let Some(body) = state.post_body.clone() else {
                error!(%attempt, "Broadcast requested without a signed transaction");
                state.apply(TransactionAction::BroadcastTransactionFailure);
                drop(state);
                self.notifier.danger(NO_TRANSACTION_DATA);
                return Some(Step {
                    attempt,
                    action: TransactionAction::BroadcastTransactionFailure,
                });
            };

            if state.phase != TransactionPhase::Signed {
                debug!(%attempt, phase = ?state.phase, "Broadcast intent ignored");
                return None;
            }

            state.apply(TransactionAction::BroadcastTransaction);
            (attempt, body, state.network)
        };

        let request = BroadcastRequest::new(body.value().clone());
        debug!(%attempt, network = network.name, mode = ?request.mode, "Broadcasting transaction");

        let (action, notification) = match self.network.broadcast(&request, &network).await {
            Ok(response) => {
                info!(%attempt, tx_hash = %response.txhash, "Transaction broadcast");
                (TransactionAction::BroadcastTransactionSuccess(response.txhash), None)
            }
            Err(e) => {
                warn!(%attempt, error = %e, "Broadcast failed");
                (
                    TransactionAction::BroadcastTransactionFailure,
                    Some(Notification::new(
                        NotificationLevel::Danger,
                        BROADCAST_MAY_HAVE_SUCCEEDED,
                    )),
                )
            }
        };

        let step = self.finish(attempt, action, notification).await?;
        if let TransactionAction::BroadcastTransactionSuccess(_) = &step.action {
            // Ends on its own once resolved or superseded
            drop(self.spawn_polling(step.attempt));
        }
        Some(step)
    }

    /// Run the poll loop for `attempt` in the background.
    pub fn spawn_polling(&self, attempt: AttemptId) -> JoinHandle<Option<TransactionAction>> {
        let workflow = self.clone();
        tokio::spawn(async move { workflow.poll_until_resolved(attempt).await })
    }

    /// Poll until confirmed or failed. Returns `None` once the attempt is
    /// superseded.
    pub async fn poll_until_resolved(&self, attempt: AttemptId) -> Option<TransactionAction> {
        if !self
            .dispatch(attempt, TransactionAction::PollForTransaction)
            .await
        {
            return None;
        }

        loop {
            match self.poll_once(attempt).await? {
                TransactionAction::PollForTransaction => continue,
                terminal => return Some(terminal),
            }
        }
    }

    /// One poll attempt. Transient outcomes wait out their delay and yield
    /// [`TransactionAction::PollForTransaction`].
    pub async fn poll_once(&self, attempt: AttemptId) -> Option<TransactionAction> {
        let (hash, network) = {
            let state = self.state.read().await;
            if state.attempt != attempt {
                return None;
            }
            (state.transaction_hash.clone(), state.network)
        };

        let Some(hash) = hash else {
            error!(%attempt, "Poll requested without a transaction hash");
            return self
                .finish(
                    attempt,
                    TransactionAction::TransactionFailed,
                    Some(Notification::new(NotificationLevel::Danger, NO_TRANSACTION_HASH)),
                )
                .await
                .map(|step| step.action);
        };

        let (action, notification) = match self.network.poll(&hash, &network).await {
            Ok(raw) => match classify_poll_result(&raw) {
                Ok(PollOutcome::NotFoundYet) => {
                    debug!(%attempt, tx_hash = %hash, "Transaction not found, re-polling");
                    tokio::time::sleep(self.timing.not_found_delay).await;
                    (TransactionAction::PollForTransaction, None)
                }
                Ok(PollOutcome::Confirmed { height }) => {
                    info!(%attempt, tx_hash = %hash, height, "Transaction confirmed");
                    let transaction = adapt_raw_transaction_data(&raw, &network);
                    (
                        TransactionAction::TransactionConfirmed(ConfirmedTransaction {
                            height,
                            transaction,
                        }),
                        Some(Notification::new(
                            NotificationLevel::Success,
                            format!("Transaction confirmed at block height {height}."),
                        )),
                    )
                }
                Ok(PollOutcome::Failed(FailureReason::OutOfGas)) => {
                    warn!(%attempt, tx_hash = %hash, "Transaction ran out of gas");
                    (
                        TransactionAction::TransactionFailed,
                        Some(Notification::new(NotificationLevel::Danger, INSUFFICIENT_GAS)),
                    )
                }
                Ok(PollOutcome::Failed(FailureReason::Unknown)) => {
                    let received =
                        serde_json::to_string(&raw).unwrap_or_else(|_| format!("{raw:?}"));
                    warn!(%attempt, tx_hash = %hash, result = %received, "Transaction failed");
                    (
                        TransactionAction::TransactionFailed,
                        Some(Notification::new(
                            NotificationLevel::Danger,
                            unknown_error_message(&received),
                        )),
                    )
                }
                Err(e) => {
                    warn!(%attempt, tx_hash = %hash, error = %e, "Unexpected poll result, re-polling");
                    tokio::time::sleep(self.timing.error_delay).await;
                    (TransactionAction::PollForTransaction, None)
                }
            },
            Err(e) => {
                warn!(%attempt, tx_hash = %hash, error = %e, "Poll failed, re-polling");
                tokio::time::sleep(self.timing.error_delay).await;
                (TransactionAction::PollForTransaction, None)
            }
        };

        self.finish(attempt, action, notification)
            .await
            .map(|step| step.action)
    }

    /// Page-sync step: store the page and mirror it into the location.
    /// Never touches the transaction phase.
    pub async fn set_transactions_page(&self, page: u32) -> Result<Location, HistoryError> {
        let cursor = PageCursor::new(page)?;
        Ok(self.show_page(cursor).await)
    }

    pub async fn next_page(&self) -> Location {
        let cursor = self.state.read().await.transactions_page.next();
        self.show_page(cursor).await
    }

    /// Previous history page. Stays on page 1.
    pub async fn previous_page(&self) -> Location {
        let cursor = self.state.read().await.transactions_page.previous();
        self.show_page(cursor).await
    }

    async fn show_page(&self, cursor: PageCursor) -> Location {
        let address = {
            let mut state = self.state.write().await;
            state.transactions_page = cursor;
            state.address.clone().unwrap_or_default()
        };

        let location = sync_transactions_page(self.history.as_ref(), &address, cursor.page());
        debug!(page = cursor.page(), search = %location.search, "Transaction page synced");
        location
    }

    /// Open an `address=<a>&page=<p>` deep link on the active network.
    ///
    /// Switching to another address abandons the current cycle.
    pub async fn open_deep_link(&self, search: &str) -> Result<Location, HistoryError> {
        let (address, cursor) = parse_page_query(search)
            .filter(|(address, _)| !address.trim().is_empty())
            .ok_or_else(|| HistoryError::InvalidQuery(search.to_string()))?;

        let network = self.state.read().await.network;
        self.set_account(Some(address), network).await;
        Ok(self.show_page(cursor).await)
    }

    /// Step the location back and restore the page it encodes.
    pub async fn navigate_back(&self) -> Option<Location> {
        let location = self.history.back()?;
        self.restore_page(&location).await;
        Some(location)
    }

    /// Step the location forward and restore the page it encodes.
    pub async fn navigate_forward(&self) -> Option<Location> {
        let location = self.history.forward()?;
        self.restore_page(&location).await;
        Some(location)
    }

    async fn restore_page(&self, location: &Location) {
        // Locations without a page query leave the cursor alone
        if let Some((_, cursor)) = parse_page_query(&location.search) {
            self.state.write().await.transactions_page = cursor;
        }
    }

    /// Record whether the backend has results beyond the current page.
    pub async fn set_more_results(&self, more_results: bool) {
        let mut state = self.state.write().await;
        state.transactions_page = state.transactions_page.with_more_results(more_results);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::blockchain::{
        create_delegation_transaction_message, create_transaction_request_metadata,
        AccountInformation, BroadcastMode, BroadcastResponse, GasSettings, NetworkError,
        RawTransactionResult, COSMOS,
    };
    use crate::workflow::history::InMemoryHistory;

    const ADDRESS: &str = "cosmos1abc";

    struct MockDevice {
        signature: Vec<u8>,
        public_key: Vec<u8>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockDevice {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                signature: vec![1, 2, 3],
                public_key: vec![9, 9, 9],
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SigningDevice for MockDevice {
        async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, DeviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeviceError::Disconnected("usb".to_string()));
            }
            Ok(self.signature.clone())
        }

        async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.public_key.clone())
        }
    }

    enum Scripted {
        Result(RawTransactionResult),
        Error,
    }

    struct MockNetwork {
        broadcast_ok: bool,
        broadcast_delay: Duration,
        broadcasts: Mutex<Vec<BroadcastRequest>>,
        polls: Mutex<VecDeque<Scripted>>,
        poll_calls: AtomicUsize,
    }

    impl MockNetwork {
        fn new(polls: Vec<Scripted>) -> Arc<Self> {
            Self::slow(Duration::ZERO, polls)
        }

        fn slow(broadcast_delay: Duration, polls: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                broadcast_ok: true,
                broadcast_delay,
                broadcasts: Mutex::new(Vec::new()),
                polls: Mutex::new(polls.into()),
                poll_calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                broadcast_ok: false,
                broadcast_delay: Duration::ZERO,
                broadcasts: Mutex::new(Vec::new()),
                polls: Mutex::new(VecDeque::new()),
                poll_calls: AtomicUsize::new(0),
            })
        }

        fn poll_calls(&self) -> usize {
            self.poll_calls.load(Ordering::SeqCst)
        }

        fn broadcast_calls(&self) -> usize {
            self.broadcasts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NetworkAdapter for MockNetwork {
        async fn broadcast(
            &self,
            request: &BroadcastRequest,
            _network: &NetworkDefinition,
        ) -> Result<BroadcastResponse, NetworkError> {
            tokio::time::sleep(self.broadcast_delay).await;
            self.broadcasts.lock().unwrap().push(request.clone());
            if self.broadcast_ok {
                Ok(BroadcastResponse {
                    txhash: "ABC".to_string(),
                })
            } else {
                Err(NetworkError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            }
        }

        async fn poll(
            &self,
            _tx_hash: &str,
            _network: &NetworkDefinition,
        ) -> Result<RawTransactionResult, NetworkError> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            match self.polls.lock().unwrap().pop_front() {
                Some(Scripted::Result(raw)) => Ok(raw),
                Some(Scripted::Error) => Err(NetworkError::Decode {
                    status: 500,
                    message: "expected value".to_string(),
                }),
                None => Ok(not_found()),
            }
        }
    }

    fn not_found() -> RawTransactionResult {
        RawTransactionResult {
            error: Some("tx (ABC) not found".to_string()),
            ..Default::default()
        }
    }

    fn confirmed(height: u64) -> RawTransactionResult {
        serde_json::from_value(json!({
            "height": height.to_string(),
            "txhash": "ABC",
            "logs": [{ "msg_index": "0", "success": true, "log": "" }],
            "tx": { "type": "cosmos-sdk/StdTx", "value": { "msg": [], "fee": { "amount": [], "gas": "1500" } } }
        }))
        .unwrap()
    }

    fn failed(raw_log: &str) -> RawTransactionResult {
        serde_json::from_value(json!({
            "height": "0",
            "logs": [{ "msg_index": "0", "success": false, "log": raw_log }],
            "raw_log": raw_log
        }))
        .unwrap()
    }

    fn delegation() -> TransactionData {
        let gas = GasSettings {
            gas_amount: "1500".to_string(),
            gas_price: "150000".to_string(),
        };
        let account = AccountInformation {
            account_number: "146".to_string(),
            sequence: "44".to_string(),
        };
        TransactionData {
            tx_msg: create_delegation_transaction_message(
                ADDRESS,
                "cosmosvaloper1xyz",
                "50",
                "uatom",
                &gas,
            )
            .unwrap(),
            tx_request_metadata: create_transaction_request_metadata(
                ADDRESS, &gas, &account, &COSMOS,
            )
            .unwrap(),
        }
    }

    fn workflow(device: Option<Arc<MockDevice>>, network: Arc<MockNetwork>) -> TransactionWorkflow {
        let history = Arc::new(InMemoryHistory::new(Location::new("/cosmos/transactions")));
        let state = TransactionState::new(COSMOS, Some(ADDRESS.to_string()));
        let workflow = TransactionWorkflow::new(network, history, state);
        match device {
            Some(device) => workflow.with_device(device),
            None => workflow,
        }
    }

    async fn signed_workflow(network: Arc<MockNetwork>) -> TransactionWorkflow {
        let workflow = workflow(Some(MockDevice::new()), network);
        workflow.begin(delegation()).await;
        let step = workflow.sign().await.unwrap();
        assert_eq!(step.action.name(), "sign_transaction_success");
        workflow
    }

    /// Signed workflow with the hash applied directly, so no background
    /// poller runs alongside the test.
    async fn broadcast_workflow(network: Arc<MockNetwork>) -> (TransactionWorkflow, AttemptId) {
        let workflow = signed_workflow(network).await;
        let attempt = {
            let mut state = workflow.state.write().await;
            state.apply(TransactionAction::BroadcastTransaction);
            state.apply(TransactionAction::BroadcastTransactionSuccess("ABC".to_string()));
            state.attempt
        };
        (workflow, attempt)
    }

    #[tokio::test]
    async fn sign_encodes_exactly_what_the_device_returned() {
        let device = MockDevice::new();
        let workflow = workflow(Some(device.clone()), MockNetwork::new(vec![]));
        workflow.begin(delegation()).await;

        let step = workflow.sign().await.unwrap();
        let TransactionAction::SignTransactionSuccess(body) = step.action else {
            panic!("expected sign success, got {:?}", step.action);
        };
        assert_eq!(body.signature(), Some("AQID"));
        assert_eq!(body.public_key(), Some("CQkJ"));
        assert_eq!(body.value().msg[0]["value"]["amount"]["amount"], "50");
        assert_eq!(device.calls(), 2);

        let state = workflow.current_state().await;
        assert_eq!(state.phase, TransactionPhase::Signed);
        assert_eq!(state.post_body, Some(body));
    }

    #[tokio::test]
    async fn sign_without_device_or_data_never_contacts_device() {
        let no_device = workflow(None, MockNetwork::new(vec![]));
        let mut notifications = no_device.notifier().subscribe();
        no_device.begin(delegation()).await;

        let step = no_device.sign().await.unwrap();
        assert_eq!(step.action, TransactionAction::SignTransactionFailure);
        assert_eq!(notifications.recv().await.unwrap().message, MISSING_SIGN_INPUTS);

        let device = MockDevice::new();
        let no_data = workflow(Some(device.clone()), MockNetwork::new(vec![]));
        let step = no_data.sign().await.unwrap();
        assert_eq!(step.action, TransactionAction::SignTransactionFailure);
        assert_eq!(device.calls(), 0);
        assert_eq!(no_data.current_state().await.phase, TransactionPhase::Idle);
    }

    #[tokio::test]
    async fn device_error_warns_and_leaves_sign_retryable() {
        let device = MockDevice::new();
        device.fail.store(true, Ordering::SeqCst);
        let workflow = workflow(Some(device.clone()), MockNetwork::new(vec![]));
        workflow.begin(delegation()).await;

        let step = workflow.sign().await.unwrap();
        assert_eq!(step.action, TransactionAction::SignTransactionFailure);
        let recent = workflow.notifier().recent();
        assert_eq!(recent.last().unwrap().message, DEVICE_UNREACHABLE);
        assert_eq!(recent.last().unwrap().level, NotificationLevel::Warning);
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Idle);

        device.fail.store(false, Ordering::SeqCst);
        let retry = workflow.sign().await.unwrap();
        assert_eq!(retry.action.name(), "sign_transaction_success");
    }

    #[tokio::test]
    async fn sign_intent_is_ignored_outside_idle() {
        let device = MockDevice::new();
        let workflow = workflow(Some(device.clone()), MockNetwork::new(vec![]));
        workflow.begin(delegation()).await;
        workflow.sign().await.unwrap();
        let calls = device.calls();

        assert!(workflow.sign().await.is_none());
        assert_eq!(device.calls(), calls);
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Signed);
    }

    #[tokio::test(start_paused = true)]
    async fn device_timeout_is_a_device_error() {
        struct StuckDevice;

        #[async_trait]
        impl SigningDevice for StuckDevice {
            async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, DeviceError> {
                std::future::pending().await
            }

            async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError> {
                std::future::pending().await
            }
        }

        let workflow = workflow(None, MockNetwork::new(vec![]))
            .with_device(Arc::new(StuckDevice))
            .with_device_timeout(Duration::from_secs(5));
        workflow.begin(delegation()).await;

        let step = workflow.sign().await.unwrap();
        assert_eq!(step.action, TransactionAction::SignTransactionFailure);
        assert_eq!(
            workflow.notifier().recent().last().unwrap().message,
            DEVICE_UNREACHABLE
        );
    }

    #[tokio::test]
    async fn broadcast_without_signed_body_never_calls_adapter() {
        let network = MockNetwork::new(vec![]);
        let workflow = workflow(Some(MockDevice::new()), network.clone());
        workflow.begin(delegation()).await;

        let step = workflow.broadcast().await.unwrap();
        assert_eq!(step.action, TransactionAction::BroadcastTransactionFailure);
        assert_eq!(network.broadcast_calls(), 0);
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Failed);
        assert_eq!(
            workflow.notifier().recent().last().unwrap().message,
            NO_TRANSACTION_DATA
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_submits_async_and_captures_hash() {
        let network = MockNetwork::new(vec![]);
        let workflow = signed_workflow(network.clone()).await;

        let step = workflow.broadcast().await.unwrap();
        assert_eq!(
            step.action,
            TransactionAction::BroadcastTransactionSuccess("ABC".to_string())
        );

        let sent = network.broadcasts.lock().unwrap()[0].clone();
        assert_eq!(sent.mode, BroadcastMode::Async);
        assert_eq!(sent.tx.signatures[0].signature, "AQID");

        let state = workflow.current_state().await;
        assert_eq!(state.transaction_hash.as_deref(), Some("ABC"));
        assert!(matches!(
            state.phase,
            TransactionPhase::Broadcast | TransactionPhase::Polling
        ));
    }

    #[tokio::test]
    async fn broadcast_error_warns_transaction_may_have_succeeded() {
        let network = MockNetwork::failing();
        let workflow = signed_workflow(network.clone()).await;

        let step = workflow.broadcast().await.unwrap();
        assert_eq!(step.action, TransactionAction::BroadcastTransactionFailure);
        assert_eq!(network.broadcast_calls(), 1);

        let last = workflow.notifier().recent().pop().unwrap();
        assert_eq!(last.level, NotificationLevel::Danger);
        assert!(last.message.contains("may have succeeded"));
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Failed);

        // Not retried, and no second broadcast from a Failed cycle
        assert!(workflow.broadcast().await.is_none());
        assert_eq!(network.broadcast_calls(), 1);
        assert_eq!(network.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_starts_polling_in_the_background() {
        let network = MockNetwork::new(vec![
            Scripted::Result(not_found()),
            Scripted::Result(confirmed(9)),
        ]);
        let workflow = signed_workflow(network.clone()).await;
        let mut notifications = workflow.notifier().subscribe();

        workflow.broadcast().await.unwrap();

        let confirmed = notifications.recv().await.unwrap();
        assert_eq!(confirmed.level, NotificationLevel::Success);
        assert!(confirmed.message.contains("height 9"));
        assert_eq!(network.poll_calls(), 2);
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sign_caller_still_lands_in_signed() {
        struct SlowDevice;

        #[async_trait]
        impl SigningDevice for SlowDevice {
            async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, DeviceError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(vec![1, 2, 3])
            }

            async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError> {
                Ok(vec![9, 9, 9])
            }
        }

        let workflow = workflow(None, MockNetwork::new(vec![])).with_device(Arc::new(SlowDevice));
        workflow.begin(delegation()).await;

        // The caller gives up while the device is still waiting for the user
        let abandoned = tokio::time::timeout(Duration::from_secs(1), workflow.sign()).await;
        assert!(abandoned.is_err());
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Signing);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let state = workflow.current_state().await;
        assert_eq!(state.phase, TransactionPhase::Signed);
        assert_eq!(state.post_body.unwrap().signature(), Some("AQID"));
    }

    #[tokio::test(start_paused = true)]
    async fn sign_is_honoured_after_caller_dropped_a_hung_request() {
        struct HangsOnce {
            hung: AtomicBool,
        }

        #[async_trait]
        impl SigningDevice for HangsOnce {
            async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, DeviceError> {
                if !self.hung.swap(true, Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                Ok(vec![1, 2, 3])
            }

            async fn get_public_key(&self) -> Result<Vec<u8>, DeviceError> {
                Ok(vec![9, 9, 9])
            }
        }

        let workflow = workflow(None, MockNetwork::new(vec![]))
            .with_device(Arc::new(HangsOnce {
                hung: AtomicBool::new(false),
            }))
            .with_device_timeout(Duration::from_secs(5));
        workflow.begin(delegation()).await;

        let abandoned = tokio::time::timeout(Duration::from_secs(1), workflow.sign()).await;
        assert!(abandoned.is_err());

        // The device timeout still fires without a caller waiting on it
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Idle);
        assert_eq!(
            workflow.notifier().recent().last().unwrap().message,
            DEVICE_UNREACHABLE
        );

        let retry = workflow.sign().await.unwrap();
        assert_eq!(retry.action.name(), "sign_transaction_success");
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_broadcast_caller_still_captures_hash() {
        let network = MockNetwork::slow(Duration::from_secs(10), vec![Scripted::Result(confirmed(5))]);
        let workflow = signed_workflow(network.clone()).await;

        let abandoned = tokio::time::timeout(Duration::from_secs(1), workflow.broadcast()).await;
        assert!(abandoned.is_err());
        assert_eq!(
            workflow.current_state().await.phase,
            TransactionPhase::Broadcasting
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        let state = workflow.current_state().await;
        assert_eq!(state.transaction_hash.as_deref(), Some("ABC"));
        assert_eq!(state.phase, TransactionPhase::Confirmed);
        assert_eq!(network.broadcast_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_re_polls_after_delay() {
        let network = MockNetwork::new(vec![Scripted::Result(not_found())]);
        let (workflow, attempt) = broadcast_workflow(network).await;

        let started = tokio::time::Instant::now();
        let action = workflow.poll_once(attempt).await.unwrap();
        assert_eq!(action, TransactionAction::PollForTransaction);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() < Duration::from_millis(2500));
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_log_confirms_with_height() {
        let network = MockNetwork::new(vec![Scripted::Result(confirmed(4200))]);
        let (workflow, attempt) = broadcast_workflow(network).await;

        let action = workflow.poll_until_resolved(attempt).await.unwrap();
        let TransactionAction::TransactionConfirmed(confirmed) = action else {
            panic!("expected confirmation, got {action:?}");
        };
        assert_eq!(confirmed.height, 4200);
        assert_eq!(confirmed.transaction.chain_id, "cosmoshub-3");

        let state = workflow.current_state().await;
        assert_eq!(state.phase, TransactionPhase::Confirmed);
        assert_eq!(state.confirmed.map(|c| c.height), Some(4200));
        assert_eq!(
            workflow.notifier().recent().last().unwrap().level,
            NotificationLevel::Success
        );
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_gas_shows_insufficient_gas_message() {
        let network = MockNetwork::new(vec![Scripted::Result(failed("out of gas in location x"))]);
        let (workflow, attempt) = broadcast_workflow(network).await;

        let action = workflow.poll_until_resolved(attempt).await.unwrap();
        assert_eq!(action, TransactionAction::TransactionFailed);

        let last = workflow.notifier().recent().pop().unwrap();
        assert_eq!(last.level, NotificationLevel::Danger);
        assert!(last.message.contains("insufficient gas"));
        assert!(!last.message.contains("unknown error"));
        assert_eq!(workflow.current_state().await.phase, TransactionPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_failure_includes_raw_result() {
        let network = MockNetwork::new(vec![Scripted::Result(failed("signature verification failed"))]);
        let (workflow, attempt) = broadcast_workflow(network).await;

        let action = workflow.poll_until_resolved(attempt).await.unwrap();
        assert_eq!(action, TransactionAction::TransactionFailed);

        let last = workflow.notifier().recent().pop().unwrap();
        assert!(last.message.contains("unknown error"));
        assert!(last.message.contains("signature verification failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_retry_until_resolved() {
        let network = MockNetwork::new(vec![
            Scripted::Error,
            Scripted::Result(not_found()),
            Scripted::Error,
            Scripted::Result(confirmed(12)),
        ]);
        let (workflow, attempt) = broadcast_workflow(network.clone()).await;

        let started = tokio::time::Instant::now();
        let action = workflow.poll_until_resolved(attempt).await.unwrap();
        assert_eq!(action.name(), "transaction_confirmed");
        assert_eq!(network.poll_calls(), 4);
        assert!(started.elapsed() >= Duration::from_millis(2500 + 1500 + 2500));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_poll_loop_stops_without_touching_state() {
        let network = MockNetwork::new(vec![]);
        let (workflow, attempt) = broadcast_workflow(network).await;

        let handle = workflow.spawn_polling(attempt);
        // Let the loop reach its not-found delay
        tokio::time::sleep(Duration::from_millis(100)).await;
        let next = workflow.begin(delegation()).await;

        assert_eq!(handle.await.unwrap(), None);
        let state = workflow.current_state().await;
        assert_eq!(state.attempt, next);
        assert_eq!(state.phase, TransactionPhase::Idle);
        assert!(state.transaction_hash.is_none());
    }

    #[tokio::test]
    async fn poll_without_hash_fails_the_cycle() {
        let network = MockNetwork::new(vec![]);
        let workflow = workflow(None, network.clone());
        let attempt = workflow.begin(delegation()).await;

        let action = workflow.poll_once(attempt).await.unwrap();
        assert_eq!(action, TransactionAction::TransactionFailed);
        assert_eq!(network.poll_calls(), 0);
        assert_eq!(
            workflow.notifier().recent().last().unwrap().message,
            NO_TRANSACTION_HASH
        );
    }

    #[tokio::test]
    async fn page_sync_updates_location_only() {
        let workflow = signed_workflow(MockNetwork::new(vec![])).await;

        let location = workflow.set_transactions_page(3).await.unwrap();
        assert_eq!(location.pathname, "/cosmos/transactions");
        assert_eq!(location.search, "address=cosmos1abc&page=3");
        assert_eq!(workflow.history().location(), location);

        let state = workflow.current_state().await;
        assert_eq!(state.transactions_page.page(), 3);
        assert_eq!(state.phase, TransactionPhase::Signed);

        assert_eq!(
            workflow.set_transactions_page(0).await,
            Err(HistoryError::InvalidPage(0))
        );
    }

    #[tokio::test]
    async fn account_change_abandons_the_cycle() {
        let workflow = signed_workflow(MockNetwork::new(vec![])).await;
        let before = workflow.current_state().await.attempt;

        workflow
            .set_account(Some("cosmos1other".to_string()), COSMOS)
            .await;

        let state = workflow.current_state().await;
        assert_ne!(state.attempt, before);
        assert_eq!(state.phase, TransactionPhase::Idle);
        assert!(state.transaction_data.is_none());
    }

    #[tokio::test]
    async fn back_and_forward_restore_the_page() {
        let workflow = workflow(None, MockNetwork::new(vec![]));
        workflow.set_transactions_page(2).await.unwrap();
        workflow.set_transactions_page(3).await.unwrap();

        let back = workflow.navigate_back().await.unwrap();
        assert_eq!(back.search, "address=cosmos1abc&page=2");
        assert_eq!(workflow.current_state().await.transactions_page.page(), 2);

        // The initial location carries no page
        assert_eq!(workflow.navigate_back().await.unwrap().search, "");
        assert_eq!(workflow.current_state().await.transactions_page.page(), 2);
        assert!(workflow.navigate_back().await.is_none());

        workflow.navigate_forward().await.unwrap();
        let forward = workflow.navigate_forward().await.unwrap();
        assert_eq!(forward.search, "address=cosmos1abc&page=3");
        assert_eq!(workflow.current_state().await.transactions_page.page(), 3);
        assert!(workflow.navigate_forward().await.is_none());
    }

    #[tokio::test]
    async fn next_and_previous_pages_move_the_cursor() {
        let workflow = workflow(None, MockNetwork::new(vec![]));

        assert_eq!(workflow.next_page().await.search, "address=cosmos1abc&page=2");
        assert_eq!(workflow.next_page().await.search, "address=cosmos1abc&page=3");
        assert_eq!(workflow.previous_page().await.search, "address=cosmos1abc&page=2");
        workflow.previous_page().await;
        assert_eq!(workflow.previous_page().await.search, "address=cosmos1abc&page=1");
        assert_eq!(workflow.current_state().await.transactions_page.page(), 1);
    }

    #[tokio::test]
    async fn deep_link_switches_account_and_page() {
        let workflow = signed_workflow(MockNetwork::new(vec![])).await;
        let before = workflow.current_state().await.attempt;

        let location = workflow
            .open_deep_link("?address=cosmos1other&page=4")
            .await
            .unwrap();
        assert_eq!(location.search, "address=cosmos1other&page=4");

        let state = workflow.current_state().await;
        assert_eq!(state.address.as_deref(), Some("cosmos1other"));
        assert_eq!(state.transactions_page.page(), 4);
        assert_ne!(state.attempt, before);
        assert_eq!(state.phase, TransactionPhase::Idle);

        assert!(matches!(
            workflow.open_deep_link("page=2").await,
            Err(HistoryError::InvalidQuery(_))
        ));
        assert!(matches!(
            workflow.open_deep_link("address=&page=2").await,
            Err(HistoryError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn deep_link_to_the_same_account_keeps_the_cycle() {
        let workflow = signed_workflow(MockNetwork::new(vec![])).await;
        let before = workflow.current_state().await.attempt;

        workflow
            .open_deep_link("address=cosmos1abc&page=2")
            .await
            .unwrap();

        let state = workflow.current_state().await;
        assert_eq!(state.attempt, before);
        assert_eq!(state.phase, TransactionPhase::Signed);
        assert_eq!(state.transactions_page.page(), 2);
    }
}
