//! Cashback payment flow.
//!
//! One flow instance drives one user through a payment attempt:
//! scan a merchant code, enter amounts, submit, and wait for the merchant.
//! Phases advance strictly in order; the only ways back are the explicit
//! exits (`back_to_home`, `try_again`, `abandon`).

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Amount;
use crate::config::FlowConfig;
use crate::confirmation::{MerchantApproval, MerchantDecision};
use crate::gateway::{GatewayError, TransactionGateway, WalletSource};
use crate::model::{
    CashbackSplit, CashbackTransactionRequest, MerchantSession, Receipt, TransactionId,
    TransactionStatus, UserId, WalletSnapshot,
};
use crate::qr::parse_payload;
use crate::scan::{Camera, QrDecoder, ScanError, scan_merchant};
use crate::split::{compute_split, use_max};

mod state;
pub use state::{FlowState, Phase};

mod error;
pub use error::{FlowError, SubmissionError, ValidationError};

const DECLINED: &str = "transaction declined by the merchant";

/// The cashback payment state machine.
pub struct CashbackFlow {
    user_id: UserId,
    /// Read once on entry; never mutated locally.
    wallet: WalletSnapshot,
    gateway: Arc<dyn TransactionGateway>,
    approval: Arc<dyn MerchantApproval>,
    config: FlowConfig,
    state: FlowState,
    session: Option<MerchantSession>,
    qr_code_value: Option<String>,
    purchase: Amount,
    requested_use: Amount,
    error: Option<String>,
    /// Request whose outcome is unknown (timeout or transport failure), kept so
    /// an identical retry reuses its idempotency key.
    unsettled: Option<CashbackTransactionRequest>,
    cancel: CancellationToken,
    phase_tx: watch::Sender<Phase>,
}

/// Public API
impl CashbackFlow {
    pub fn new(
        user_id: impl Into<UserId>,
        wallet: WalletSnapshot,
        gateway: Arc<dyn TransactionGateway>,
        approval: Arc<dyn MerchantApproval>,
        config: FlowConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Scanning);
        Self {
            user_id: user_id.into(),
            wallet,
            gateway,
            approval,
            config,
            state: FlowState::Scanning,
            session: None,
            qr_code_value: None,
            purchase: Amount::ZERO,
            requested_use: Amount::ZERO,
            error: None,
            unsettled: None,
            cancel: CancellationToken::new(),
            phase_tx,
        }
    }

    /// Enter the flow, taking a snapshot of the user's wallet.
    pub async fn enter(
        user_id: impl Into<UserId>,
        wallets: &dyn WalletSource,
        gateway: Arc<dyn TransactionGateway>,
        approval: Arc<dyn MerchantApproval>,
        config: FlowConfig,
    ) -> Result<Self, GatewayError> {
        let user_id = user_id.into();
        let wallet = wallets.wallet(&user_id).await?;
        info!(user = %user_id, balance = %wallet.balance, "cashback flow entered");
        Ok(Self::new(user_id, wallet, gateway, approval, config))
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn session(&self) -> Option<&MerchantSession> {
        self.session.as_ref()
    }

    pub fn wallet(&self) -> &WalletSnapshot {
        &self.wallet
    }

    /// Message of the last failure, shown on the rejected screen.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Observe phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Token that abandons the current attempt when cancelled, even while a
    /// scan or confirm is in flight. Replaced on every reset.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The split for the amounts currently entered.
    pub fn split(&self) -> CashbackSplit {
        compute_split(self.purchase, self.requested_use, self.wallet.balance)
    }

    /// Whether the confirm action is enabled.
    pub fn can_submit(&self) -> bool {
        self.phase().accepts_input() && self.session.is_some() && self.purchase.is_positive()
    }

    /// Accept an already-decoded QR payload.
    ///
    /// An unrecognized payload leaves the flow in `scanning` so the user can
    /// scan again.
    pub fn scan_payload(&mut self, raw: &str) -> Result<&MerchantSession, FlowError> {
        self.expect_phase(Phase::Scanning, "scan")?;
        match parse_payload(raw) {
            Ok(session) => Ok(self.accept_session(session, raw.to_string())),
            Err(e) => {
                warn!(user = %self.user_id, reason = %e, "scanned code rejected");
                Err(e.into())
            }
        }
    }

    /// Run the capture loop until a merchant code is read.
    pub async fn scan<C, D>(&mut self, camera: C, decoder: &D) -> Result<&MerchantSession, FlowError>
    where
        C: Camera,
        D: QrDecoder + ?Sized,
    {
        self.expect_phase(Phase::Scanning, "scan")?;
        let cancel = self.cancel.clone();
        match scan_merchant(camera, decoder, &cancel).await {
            Ok(code) => Ok(self.accept_session(code.session, code.raw)),
            Err(ScanError::Cancelled) => Err(self.cancelled()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_purchase_amount(&mut self, amount: Amount) -> Result<CashbackSplit, FlowError> {
        self.expect_phase(Phase::Input, "edit purchase amount")?;
        self.purchase = amount.non_negative();
        Ok(self.split())
    }

    pub fn set_cashback_use(&mut self, amount: Amount) -> Result<CashbackSplit, FlowError> {
        self.expect_phase(Phase::Input, "edit cashback use")?;
        self.requested_use = amount.non_negative();
        Ok(self.split())
    }

    /// Redeem as much of the wallet as this purchase allows.
    pub fn use_max(&mut self) -> Result<CashbackSplit, FlowError> {
        self.expect_phase(Phase::Input, "use max")?;
        self.requested_use = use_max(self.purchase, self.wallet.balance);
        Ok(self.split())
    }

    /// Submit the transaction and wait for the merchant.
    ///
    /// Returns the terminal phase reached. Boundary failures, timeouts and
    /// approval errors also land the flow in `rejected` and are returned as
    /// errors; cancellation resets the flow.
    pub async fn confirm(&mut self) -> Result<Phase, FlowError> {
        self.expect_phase(Phase::Input, "confirm")?;
        let session = self
            .session
            .clone()
            .ok_or(ValidationError::MissingMerchant)?;
        let split = self.split();
        if !split.purchase_amount.is_positive() {
            return Err(ValidationError::NonPositivePurchase.into());
        }

        let request = self.build_request(&session, &split);
        self.transition(FlowState::Submitting);

        let cancel = self.cancel.clone();
        let gateway = self.gateway.clone();
        let timeout = self.config.submit_timeout;

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, gateway.submit(&request)) => Some(result),
        };
        let record = match submitted {
            None => return Err(self.cancelled()),
            Some(Ok(Ok(record))) => record,
            Some(Ok(Err(e))) => {
                if matches!(e, GatewayError::Transport(_)) {
                    self.unsettled = Some(request);
                }
                return Err(self.reject(SubmissionError::Gateway(e).into(), None));
            }
            Some(Err(_elapsed)) => {
                self.unsettled = Some(request);
                return Err(self.reject(SubmissionError::Timeout(timeout).into(), None));
            }
        };
        self.unsettled = None;

        info!(
            user = %self.user_id,
            merchant = %record.request.merchant_id,
            transaction = %record.id,
            purchase = %record.request.purchase_amount,
            cashback_used = %record.request.cashback_used,
            cashback_earned = %record.cashback_earned,
            "transaction submitted"
        );
        self.transition(FlowState::AwaitingMerchant {
            record: record.clone(),
        });

        let approval = self.approval.clone();
        let decided = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            decision = approval.await_decision(&record) => Some(decision),
        };
        let decision = match decided {
            None => return Err(self.cancelled()),
            Some(Ok(decision)) => decision,
            Some(Err(e)) => return Err(self.reject(e.into(), Some(record.id))),
        };

        let status = match decision {
            MerchantDecision::Approved => TransactionStatus::Approved,
            MerchantDecision::Rejected => TransactionStatus::Rejected,
        };
        let finalized = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, gateway.finalize(record.id, status)) => Some(result),
        };
        let finalized = match finalized {
            None => return Err(self.cancelled()),
            Some(Ok(result)) => result.map_err(SubmissionError::Gateway),
            Some(Err(_elapsed)) => Err(SubmissionError::Timeout(timeout)),
        };

        match (decision, finalized) {
            (MerchantDecision::Approved, Ok(settled)) => {
                let receipt = Receipt::from(&settled);
                info!(
                    transaction = %receipt.transaction_id,
                    paid = %receipt.amount_paid,
                    cashback_earned = %receipt.cashback_earned,
                    "transaction approved"
                );
                self.transition(FlowState::Approved { receipt });
                Ok(Phase::Approved)
            }
            (MerchantDecision::Approved, Err(e)) => Err(self.reject(e.into(), Some(record.id))),
            (MerchantDecision::Rejected, finalized) => {
                if let Err(e) = finalized {
                    warn!(transaction = %record.id, reason = %e, "decline not recorded");
                }
                warn!(transaction = %record.id, "merchant declined transaction");
                self.error = Some(DECLINED.to_string());
                self.transition(FlowState::Rejected {
                    reason: DECLINED.to_string(),
                    transaction: Some(record.id),
                });
                Ok(Phase::Rejected)
            }
        }
    }

    /// Leave the approved screen, resetting the whole flow.
    pub fn back_to_home(&mut self) -> Result<(), FlowError> {
        self.expect_phase(Phase::Approved, "back to home")?;
        self.reset();
        Ok(())
    }

    /// Leave the rejected screen for a fresh amount entry with the same merchant.
    pub fn try_again(&mut self) -> Result<(), FlowError> {
        self.expect_phase(Phase::Rejected, "try again")?;
        self.purchase = Amount::ZERO;
        self.requested_use = Amount::ZERO;
        self.error = None;
        self.transition(FlowState::Input);
        Ok(())
    }

    /// Discard everything from any phase. Nothing is sent to the boundary.
    pub fn abandon(&mut self) {
        info!(user = %self.user_id, phase = %self.phase(), "flow abandoned");
        self.cancel.cancel();
        self.reset();
    }
}

/// Private API
impl CashbackFlow {
    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), FlowError> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition { action, phase })
        }
    }

    fn transition(&mut self, next: FlowState) {
        let from = self.phase();
        self.state = next;
        let to = self.phase();
        info!(user = %self.user_id, %from, %to, "flow transition");
        self.phase_tx.send_replace(to);
    }

    fn accept_session(&mut self, session: MerchantSession, raw: String) -> &MerchantSession {
        self.qr_code_value = Some(raw);
        self.transition(FlowState::Input);
        self.session.insert(session)
    }

    fn build_request(
        &self,
        session: &MerchantSession,
        split: &CashbackSplit,
    ) -> CashbackTransactionRequest {
        let request = CashbackTransactionRequest {
            user_id: self.user_id.clone(),
            merchant_id: session.merchant_id.clone(),
            store_id: session.store_id.clone(),
            purchase_amount: split.purchase_amount,
            cashback_used: split.capped_cashback_used,
            cashback_percent: self.config.cashback_percent,
            status: TransactionStatus::Pending,
            source_channel: self.config.source_channel,
            qr_code_value: self.qr_code_value.clone(),
            pin_value: None,
            idempotency_key: Uuid::new_v4(),
        };

        // same purchase after an unknown outcome: let the boundary deduplicate
        if let Some(previous) = &self.unsettled {
            let retry = CashbackTransactionRequest {
                idempotency_key: previous.idempotency_key,
                ..request.clone()
            };
            if retry == *previous {
                return retry;
            }
        }
        request
    }

    fn reject(&mut self, error: FlowError, transaction: Option<TransactionId>) -> FlowError {
        let reason = error.to_string();
        warn!(user = %self.user_id, reason = %reason, "transaction rejected");
        self.error = Some(reason.clone());
        self.transition(FlowState::Rejected {
            reason,
            transaction,
        });
        error
    }

    fn cancelled(&mut self) -> FlowError {
        info!(user = %self.user_id, phase = %self.phase(), "flow cancelled in flight");
        self.reset();
        FlowError::Cancelled
    }

    fn reset(&mut self) {
        self.session = None;
        self.qr_code_value = None;
        self.purchase = Amount::ZERO;
        self.requested_use = Amount::ZERO;
        self.error = None;
        self.unsettled = None;
        self.cancel = CancellationToken::new();
        self.transition(FlowState::Scanning);
    }
}
