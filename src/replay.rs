//! Batch replay of scripted payment attempts.
//!
//! Every attempt runs through a fresh [`CashbackFlow`] against one shared
//! in-memory boundary, so wallet effects carry over between attempts of the
//! same user.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use crate::config::FlowConfig;
use crate::confirmation::{MerchantApproval, SimulatedApproval};
use crate::flow::{CashbackFlow, FlowError, FlowState, Phase};
use crate::gateway::InMemoryGateway;
use crate::model::{CashbackSplit, UserId};
use crate::{Amount, Percent};

/// One scripted payment attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub user: UserId,
    /// Wallet balance to set before the attempt; `None` keeps the current one.
    pub balance: Option<Amount>,
    /// Decoded QR text.
    pub payload: String,
    pub purchase: Amount,
    pub cashback_use: Amount,
    /// Overrides the configured cashback rate for this attempt.
    pub percent: Option<Percent>,
}

/// Where an attempt ended.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub user: UserId,
    pub merchant: Option<String>,
    pub store: Option<String>,
    pub phase: Phase,
    pub split: CashbackSplit,
    pub cashback_earned: Amount,
    pub transaction: Option<Uuid>,
    pub reason: Option<String>,
}

pub struct Replayer {
    gateway: Arc<InMemoryGateway>,
    approval: Arc<dyn MerchantApproval>,
    config: FlowConfig,
    outcomes: Vec<Outcome>,
}

/// Public API
impl Replayer {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            gateway: Arc::new(InMemoryGateway::new()),
            approval: Arc::new(SimulatedApproval::immediate()),
            config,
            outcomes: Vec::new(),
        }
    }

    pub fn with_approval(mut self, approval: Arc<dyn MerchantApproval>) -> Self {
        self.approval = approval;
        self
    }

    pub fn gateway(&self) -> &Arc<InMemoryGateway> {
        &self.gateway
    }

    /// Replay every attempt of the stream, in order.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Attempt> + Unpin) {
        while let Some(attempt) = stream.next().await {
            let outcome = self.replay(attempt).await;
            self.outcomes.push(outcome);
        }
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Drive one attempt to a resting phase.
    pub async fn replay(&self, attempt: Attempt) -> Outcome {
        if let Some(balance) = attempt.balance {
            self.gateway.seed_wallet(attempt.user.clone(), balance).await;
        }

        let mut config = self.config.clone();
        if let Some(percent) = attempt.percent {
            config = config.with_cashback_percent(percent);
        }

        let mut flow = match CashbackFlow::enter(
            attempt.user.clone(),
            &*self.gateway,
            self.gateway.clone(),
            self.approval.clone(),
            config,
        )
        .await
        {
            Ok(flow) => flow,
            Err(e) => {
                return Self::outcome(&attempt.user, Phase::Scanning, Some(e.to_string()), None);
            }
        };

        let result = Self::drive(&mut flow, &attempt).await;
        let reason = match result {
            Ok(_) => flow.error().map(str::to_string),
            Err(e) => Some(flow.error().map_or_else(|| e.to_string(), str::to_string)),
        };
        let outcome = Self::outcome(&attempt.user, flow.phase(), reason, Some(&flow));

        Self::log_outcome(&outcome);
        outcome
    }
}

/// Private API
impl Replayer {
    async fn drive(flow: &mut CashbackFlow, attempt: &Attempt) -> Result<Phase, FlowError> {
        flow.scan_payload(&attempt.payload)?;
        flow.set_purchase_amount(attempt.purchase)?;
        flow.set_cashback_use(attempt.cashback_use)?;
        flow.confirm().await
    }

    fn outcome(
        user: &str,
        phase: Phase,
        reason: Option<String>,
        flow: Option<&CashbackFlow>,
    ) -> Outcome {
        let mut outcome = Outcome {
            user: user.to_string(),
            merchant: None,
            store: None,
            phase,
            split: CashbackSplit::default(),
            cashback_earned: Amount::ZERO,
            transaction: None,
            reason,
        };
        let Some(flow) = flow else {
            return outcome;
        };

        if let Some(session) = flow.session() {
            outcome.merchant = Some(session.merchant_id.clone());
            outcome.store = Some(session.store_id.clone());
        }
        outcome.split = flow.split();
        match flow.state() {
            FlowState::Approved { receipt } => {
                outcome.cashback_earned = receipt.cashback_earned;
                outcome.transaction = Some(receipt.transaction_id);
            }
            FlowState::Rejected { transaction, .. } => outcome.transaction = *transaction,
            _ => {}
        }
        outcome
    }

    /// Small helper to log replay results
    fn log_outcome(outcome: &Outcome) {
        match (&outcome.reason, outcome.transaction) {
            (None, Some(tx)) => {
                info!(
                    user = %outcome.user,
                    transaction = %tx,
                    paid = %outcome.split.amount_payable,
                    cashback_earned = %outcome.cashback_earned,
                    "attempt {}",
                    outcome.phase
                );
            }
            (Some(reason), _) => {
                info!(
                    user = %outcome.user,
                    reason = %reason,
                    "attempt ended {}",
                    outcome.phase
                );
            }
            (None, None) => {
                info!(user = %outcome.user, "attempt ended {}", outcome.phase);
            }
        }
    }
}
