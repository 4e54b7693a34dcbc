//! Merchant-side approval of a submitted transaction.
//!
//! The flow awaits [`MerchantApproval::await_decision`] and races it against
//! its cancellation token, so any implementation is cancellable by dropping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::model::{TransactionId, TransactionRecord};

/// The merchant's answer for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("merchant confirmation channel closed for transaction {0}")]
    ChannelClosed(TransactionId),
    #[error("transaction {0} is already awaiting a decision")]
    AlreadyWaiting(TransactionId),
}

#[async_trait]
pub trait MerchantApproval: Send + Sync {
    async fn await_decision(
        &self,
        record: &TransactionRecord,
    ) -> Result<MerchantDecision, ApprovalError>;
}

/// Approves every transaction after a fixed delay.
///
/// Mirrors the demo behavior of the storefront app, which has no merchant
/// notification channel yet.
#[derive(Debug, Clone)]
pub struct SimulatedApproval {
    delay: Duration,
}

impl SimulatedApproval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl MerchantApproval for SimulatedApproval {
    async fn await_decision(
        &self,
        record: &TransactionRecord,
    ) -> Result<MerchantDecision, ApprovalError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!(transaction = %record.id, "simulated merchant approval");
        Ok(MerchantDecision::Approved)
    }
}

/// How long an unclaimed decision is kept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

enum Slot {
    Waiting(oneshot::Sender<MerchantDecision>),
    Decided {
        decision: MerchantDecision,
        at: Instant,
    },
}

impl Slot {
    fn decided(decision: MerchantDecision) -> Self {
        Slot::Decided {
            decision,
            at: Instant::now(),
        }
    }
}

enum Claim {
    Decided(MerchantDecision),
    Pending(oneshot::Receiver<MerchantDecision>),
}

/// Event-driven approvals: decisions arrive from outside (push reply,
/// webhook) through [`ApprovalDesk::resolve`], keyed by transaction id.
///
/// A decision that arrives before anyone waits on it is kept until claimed
/// or until the retention window passes. Dropped waiters are pruned on the
/// next call.
pub struct ApprovalDesk {
    slots: Mutex<HashMap<TransactionId, Slot>>,
    retention: Duration,
}

impl Default for ApprovalDesk {
    fn default() -> Self {
        Self::new()
    }
}

/// Public API
impl ApprovalDesk {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Deliver the merchant's decision for `transaction`.
    pub fn resolve(&self, transaction: TransactionId, decision: MerchantDecision) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let current = slots.remove(&transaction);
        self.prune(&mut slots);
        match current {
            Some(Slot::Waiting(sender)) => {
                // waiter dropped: keep the decision for a later claim
                if let Err(decision) = sender.send(decision) {
                    slots.insert(transaction, Slot::decided(decision));
                }
            }
            Some(Slot::Decided { .. }) | None => {
                slots.insert(transaction, Slot::decided(decision));
            }
        }
        info!(transaction = %transaction, ?decision, "merchant decision received");
    }

    /// Number of transactions currently waiting on a decision.
    pub fn waiting(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Waiting(sender) if !sender.is_closed()))
            .count()
    }

    /// Number of transactions the desk holds any state for.
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Private API
impl ApprovalDesk {
    fn register(&self, transaction: TransactionId) -> Result<Claim, ApprovalError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let current = slots.remove(&transaction);
        self.prune(&mut slots);
        match current {
            Some(Slot::Decided { decision, .. }) => Ok(Claim::Decided(decision)),
            Some(Slot::Waiting(sender)) if !sender.is_closed() => {
                slots.insert(transaction, Slot::Waiting(sender));
                Err(ApprovalError::AlreadyWaiting(transaction))
            }
            Some(Slot::Waiting(_)) | None => {
                let (sender, receiver) = oneshot::channel();
                slots.insert(transaction, Slot::Waiting(sender));
                Ok(Claim::Pending(receiver))
            }
        }
    }

    /// Drop closed waiters and decisions older than the retention window.
    fn prune(&self, slots: &mut HashMap<TransactionId, Slot>) {
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Waiting(sender) => !sender.is_closed(),
            Slot::Decided { at, .. } => at.elapsed() < self.retention,
        });
        let pruned = before - slots.len();
        if pruned > 0 {
            debug!(pruned, "approval slots pruned");
        }
    }
}

#[async_trait]
impl MerchantApproval for ApprovalDesk {
    async fn await_decision(
        &self,
        record: &TransactionRecord,
    ) -> Result<MerchantDecision, ApprovalError> {
        let receiver = match self.register(record.id)? {
            Claim::Decided(decision) => return Ok(decision),
            Claim::Pending(receiver) => receiver,
        };

        receiver
            .await
            .map_err(|_| ApprovalError::ChannelClosed(record.id))
    }
}
