//! Persistence boundary for cashback transactions and wallets.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Amount;
use crate::model::{
    CashbackTransactionRequest, TransactionId, TransactionRecord, TransactionStatus, UserId,
    WalletSnapshot,
};

/// Error reported by the persistence boundary. The message is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Stores cashback transactions.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Persist `request`, returning the stored record (with generated id,
    /// timestamp and computed `cashback_earned`).
    async fn submit(
        &self,
        request: &CashbackTransactionRequest,
    ) -> Result<TransactionRecord, GatewayError>;

    /// Record the merchant's decision on a pending transaction. Only an
    /// approval moves money; finalizing twice with the same status is a no-op.
    async fn finalize(
        &self,
        transaction: TransactionId,
        status: TransactionStatus,
    ) -> Result<TransactionRecord, GatewayError>;
}

/// Reads wallet balances.
#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn wallet(&self, user: &str) -> Result<WalletSnapshot, GatewayError>;
}

#[derive(Default)]
struct Ledger {
    records: Vec<TransactionRecord>,
    by_key: HashMap<Uuid, usize>,
    wallets: HashMap<UserId, WalletSnapshot>,
    fail_with: Option<GatewayError>,
}

/// In-process boundary: deduplicates on idempotency key, stores records as
/// pending and settles the wallet only when a transaction is approved
/// (redemption debited, earned cashback credited).
#[derive(Default)]
pub struct InMemoryGateway {
    ledger: RwLock<Ledger>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_wallet(&self, user: impl Into<UserId>, balance: Amount) {
        self.ledger
            .write()
            .await
            .wallets
            .insert(user.into(), WalletSnapshot::with_balance(balance));
    }

    /// Make every following submission fail with `error` (`None` to recover).
    pub async fn set_failure(&self, error: Option<GatewayError>) {
        self.ledger.write().await.fail_with = error;
    }

    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.ledger.read().await.records.clone()
    }
}

#[async_trait]
impl TransactionGateway for InMemoryGateway {
    async fn submit(
        &self,
        request: &CashbackTransactionRequest,
    ) -> Result<TransactionRecord, GatewayError> {
        let mut guard = self.ledger.write().await;
        let ledger = &mut *guard;

        if let Some(error) = &ledger.fail_with {
            return Err(error.clone());
        }

        if let Some(&idx) = ledger.by_key.get(&request.idempotency_key) {
            let existing = ledger.records[idx].clone();
            info!(
                transaction = %existing.id,
                key = %request.idempotency_key,
                "duplicate submission, returning stored record"
            );
            return Ok(existing);
        }

        if !request.purchase_amount.is_positive() {
            return Err(GatewayError::Rejected(
                "purchase amount must be positive".to_string(),
            ));
        }
        if request.cashback_used < Amount::ZERO {
            return Err(GatewayError::Rejected(
                "cashback use must not be negative".to_string(),
            ));
        }

        let wallet = ledger.wallets.get(&request.user_id).copied().unwrap_or_default();
        check_balance(&request.user_id, &wallet, request.cashback_used)?;

        let mut record = TransactionRecord::persist(request.clone());
        record.request.status = TransactionStatus::Pending;

        let idx = ledger.records.len();
        ledger.by_key.insert(request.idempotency_key, idx);
        ledger.records.push(record.clone());

        Ok(record)
    }

    async fn finalize(
        &self,
        transaction: TransactionId,
        status: TransactionStatus,
    ) -> Result<TransactionRecord, GatewayError> {
        let mut guard = self.ledger.write().await;
        let ledger = &mut *guard;

        if let Some(error) = &ledger.fail_with {
            return Err(error.clone());
        }

        let Some(record) = ledger.records.iter_mut().find(|r| r.id == transaction) else {
            return Err(GatewayError::Rejected(format!(
                "unknown transaction {transaction}"
            )));
        };
        match record.request.status {
            TransactionStatus::Pending => {}
            current if current == status => return Ok(record.clone()),
            current => {
                return Err(GatewayError::Rejected(format!(
                    "transaction {transaction} is already {current:?}"
                )));
            }
        }

        if status == TransactionStatus::Approved {
            let wallet = ledger
                .wallets
                .entry(record.request.user_id.clone())
                .or_default();
            match settle(&record.request.user_id, wallet, record) {
                Ok(settled) => *wallet = settled,
                Err(e) => {
                    record.request.status = TransactionStatus::Rejected;
                    return Err(e);
                }
            }
        }

        record.request.status = status;
        info!(transaction = %transaction, ?status, "transaction finalized");
        Ok(record.clone())
    }
}

fn check_balance(user: &str, wallet: &WalletSnapshot, used: Amount) -> Result<(), GatewayError> {
    if used > wallet.balance {
        warn!(
            user = %user,
            balance = %wallet.balance,
            requested = %used,
            "redemption above wallet balance"
        );
        return Err(GatewayError::Rejected(format!(
            "insufficient cashback balance: available {}, requested {}",
            wallet.balance, used
        )));
    }
    Ok(())
}

/// Wallet after debiting the redemption and crediting the earned cashback.
fn settle(
    user: &str,
    wallet: &WalletSnapshot,
    record: &TransactionRecord,
) -> Result<WalletSnapshot, GatewayError> {
    let used = record.request.cashback_used;
    let earned = record.cashback_earned;
    check_balance(user, wallet, used)?;

    let out_of_range = || {
        warn!(user = %user, transaction = %record.id, "wallet amount out of range");
        GatewayError::Rejected("wallet amount out of range".to_string())
    };
    Ok(WalletSnapshot {
        balance: wallet
            .balance
            .checked_sub(used)
            .and_then(|balance| balance.checked_add(earned))
            .ok_or_else(out_of_range)?,
        total_earned: wallet.total_earned.checked_add(earned).ok_or_else(out_of_range)?,
        total_redeemed: wallet
            .total_redeemed
            .checked_add(used)
            .ok_or_else(out_of_range)?,
    })
}

#[async_trait]
impl WalletSource for InMemoryGateway {
    async fn wallet(&self, user: &str) -> Result<WalletSnapshot, GatewayError> {
        Ok(self
            .ledger
            .read()
            .await
            .wallets
            .get(user)
            .copied()
            .unwrap_or_default())
    }
}
