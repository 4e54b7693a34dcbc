//! Core domain types for the cashback flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Percent};

/// User identifier, opaque to this crate.
pub type UserId = String;

/// Transaction identifier generated by the persistence boundary.
pub type TransactionId = Uuid;

/// Store id used when a merchant QR code does not name one.
pub const DEFAULT_STORE_ID: &str = "default_store";

/// The counterparty of one payment attempt, established by scanning a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantSession {
    pub merchant_id: String,
    pub store_id: String,
}

impl MerchantSession {
    pub fn new(merchant_id: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            store_id: store_id.into(),
        }
    }

    /// Session for a merchant whose payload carried no store id.
    pub fn with_default_store(merchant_id: impl Into<String>) -> Self {
        Self::new(merchant_id, DEFAULT_STORE_ID)
    }
}

/// Division of a purchase between wallet redemption and cash payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CashbackSplit {
    pub purchase_amount: Amount,
    pub requested_cashback_use: Amount,
    pub wallet_balance: Amount,
    /// `min(requested, balance, purchase)`
    pub capped_cashback_used: Amount,
    /// `purchase - capped_cashback_used`, never negative.
    pub amount_payable: Amount,
}

/// Lifecycle status of a cashback transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Approved,
    #[default]
    Pending,
    Rejected,
    Canceled,
}

/// Where a transaction originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChannel {
    #[default]
    Qrcode,
    App,
    Pin,
}

/// Outbound record sent to the persistence boundary. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashbackTransactionRequest {
    pub user_id: UserId,
    pub merchant_id: String,
    pub store_id: String,
    pub purchase_amount: Amount,
    pub cashback_used: Amount,
    pub cashback_percent: Percent,
    pub status: TransactionStatus,
    pub source_channel: SourceChannel,
    pub qr_code_value: Option<String>,
    pub pin_value: Option<String>,
    /// Client-generated per attempt; the boundary deduplicates on it.
    pub idempotency_key: Uuid,
}

impl CashbackTransactionRequest {
    pub fn amount_payable(&self) -> Amount {
        self.purchase_amount.saturating_sub(self.cashback_used).non_negative()
    }

    /// `round2(amount_payable * cashback_percent / 100)`
    pub fn cashback_earned(&self) -> Amount {
        self.amount_payable().percent_of(self.cashback_percent)
    }
}

/// A transaction as persisted by the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub created_at: DateTime<Utc>,
    pub cashback_earned: Amount,
    #[serde(flatten)]
    pub request: CashbackTransactionRequest,
}

impl TransactionRecord {
    /// Persist `request`, assigning a fresh id and timestamp.
    pub fn persist(request: CashbackTransactionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            cashback_earned: request.cashback_earned(),
            request,
        }
    }

    pub fn amount_payable(&self) -> Amount {
        self.request.amount_payable()
    }
}

/// Read-only view of a user's cashback wallet, taken once per flow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub balance: Amount,
    pub total_earned: Amount,
    pub total_redeemed: Amount,
}

impl WalletSnapshot {
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

/// What the approved screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub amount_paid: Amount,
    pub cashback_used: Amount,
    pub cashback_earned: Amount,
    pub created_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for Receipt {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            transaction_id: record.id,
            amount_paid: record.amount_payable(),
            cashback_used: record.request.cashback_used,
            cashback_earned: record.cashback_earned,
            created_at: record.created_at,
        }
    }
}
