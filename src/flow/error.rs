//! Error types for the cashback flow.

use std::time::Duration;

use thiserror::Error;

use super::Phase;
use crate::confirmation::ApprovalError;
use crate::gateway::GatewayError;
use crate::qr::QrError;
use crate::scan::ScanError;

/// Top-level error returned by [`CashbackFlow`](super::CashbackFlow) actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(transparent)]
    InvalidPayload(#[from] QrError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error("confirmation failed: {0}")]
    Approval(#[from] ApprovalError),

    #[error("{action} is not allowed while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("flow cancelled")]
    Cancelled,
}

/// Input that must not reach the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("purchase amount must be greater than zero")]
    NonPositivePurchase,
    #[error("no merchant has been scanned")]
    MissingMerchant,
}

/// Failure of the outbound transaction call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("no response after {0:?}")]
    Timeout(Duration),
}
