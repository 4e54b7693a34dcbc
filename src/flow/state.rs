use std::fmt;

use crate::model::{Receipt, TransactionId, TransactionRecord};

/// Where a flow is, without its payload. Published to observers on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Scanning,
    Input,
    Submitting,
    AwaitingMerchant,
    Approved,
    Rejected,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Approved | Phase::Rejected)
    }

    /// Whether the user may edit amounts.
    pub fn accepts_input(self) -> bool {
        self == Phase::Input
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Scanning => "scanning",
            Phase::Input => "input",
            Phase::Submitting => "submitting",
            Phase::AwaitingMerchant => "awaiting_merchant",
            Phase::Approved => "approved",
            Phase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Full state of a flow.
#[derive(Debug, Clone, Default)]
pub enum FlowState {
    #[default]
    Scanning,
    Input,
    Submitting,
    AwaitingMerchant { record: TransactionRecord },
    Approved { receipt: Receipt },
    /// `transaction` is set when a record was persisted before the rejection.
    Rejected {
        reason: String,
        transaction: Option<TransactionId>,
    },
}

impl FlowState {
    pub fn phase(&self) -> Phase {
        match self {
            FlowState::Scanning => Phase::Scanning,
            FlowState::Input => Phase::Input,
            FlowState::Submitting => Phase::Submitting,
            FlowState::AwaitingMerchant { .. } => Phase::AwaitingMerchant,
            FlowState::Approved { .. } => Phase::Approved,
            FlowState::Rejected { .. } => Phase::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_scanning() {
        assert_eq!(FlowState::default().phase(), Phase::Scanning);
    }

    #[test]
    fn terminal_phases() {
        assert!(Phase::Approved.is_terminal());
        assert!(Phase::Rejected.is_terminal());
        assert!(!Phase::AwaitingMerchant.is_terminal());
        assert!(Phase::Input.accepts_input());
        assert!(!Phase::Submitting.accepts_input());
    }

    #[test]
    fn phase_display_matches_wire_names() {
        assert_eq!(Phase::AwaitingMerchant.to_string(), "awaiting_merchant");
        assert_eq!(
            FlowState::Rejected {
                reason: "x".to_string(),
                transaction: None,
            }
            .phase()
            .to_string(),
            "rejected"
        );
    }
}
