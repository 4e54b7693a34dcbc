//! Purchase/cashback split arithmetic.
//!
//! Never fails: every input is clamped to be non-negative and the redeemed
//! amount is capped by both the wallet balance and the purchase itself.

use crate::Amount;
use crate::model::CashbackSplit;

/// Compute how much of `purchase` is covered by the wallet and how much is payable.
pub fn compute_split(purchase: Amount, requested: Amount, balance: Amount) -> CashbackSplit {
    let purchase = purchase.non_negative();
    let requested = requested.non_negative();
    let balance = balance.non_negative();

    let capped = requested.min(balance).min(purchase);

    CashbackSplit {
        purchase_amount: purchase,
        requested_cashback_use: requested,
        wallet_balance: balance,
        capped_cashback_used: capped,
        amount_payable: purchase.saturating_sub(capped).non_negative(),
    }
}

/// The largest redemption allowed for this purchase ("use max").
pub fn use_max(purchase: Amount, balance: Amount) -> Amount {
    balance.non_negative().min(purchase.non_negative())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(value: f64) -> Amount {
        Amount::from_float(value)
    }

    #[test]
    fn end_to_end_scenario_split() {
        let split = compute_split(amt(150.0), amt(10.0), amt(10.0));
        assert_eq!(split.capped_cashback_used, amt(10.0));
        assert_eq!(split.amount_payable, amt(140.0));
    }

    #[test]
    fn request_capped_by_balance() {
        let split = compute_split(amt(100.0), amt(50.0), amt(12.5));
        assert_eq!(split.capped_cashback_used, amt(12.5));
        assert_eq!(split.amount_payable, amt(87.5));
    }

    #[test]
    fn request_capped_by_purchase() {
        let split = compute_split(amt(8.0), amt(50.0), amt(100.0));
        assert_eq!(split.capped_cashback_used, amt(8.0));
        assert_eq!(split.amount_payable, Amount::ZERO);
    }

    #[test]
    fn zero_purchase_yields_nothing() {
        for (requested, balance) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (99.99, 1000.0)] {
            let split = compute_split(Amount::ZERO, amt(requested), amt(balance));
            assert_eq!(split.capped_cashback_used, Amount::ZERO);
            assert_eq!(split.amount_payable, Amount::ZERO);
        }
    }

    #[test]
    fn zero_balance_never_redeems() {
        let split = compute_split(amt(40.0), amt(40.0), Amount::ZERO);
        assert_eq!(split.capped_cashback_used, Amount::ZERO);
        assert_eq!(split.amount_payable, amt(40.0));
    }

    #[test]
    fn negative_inputs_are_clamped() {
        let split = compute_split(amt(-5.0), amt(-1.0), amt(-3.0));
        assert_eq!(split, CashbackSplit::default());

        let split = compute_split(amt(30.0), amt(-1.0), amt(10.0));
        assert_eq!(split.requested_cashback_use, Amount::ZERO);
        assert_eq!(split.amount_payable, amt(30.0));
    }

    #[test]
    fn clamp_invariant_holds_over_grid() {
        let values = [0, 1, 7, 99, 100, 1_000, 15_000, 123_456];
        for &p in &values {
            for &r in &values {
                for &b in &values {
                    let (p, r, b) = (
                        Amount::from_scaled(p),
                        Amount::from_scaled(r),
                        Amount::from_scaled(b),
                    );
                    let split = compute_split(p, r, b);
                    assert!(split.capped_cashback_used >= Amount::ZERO);
                    assert!(split.capped_cashback_used <= r.min(b).min(p));
                    assert!(split.capped_cashback_used <= p);
                    assert!(split.capped_cashback_used <= b);
                    assert_eq!(split.amount_payable, p - split.capped_cashback_used);
                }
            }
        }
    }

    #[test]
    fn use_max_then_split_redeems_min_of_balance_and_purchase() {
        let cases = [(150.0, 10.0), (8.0, 100.0), (0.0, 5.0), (20.0, 0.0)];
        for (purchase, balance) in cases {
            let requested = use_max(amt(purchase), amt(balance));
            let split = compute_split(amt(purchase), requested, amt(balance));
            assert_eq!(split.capped_cashback_used, amt(balance).min(amt(purchase)));
        }
    }
}
