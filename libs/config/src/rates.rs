//! Nigerian tax rates and thresholds used verbatim by the classifier and by
//! callers enriching a classified transaction. These are domain facts,
//! not tuning knobs, so they are constants rather than config fields.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Standard VAT rate applied when `tax_category == StandardRate`.
pub const VAT_STANDARD_RATE: Decimal = dec!(0.075);

/// Flat estimate used when a transaction needs a withholding-tax figure.
pub const WITHHOLDING_TAX_RATE: Decimal = dec!(0.05);

/// Transactions at or below this amount never attract stamp duty.
pub const STAMP_DUTY_THRESHOLD_NGN: Decimal = dec!(1000);

/// Flat stamp duty charged above `STAMP_DUTY_THRESHOLD_NGN`.
pub const STAMP_DUTY_FLAT_NGN: Decimal = dec!(50);

/// Commission-on-turnover rate, capped below.
pub const COMMISSION_ON_TURNOVER_RATE: Decimal = dec!(0.005);

/// Cap applied to the commission-on-turnover calculation.
pub const COMMISSION_ON_TURNOVER_CAP_NGN: Decimal = dec!(3000);

/// Computes VAT due on an amount already known to be standard-rated.
pub fn vat_due(amount: Decimal) -> Decimal {
    amount * VAT_STANDARD_RATE
}

/// Computes stamp duty due on an amount, which is zero at or below the
/// threshold and a flat fee above it.
pub fn stamp_duty_due(amount: Decimal) -> Decimal {
    if amount > STAMP_DUTY_THRESHOLD_NGN {
        STAMP_DUTY_FLAT_NGN
    } else {
        Decimal::ZERO
    }
}

/// Computes commission-on-turnover, capped at `COMMISSION_ON_TURNOVER_CAP_NGN`.
pub fn commission_on_turnover(amount: Decimal) -> Decimal {
    (amount * COMMISSION_ON_TURNOVER_RATE).min(COMMISSION_ON_TURNOVER_CAP_NGN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_duty_is_flat_above_threshold() {
        assert_eq!(stamp_duty_due(dec!(999)), Decimal::ZERO);
        assert_eq!(stamp_duty_due(dec!(1000)), Decimal::ZERO);
        assert_eq!(stamp_duty_due(dec!(1001)), STAMP_DUTY_FLAT_NGN);
    }

    #[test]
    fn commission_is_capped() {
        assert_eq!(commission_on_turnover(dec!(100_000)), dec!(500));
        assert_eq!(commission_on_turnover(dec!(10_000_000)), COMMISSION_ON_TURNOVER_CAP_NGN);
    }
}
