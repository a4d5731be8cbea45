use rust_decimal::Decimal;

use crate::error::{EngineError, Result};

/// Minor-unit scale used for installment rounding (EUR/USD cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Base per-occurrence amount of an installment plan.
///
/// `round_dp` rounds half to even (banker's rounding), so the base amount is
/// the fair division of the total at minor-unit precision.
pub fn installment_amount(total_amount: Decimal, total_occurrences: i32) -> Result<Decimal> {
    if total_occurrences <= 0 {
        return Err(EngineError::InvalidInstallmentPlan(format!(
            "total occurrences must be positive, got {total_occurrences}"
        )));
    }

    Ok((total_amount / Decimal::from(total_occurrences)).round_dp(MINOR_UNIT_SCALE))
}

/// Exact amount of the occurrence at the given 1-based `sequence_index`.
///
/// Every occurrence pays the rounded base amount except the last, which
/// absorbs the rounding remainder so the series sums exactly to
/// `total_amount`.
pub fn amount_for_index(
    total_amount: Decimal,
    total_occurrences: i32,
    sequence_index: i32,
) -> Result<Decimal> {
    let base = installment_amount(total_amount, total_occurrences)?;

    if sequence_index < 1 || sequence_index > total_occurrences {
        return Err(EngineError::InvalidInstallmentPlan(format!(
            "sequence index {sequence_index} outside plan of {total_occurrences} occurrences"
        )));
    }

    if sequence_index == total_occurrences {
        Ok(total_amount - base * Decimal::from(total_occurrences - 1))
    } else {
        Ok(base)
    }
}

/// Balance still to be amortized after `occurrences_generated` occurrences.
///
/// Display-only figure; generation always uses the exact per-index amounts
/// from `amount_for_index`.
pub fn remaining_balance(
    total_amount: Decimal,
    total_occurrences: i32,
    occurrences_generated: i32,
) -> Result<Decimal> {
    let base = installment_amount(total_amount, total_occurrences)?;

    if occurrences_generated < 0 || occurrences_generated > total_occurrences {
        return Err(EngineError::InvalidInstallmentPlan(format!(
            "{occurrences_generated} generated occurrences outside plan of {total_occurrences}"
        )));
    }

    Ok(total_amount - Decimal::from(occurrences_generated) * base)
}
