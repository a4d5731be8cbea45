use model::entities::recurrence_rule;
use rust_decimal::Decimal;

use crate::amortization;
use crate::error::Result;

/// Read model summarizing an installment plan's progress.
/// Derived entirely from the amortization calculator and the rule's
/// counters; nothing here is persisted separately.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentSummary {
    pub total_amount: Decimal,
    pub total_occurrences: i32,
    pub occurrences_generated: i32,
    pub amount_paid: Decimal,
    /// Amount of the next occurrence; `None` once the plan has completed.
    pub next_installment_amount: Option<Decimal>,
    pub remaining_occurrences: i32,
}

/// Builds the summary for a rule, or `None` for non-installment rules.
pub fn installment_summary(
    rule: &recurrence_rule::Model,
) -> Result<Option<InstallmentSummary>> {
    let Some(total) = rule.total_occurrences.filter(|_| rule.is_installment) else {
        return Ok(None);
    };

    let generated = rule.occurrences_generated;
    let base = amortization::installment_amount(rule.amount, total)?;

    // The last occurrence absorbs the rounding remainder, so a completed
    // plan has paid exactly the total.
    let amount_paid = if generated == total {
        rule.amount
    } else {
        base * Decimal::from(generated)
    };

    let next_installment_amount = if generated < total {
        Some(amortization::amount_for_index(rule.amount, total, generated + 1)?)
    } else {
        None
    };

    Ok(Some(InstallmentSummary {
        total_amount: rule.amount,
        total_occurrences: total,
        occurrences_generated: generated,
        amount_paid,
        next_installment_amount,
        remaining_occurrences: total - generated,
    }))
}
