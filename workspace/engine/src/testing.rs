//! Shared helpers for the engine's unit tests.

use chrono::{Datelike, NaiveDate};
use model::entities::recurrence_rule::{FrequencyType, Model, RuleStatus};
use rust_decimal::Decimal;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// An open-ended monthly rule anchored on the start date's day of month.
pub fn monthly_rule(amount: &str, start: NaiveDate) -> Model {
    Model {
        id: 0,
        owner_id: 1,
        name: "Subscription".to_string(),
        description: None,
        amount: dec(amount),
        currency: "EUR".to_string(),
        category_id: None,
        account_id: 1,
        frequency_type: FrequencyType::Monthly,
        frequency_interval: 1,
        anchor_day: Some(start.day() as i32),
        start_date: start,
        end_date: None,
        is_installment: false,
        total_occurrences: None,
        occurrences_generated: 0,
        next_due_date: start,
        status: RuleStatus::Active,
        lock_version: 0,
    }
}

/// A monthly installment plan amortizing `total` over `total_occurrences`.
pub fn installment_rule(total: &str, total_occurrences: i32, start: NaiveDate) -> Model {
    Model {
        name: "Installment plan".to_string(),
        is_installment: true,
        total_occurrences: Some(total_occurrences),
        ..monthly_rule(total, start)
    }
}
