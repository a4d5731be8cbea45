use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::occurrence;


/// Enum for the supported recurrence frequency types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(7))")]
pub enum FrequencyType {
    #[sea_orm(string_value = "Daily")]
    Daily,
    #[sea_orm(string_value = "Weekly")]
    Weekly,
    #[sea_orm(string_value = "Monthly")]
    Monthly,
    #[sea_orm(string_value = "Yearly")]
    Yearly,
}


/// Lifecycle state of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(9))")]
pub enum RuleStatus {
    /// The rule generates occurrences as they come due.
    #[sea_orm(string_value = "Active")]
    Active,
    /// Generation is suspended; the cursor is left untouched.
    #[sea_orm(string_value = "Paused")]
    Paused,
    /// An installment plan that generated its final occurrence.
    #[sea_orm(string_value = "Completed")]
    Completed,
    /// Soft-deleted. Past occurrences are kept as financial history.
    #[sea_orm(string_value = "Deleted")]
    Deleted,
}


/// A declarative recurring-transaction schedule.
/// Can describe an open-ended recurrence (rent, subscriptions, salary) or an
/// installment plan that amortizes a fixed total over a fixed number of
/// occurrences and then completes on its own.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurrence_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The owning user. Opaque to the engine.
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    /// For open-ended rules, the value of each occurrence. For installment
    /// plans, the total amount amortized over the plan.
    /// Positive for income, negative for expense.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    /// ISO currency code. The engine rounds to two minor-unit decimals.
    pub currency: String,
    /// Optional category reference, validated by collaborators.
    pub category_id: Option<i32>,
    /// The account affected by generated occurrences.
    pub account_id: i32,
    pub frequency_type: FrequencyType,
    /// How many periods to advance per occurrence. Must be positive.
    pub frequency_interval: i32,
    /// Day of month (1-31) that monthly and yearly occurrences anchor to.
    /// Clamped to the last day of shorter months.
    pub anchor_day: Option<i32>,
    /// The date of the first occurrence.
    pub start_date: NaiveDate,
    /// The date of the last occurrence. If null, it repeats indefinitely.
    pub end_date: Option<NaiveDate>,
    pub is_installment: bool,
    /// Number of occurrences before the rule self-terminates.
    /// Set if and only if `is_installment` is true.
    pub total_occurrences: Option<i32>,
    /// How many occurrences have been generated so far. Only rolls back
    /// when an update deletes future occurrences.
    pub occurrences_generated: i32,
    /// The due date of the next occurrence not yet generated.
    pub next_due_date: NaiveDate,
    pub status: RuleStatus,
    /// Optimistic-concurrency token, bumped on every successful save.
    pub lock_version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "occurrence::Entity")]
    Occurrence,
}

impl Related<occurrence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Occurrence.def()
    }
}

impl Model {
    /// A rule only generates occurrences while it is `Active`.
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }
}

impl ActiveModelBehavior for ActiveModel {}
