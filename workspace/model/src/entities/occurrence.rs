use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::recurrence_rule;

/// A single concrete transaction materialized from a recurrence rule at a
/// specific due date. Generation is idempotent: the `(rule_id,
/// sequence_index)` pair is unique, so replaying a generation pass never
/// creates a duplicate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "occurrences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The rule that generated this occurrence.
    pub rule_id: i32,

    /// 1-based position within the rule's occurrence stream.
    pub sequence_index: i32,

    /// The amortized amount for installment plans, the rule amount otherwise.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,

    /// The calendar date this occurrence represents.
    pub due_date: NaiveDate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each occurrence belongs to one recurrence rule.
    #[sea_orm(
        belongs_to = "recurrence_rule::Entity",
        from = "Column::RuleId",
        to = "recurrence_rule::Column::Id",
        on_delete = "Cascade"
    )]
    RecurrenceRule,
}

impl Related<recurrence_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurrenceRule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
