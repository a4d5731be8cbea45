use async_trait::async_trait;
use chrono::NaiveDate;
use model::entities::{occurrence, recurrence_rule};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::trace;

use super::RuleRepository;
use crate::error::{EngineError, Result};

/// SeaORM-backed repository used in production and integration tests.
#[derive(Debug, Clone)]
pub struct SeaOrmRuleRepository {
    db: DatabaseConnection,
}

impl SeaOrmRuleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Builds an active model with every rule column marked as changed, the
/// version column already bumped.
fn rule_to_active(
    rule: &recurrence_rule::Model,
    lock_version: i32,
) -> recurrence_rule::ActiveModel {
    recurrence_rule::ActiveModel {
        id: Set(rule.id),
        owner_id: Set(rule.owner_id),
        name: Set(rule.name.clone()),
        description: Set(rule.description.clone()),
        amount: Set(rule.amount),
        currency: Set(rule.currency.clone()),
        category_id: Set(rule.category_id),
        account_id: Set(rule.account_id),
        frequency_type: Set(rule.frequency_type),
        frequency_interval: Set(rule.frequency_interval),
        anchor_day: Set(rule.anchor_day),
        start_date: Set(rule.start_date),
        end_date: Set(rule.end_date),
        is_installment: Set(rule.is_installment),
        total_occurrences: Set(rule.total_occurrences),
        occurrences_generated: Set(rule.occurrences_generated),
        next_due_date: Set(rule.next_due_date),
        status: Set(rule.status),
        lock_version: Set(lock_version),
    }
}

#[async_trait]
impl RuleRepository for SeaOrmRuleRepository {
    async fn get_rule(&self, id: i32) -> Result<Option<recurrence_rule::Model>> {
        Ok(recurrence_rule::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn insert_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model> {
        let active = recurrence_rule::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            ..rule_to_active(&rule, rule.lock_version)
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn save_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model> {
        let read_version = rule.lock_version;
        let next_version = read_version + 1;

        // Compare-and-swap on the version column; a stale writer matches no
        // row and gets a conflict instead of clobbering newer state.
        let result = recurrence_rule::Entity::update_many()
            .set(rule_to_active(&rule, next_version))
            .filter(recurrence_rule::Column::Id.eq(rule.id))
            .filter(recurrence_rule::Column::LockVersion.eq(read_version))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(EngineError::ConcurrentModification(format!(
                "rule {} changed since it was read at version {}",
                rule.id, read_version
            )));
        }

        trace!("saved rule {} at version {}", rule.id, next_version);
        Ok(recurrence_rule::Model {
            lock_version: next_version,
            ..rule
        })
    }

    async fn get_occurrence(
        &self,
        rule_id: i32,
        sequence_index: i32,
    ) -> Result<Option<occurrence::Model>> {
        Ok(occurrence::Entity::find()
            .filter(occurrence::Column::RuleId.eq(rule_id))
            .filter(occurrence::Column::SequenceIndex.eq(sequence_index))
            .one(&self.db)
            .await?)
    }

    async fn save_occurrence(&self, occurrence: occurrence::Model) -> Result<occurrence::Model> {
        let active = occurrence::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            rule_id: Set(occurrence.rule_id),
            sequence_index: Set(occurrence.sequence_index),
            amount: Set(occurrence.amount),
            due_date: Set(occurrence.due_date),
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn list_occurrences(&self, rule_id: i32) -> Result<Vec<occurrence::Model>> {
        Ok(occurrence::Entity::find()
            .filter(occurrence::Column::RuleId.eq(rule_id))
            .order_by_asc(occurrence::Column::SequenceIndex)
            .all(&self.db)
            .await?)
    }

    async fn delete_future_occurrences(&self, rule_id: i32, after: NaiveDate) -> Result<u64> {
        let result = occurrence::Entity::delete_many()
            .filter(occurrence::Column::RuleId.eq(rule_id))
            .filter(occurrence::Column::DueDate.gt(after))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn list_due_rules(&self, as_of: NaiveDate) -> Result<Vec<recurrence_rule::Model>> {
        let rules = recurrence_rule::Entity::find()
            .filter(recurrence_rule::Column::Status.eq(recurrence_rule::RuleStatus::Active))
            .filter(recurrence_rule::Column::NextDueDate.lte(as_of))
            .order_by_asc(recurrence_rule::Column::Id)
            .all(&self.db)
            .await?;

        // Rules past their end date are due by cursor but will never
        // produce anything; drop them here rather than in every caller.
        Ok(rules
            .into_iter()
            .filter(|rule| rule.end_date.map_or(true, |end| rule.next_due_date <= end))
            .collect())
    }
}
