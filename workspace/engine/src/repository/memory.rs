use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use model::entities::{occurrence, recurrence_rule};

use super::RuleRepository;
use crate::error::{EngineError, Result};

/// In-memory repository with the same optimistic-concurrency semantics as
/// the SeaORM implementation. Used by the engine's unit tests.
#[derive(Debug, Default)]
pub struct MemoryRuleRepository {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    rules: HashMap<i32, recurrence_rule::Model>,
    occurrences: Vec<occurrence::Model>,
    next_rule_id: i32,
    next_occurrence_id: i32,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn get_rule(&self, id: i32) -> Result<Option<recurrence_rule::Model>> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        Ok(inner.rules.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        inner.next_rule_id += 1;
        let rule = recurrence_rule::Model {
            id: inner.next_rule_id,
            ..rule
        };
        inner.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn save_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        let stored_version = inner
            .rules
            .get(&rule.id)
            .map(|stored| stored.lock_version)
            .ok_or(EngineError::NotFound(rule.id))?;

        if stored_version != rule.lock_version {
            return Err(EngineError::ConcurrentModification(format!(
                "rule {} changed since it was read at version {}",
                rule.id, rule.lock_version
            )));
        }

        let saved = recurrence_rule::Model {
            lock_version: rule.lock_version + 1,
            ..rule
        };
        inner.rules.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_occurrence(
        &self,
        rule_id: i32,
        sequence_index: i32,
    ) -> Result<Option<occurrence::Model>> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        Ok(inner
            .occurrences
            .iter()
            .find(|o| o.rule_id == rule_id && o.sequence_index == sequence_index)
            .cloned())
    }

    async fn save_occurrence(&self, occurrence: occurrence::Model) -> Result<occurrence::Model> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        // Mirror the unique (rule_id, sequence_index) database index.
        if inner
            .occurrences
            .iter()
            .any(|o| o.rule_id == occurrence.rule_id && o.sequence_index == occurrence.sequence_index)
        {
            return Err(EngineError::Database(sea_orm::DbErr::RecordNotInserted));
        }

        inner.next_occurrence_id += 1;
        let saved = occurrence::Model {
            id: inner.next_occurrence_id,
            ..occurrence
        };
        inner.occurrences.push(saved.clone());
        Ok(saved)
    }

    async fn list_occurrences(&self, rule_id: i32) -> Result<Vec<occurrence::Model>> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        let mut occurrences: Vec<_> = inner
            .occurrences
            .iter()
            .filter(|o| o.rule_id == rule_id)
            .cloned()
            .collect();
        occurrences.sort_by_key(|o| o.sequence_index);
        Ok(occurrences)
    }

    async fn delete_future_occurrences(&self, rule_id: i32, after: NaiveDate) -> Result<u64> {
        let mut inner = self.inner.lock().expect("repository mutex poisoned");
        let before = inner.occurrences.len();
        inner
            .occurrences
            .retain(|o| o.rule_id != rule_id || o.due_date <= after);
        Ok((before - inner.occurrences.len()) as u64)
    }

    async fn list_due_rules(&self, as_of: NaiveDate) -> Result<Vec<recurrence_rule::Model>> {
        let inner = self.inner.lock().expect("repository mutex poisoned");
        let mut due: Vec<_> = inner
            .rules
            .values()
            .filter(|rule| rule.is_active() && rule.next_due_date <= as_of)
            .filter(|rule| rule.end_date.map_or(true, |end| rule.next_due_date <= end))
            .cloned()
            .collect();
        due.sort_by_key(|rule| rule.id);
        Ok(due)
    }
}
