use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use model::entities::occurrence;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::generator::OccurrenceGenerator;
use crate::repository::RuleRepository;

/// Drives catch-up generation across every due rule.
///
/// Invoked by the periodic background job or by an on-demand catch-up call.
/// Failures are isolated per rule: one rule's error is logged and the rest
/// of the batch still runs.
pub struct SchedulerDriver {
    repo: Arc<dyn RuleRepository>,
    generator: Arc<OccurrenceGenerator>,
}

impl SchedulerDriver {
    pub fn new(repo: Arc<dyn RuleRepository>, generator: Arc<OccurrenceGenerator>) -> Self {
        Self { repo, generator }
    }

    /// Generates everything due on or before `as_of` and returns the newly
    /// created occurrences per rule. Rules that produced nothing new are
    /// omitted from the map.
    #[instrument(skip(self))]
    pub async fn run_catch_up(
        &self,
        as_of: NaiveDate,
    ) -> Result<HashMap<i32, Vec<occurrence::Model>>> {
        let due = self.repo.list_due_rules(as_of).await?;
        debug!("{} rules due as of {}", due.len(), as_of);

        let mut results = HashMap::new();
        let mut failures = 0usize;

        for rule in due {
            match self.generator.generate_due(rule.id, as_of).await {
                Ok(created) => {
                    if !created.is_empty() {
                        results.insert(rule.id, created);
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!("catch-up failed for rule {}: {}", rule.id, err);
                }
            }
        }

        info!(
            "catch-up as of {} generated occurrences for {} rules ({} failures)",
            as_of,
            results.len(),
            failures
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use model::entities::recurrence_rule;
    use sea_orm::DbErr;

    use super::*;
    use crate::error::EngineError;
    use crate::repository::memory::MemoryRuleRepository;
    use crate::testing::{date, monthly_rule};

    fn driver(repo: Arc<dyn RuleRepository>) -> SchedulerDriver {
        let generator = Arc::new(OccurrenceGenerator::new(repo.clone()));
        SchedulerDriver::new(repo, generator)
    }

    /// Repository wrapper that fails every occurrence write for one rule.
    struct FailingFor {
        inner: Arc<MemoryRuleRepository>,
        poisoned_rule_id: i32,
    }

    #[async_trait]
    impl RuleRepository for FailingFor {
        async fn get_rule(&self, id: i32) -> Result<Option<recurrence_rule::Model>> {
            self.inner.get_rule(id).await
        }
        async fn insert_rule(
            &self,
            rule: recurrence_rule::Model,
        ) -> Result<recurrence_rule::Model> {
            self.inner.insert_rule(rule).await
        }
        async fn save_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model> {
            self.inner.save_rule(rule).await
        }
        async fn get_occurrence(
            &self,
            rule_id: i32,
            sequence_index: i32,
        ) -> Result<Option<occurrence::Model>> {
            self.inner.get_occurrence(rule_id, sequence_index).await
        }
        async fn save_occurrence(
            &self,
            occurrence: occurrence::Model,
        ) -> Result<occurrence::Model> {
            if occurrence.rule_id == self.poisoned_rule_id {
                return Err(EngineError::Database(DbErr::Custom(
                    "injected write failure".to_string(),
                )));
            }
            self.inner.save_occurrence(occurrence).await
        }
        async fn list_occurrences(&self, rule_id: i32) -> Result<Vec<occurrence::Model>> {
            self.inner.list_occurrences(rule_id).await
        }
        async fn delete_future_occurrences(&self, rule_id: i32, after: NaiveDate) -> Result<u64> {
            self.inner.delete_future_occurrences(rule_id, after).await
        }
        async fn list_due_rules(&self, as_of: NaiveDate) -> Result<Vec<recurrence_rule::Model>> {
            self.inner.list_due_rules(as_of).await
        }
    }

    #[tokio::test]
    async fn test_catch_up_processes_all_due_rules() {
        let repo = Arc::new(MemoryRuleRepository::new());
        let first = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();
        let second = repo
            .insert_rule(monthly_rule("-9.50", date(2025, 8, 1)))
            .await
            .unwrap();
        // Not yet due.
        let later = repo
            .insert_rule(monthly_rule("-5.00", date(2026, 1, 1)))
            .await
            .unwrap();

        let driver = driver(repo.clone());
        let results = driver.run_catch_up(date(2025, 9, 1)).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[&first.id].len(), 4);
        assert_eq!(results[&second.id].len(), 2);
        assert!(!results.contains_key(&later.id));
    }

    #[tokio::test]
    async fn test_one_failing_rule_does_not_abort_the_batch() {
        let inner = Arc::new(MemoryRuleRepository::new());
        let healthy = inner
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();
        let poisoned = inner
            .insert_rule(monthly_rule("-9.50", date(2025, 6, 1)))
            .await
            .unwrap();

        let repo: Arc<dyn RuleRepository> = Arc::new(FailingFor {
            inner: inner.clone(),
            poisoned_rule_id: poisoned.id,
        });
        let driver = driver(repo);

        let results = driver.run_catch_up(date(2025, 9, 1)).await.unwrap();

        // The healthy rule is fully generated despite its neighbor failing.
        assert_eq!(results.len(), 1);
        assert_eq!(results[&healthy.id].len(), 4);

        // The failed rule's cursor was not advanced past its committed
        // occurrences, so a later retry starts from scratch.
        let stored = inner.get_rule(poisoned.id).await.unwrap().unwrap();
        assert_eq!(stored.occurrences_generated, 0);
        assert!(inner.list_occurrences(poisoned.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catch_up_is_idempotent_across_runs() {
        let repo = Arc::new(MemoryRuleRepository::new());
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let driver = driver(repo.clone());
        let first = driver.run_catch_up(date(2025, 9, 1)).await.unwrap();
        let second = driver.run_catch_up(date(2025, 9, 1)).await.unwrap();

        assert_eq!(first[&rule.id].len(), 4);
        assert!(second.is_empty());
        assert_eq!(repo.list_occurrences(rule.id).await.unwrap().len(), 4);
    }
}
