use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveDate;
use model::entities::{occurrence, recurrence_rule::RuleStatus};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, trace};

use crate::amortization;
use crate::error::{EngineError, Result};
use crate::repository::RuleRepository;
use crate::schedule::Frequency;

/// Materializes the occurrences a rule owes up to a given date.
///
/// Generation is an ordered catch-up loop: if the scheduler has not run for
/// N periods, one call produces all N missed occurrences with contiguous
/// sequence indices. The cursor (`next_due_date`, `occurrences_generated`)
/// is persisted once per call; each occurrence is persisted individually.
/// A replay after a mid-loop failure finds the already-committed occurrences
/// through the unique `(rule_id, sequence_index)` key, skips re-creating
/// them and still advances the in-memory cursor, so retries are safe.
pub struct OccurrenceGenerator {
    repo: Arc<dyn RuleRepository>,
    /// Per-rule generation locks. Two overlapping runs for the same rule
    /// must not interleave the read-generate-save cycle; the idempotent
    /// occurrence key is a second line of defense, not a substitute.
    locks: Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl OccurrenceGenerator {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn rule_lock(&self, rule_id: i32) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(rule_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Generates every occurrence of the rule due on or before `as_of` and
    /// returns the ones actually created by this call.
    #[instrument(skip(self))]
    pub async fn generate_due(
        &self,
        rule_id: i32,
        as_of: NaiveDate,
    ) -> Result<Vec<occurrence::Model>> {
        self.generate_due_with_deadline(rule_id, as_of, None).await
    }

    /// Like [`generate_due`](Self::generate_due), but stops before starting
    /// a new iteration once `deadline` has passed. An aborted call persists
    /// a cursor consistent with the occurrences committed so far, so the
    /// next call resumes where this one stopped.
    pub async fn generate_due_with_deadline(
        &self,
        rule_id: i32,
        as_of: NaiveDate,
        deadline: Option<Instant>,
    ) -> Result<Vec<occurrence::Model>> {
        let lock = self.rule_lock(rule_id);
        let _guard = lock.lock().await;

        let mut rule = self
            .repo
            .get_rule(rule_id)
            .await?
            .ok_or(EngineError::NotFound(rule_id))?;

        if !rule.is_active() {
            trace!("rule {} is {:?}, nothing to generate", rule.id, rule.status);
            return Ok(Vec::new());
        }

        let frequency = Frequency::from_rule(&rule)?;
        let mut created = Vec::new();
        let mut advanced = false;

        loop {
            if rule.next_due_date > as_of {
                break;
            }
            if let Some(end) = rule.end_date {
                if rule.next_due_date > end {
                    break;
                }
            }
            if rule.is_installment
                && rule.total_occurrences.is_some_and(|total| rule.occurrences_generated >= total)
            {
                break;
            }
            if let Some(deadline) = deadline {
                // Abort between iterations only, never mid-iteration.
                if Instant::now() >= deadline {
                    debug!("deadline reached generating rule {}, stopping early", rule.id);
                    break;
                }
            }

            let sequence_index = rule.occurrences_generated + 1;
            let amount = match rule.total_occurrences {
                Some(total) if rule.is_installment => {
                    amortization::amount_for_index(rule.amount, total, sequence_index)?
                }
                _ => rule.amount,
            };

            match self.repo.get_occurrence(rule.id, sequence_index).await? {
                Some(existing) => {
                    // Replay of an interrupted run: the occurrence was
                    // committed but the cursor was not. Advance without
                    // creating a duplicate.
                    trace!(
                        "occurrence {} of rule {} already exists for {}, skipping creation",
                        sequence_index, rule.id, existing.due_date
                    );
                }
                None => {
                    let saved = self
                        .repo
                        .save_occurrence(occurrence::Model {
                            id: 0,
                            rule_id: rule.id,
                            sequence_index,
                            amount,
                            due_date: rule.next_due_date,
                        })
                        .await?;
                    trace!(
                        "created occurrence {} of rule {} due {}",
                        sequence_index, rule.id, saved.due_date
                    );
                    created.push(saved);
                }
            }

            rule.occurrences_generated = sequence_index;
            rule.next_due_date = frequency.next_due_date(rule.next_due_date)?;
            advanced = true;

            if rule.is_installment && rule.total_occurrences == Some(rule.occurrences_generated) {
                info!("rule {} generated its final installment, completing", rule.id);
                rule.status = RuleStatus::Completed;
                break;
            }
        }

        if advanced {
            rule = self.repo.save_rule(rule).await?;
            debug!(
                "rule {} cursor advanced to {} after {} new occurrences",
                rule.id,
                rule.next_due_date,
                created.len()
            );
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use model::entities::recurrence_rule;

    use super::*;
    use crate::repository::memory::MemoryRuleRepository;
    use crate::testing::{date, dec, installment_rule, monthly_rule};

    /// Repository wrapper that slows every occurrence write, letting a
    /// deadline lapse while the generation loop is running.
    struct SlowWrites {
        inner: Arc<MemoryRuleRepository>,
        write_delay: Duration,
    }

    #[async_trait]
    impl RuleRepository for SlowWrites {
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
            tokio::time::sleep(self.write_delay).await;
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

    fn generator() -> (Arc<MemoryRuleRepository>, OccurrenceGenerator) {
        let repo = Arc::new(MemoryRuleRepository::new());
        let generator = OccurrenceGenerator::new(repo.clone());
        (repo, generator)
    }

    #[tokio::test]
    async fn test_monthly_subscription_catch_up() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let created = generator.generate_due(rule.id, date(2025, 9, 1)).await.unwrap();

        let dates: Vec<_> = created.iter().map(|o| o.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2025, 6, 1), date(2025, 7, 1), date(2025, 8, 1), date(2025, 9, 1)]
        );
        assert!(created.iter().all(|o| o.amount == dec("-15.99")));
        let indices: Vec<_> = created.iter().map(|o| o.sequence_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);

        let rule = repo.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(rule.next_due_date, date(2025, 10, 1));
        assert_eq!(rule.occurrences_generated, 4);
        assert!(rule.is_active());
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let first = generator.generate_due(rule.id, date(2025, 9, 1)).await.unwrap();
        let cursor_after_first = repo.get_rule(rule.id).await.unwrap().unwrap();

        let second = generator.generate_due(rule.id, date(2025, 9, 1)).await.unwrap();
        let cursor_after_second = repo.get_rule(rule.id).await.unwrap().unwrap();

        assert_eq!(first.len(), 4);
        assert!(second.is_empty());
        assert_eq!(
            cursor_after_first.occurrences_generated,
            cursor_after_second.occurrences_generated
        );
        assert_eq!(cursor_after_first.next_due_date, cursor_after_second.next_due_date);
        assert_eq!(repo.list_occurrences(rule.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_installment_natural_completion() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(installment_rule("-90.00", 3, date(2025, 1, 15)))
            .await
            .unwrap();

        let created = generator.generate_due(rule.id, date(2026, 1, 1)).await.unwrap();
        assert_eq!(created.len(), 3);

        let rule_after = repo.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(rule_after.status, RuleStatus::Completed);
        assert_eq!(rule_after.occurrences_generated, 3);

        // No fourth occurrence, even far in the future.
        let more = generator.generate_due(rule.id, date(2030, 1, 1)).await.unwrap();
        assert!(more.is_empty());
        assert_eq!(repo.list_occurrences(rule.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_installment_amounts_conserve_total() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(installment_rule("-100.00", 3, date(2025, 1, 15)))
            .await
            .unwrap();

        let created = generator.generate_due(rule.id, date(2025, 3, 15)).await.unwrap();
        let amounts: Vec<_> = created.iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![dec("-33.33"), dec("-33.33"), dec("-33.34")]);
        assert_eq!(amounts.iter().sum::<rust_decimal::Decimal>(), dec("-100.00"));
    }

    #[tokio::test]
    async fn test_end_date_stops_generation() {
        let (repo, generator) = generator();
        let mut rule = monthly_rule("-15.99", date(2025, 6, 1));
        rule.end_date = Some(date(2025, 7, 31));
        let rule = repo.insert_rule(rule).await.unwrap();

        let created = generator.generate_due(rule.id, date(2025, 12, 1)).await.unwrap();
        let dates: Vec<_> = created.iter().map(|o| o.due_date).collect();
        assert_eq!(dates, vec![date(2025, 6, 1), date(2025, 7, 1)]);
    }

    #[tokio::test]
    async fn test_paused_rule_generates_nothing() {
        let (repo, generator) = generator();
        let mut rule = monthly_rule("-15.99", date(2025, 6, 1));
        rule.status = RuleStatus::Paused;
        let rule = repo.insert_rule(rule).await.unwrap();

        let created = generator.generate_due(rule.id, date(2025, 9, 1)).await.unwrap();
        assert!(created.is_empty());

        let rule_after = repo.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(rule_after.occurrences_generated, 0);
        assert_eq!(rule_after.next_due_date, date(2025, 6, 1));
    }

    #[tokio::test]
    async fn test_replay_skips_committed_occurrence_and_advances_cursor() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        // Simulate a crash after the first occurrence committed but before
        // the cursor was persisted.
        repo.save_occurrence(occurrence::Model {
            id: 0,
            rule_id: rule.id,
            sequence_index: 1,
            amount: dec("-15.99"),
            due_date: date(2025, 6, 1),
        })
        .await
        .unwrap();

        let created = generator.generate_due(rule.id, date(2025, 8, 1)).await.unwrap();

        // Only the two genuinely new occurrences are reported.
        let indices: Vec<_> = created.iter().map(|o| o.sequence_index).collect();
        assert_eq!(indices, vec![2, 3]);

        let rule_after = repo.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(rule_after.occurrences_generated, 3);
        assert_eq!(repo.list_occurrences(rule.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_expired_deadline_aborts_before_first_iteration() {
        let (repo, generator) = generator();
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let expired = Instant::now() - Duration::from_secs(1);
        let created = generator
            .generate_due_with_deadline(rule.id, date(2025, 9, 1), Some(expired))
            .await
            .unwrap();

        assert!(created.is_empty());
        let rule_after = repo.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(rule_after.occurrences_generated, 0);
    }

    #[tokio::test]
    async fn test_mid_loop_deadline_stops_with_a_consistent_cursor() {
        let inner = Arc::new(MemoryRuleRepository::new());
        let rule = inner
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let repo: Arc<dyn RuleRepository> = Arc::new(SlowWrites {
            inner: inner.clone(),
            write_delay: Duration::from_millis(100),
        });
        let generator = OccurrenceGenerator::new(repo);

        // The deadline lapses while the first write is in flight, so the
        // loop stops after exactly one iteration.
        let deadline = Instant::now() + Duration::from_millis(20);
        let created = generator
            .generate_due_with_deadline(rule.id, date(2025, 9, 1), Some(deadline))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);

        // The persisted cursor matches the committed occurrences.
        let stored = inner.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(stored.occurrences_generated, 1);
        assert_eq!(stored.next_due_date, date(2025, 7, 1));
        assert_eq!(inner.list_occurrences(rule.id).await.unwrap().len(), 1);

        // A later run without a deadline resumes where this one stopped.
        let rest = generator.generate_due(rule.id, date(2025, 9, 1)).await.unwrap();
        let dates: Vec<_> = rest.iter().map(|o| o.due_date).collect();
        assert_eq!(dates, vec![date(2025, 7, 1), date(2025, 8, 1), date(2025, 9, 1)]);
    }

    #[tokio::test]
    async fn test_concurrent_generation_does_not_double_generate() {
        let (repo, generator) = generator();
        let generator = Arc::new(generator);
        let rule = repo
            .insert_rule(monthly_rule("-15.99", date(2025, 6, 1)))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            generator.generate_due(rule.id, date(2025, 9, 1)),
            generator.generate_due(rule.id, date(2025, 9, 1)),
        );

        // One invocation wins the per-rule lock and creates everything; the
        // other finds the cursor already advanced.
        assert_eq!(a.unwrap().len() + b.unwrap().len(), 4);
        assert_eq!(repo.list_occurrences(rule.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_rule_is_not_found() {
        let (_repo, generator) = generator();
        assert!(matches!(
            generator.generate_due(99, date(2025, 9, 1)).await,
            Err(EngineError::NotFound(99))
        ));
    }
}
