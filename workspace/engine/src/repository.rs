pub mod memory;
pub mod seaorm;

use async_trait::async_trait;
use chrono::NaiveDate;
use model::entities::{occurrence, recurrence_rule};

use crate::error::Result;

/// Abstract persistence for recurrence rules and their generated occurrences.
///
/// All engine I/O goes through this trait; the generator and lifecycle
/// manager never touch a database directly. The production implementation is
/// [`seaorm::SeaOrmRuleRepository`]; [`memory::MemoryRuleRepository`] backs
/// the engine's unit tests.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Fetches a rule by id, deleted rules included.
    async fn get_rule(&self, id: i32) -> Result<Option<recurrence_rule::Model>>;

    /// Inserts a new rule and returns it with its assigned id.
    async fn insert_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model>;

    /// Persists a rule under optimistic concurrency: the stored row must
    /// still carry the `lock_version` the caller read, otherwise the save
    /// fails with `ConcurrentModification`. Returns the rule with its
    /// version bumped.
    async fn save_rule(&self, rule: recurrence_rule::Model) -> Result<recurrence_rule::Model>;

    /// Fetches the occurrence at the given 1-based sequence index, if any.
    async fn get_occurrence(
        &self,
        rule_id: i32,
        sequence_index: i32,
    ) -> Result<Option<occurrence::Model>>;

    /// Inserts a new occurrence and returns it with its assigned id.
    async fn save_occurrence(&self, occurrence: occurrence::Model) -> Result<occurrence::Model>;

    /// All occurrences of a rule, ordered by sequence index.
    async fn list_occurrences(&self, rule_id: i32) -> Result<Vec<occurrence::Model>>;

    /// Deletes occurrences with a due date strictly after `after`.
    /// Returns the number of deleted rows.
    async fn delete_future_occurrences(&self, rule_id: i32, after: NaiveDate) -> Result<u64>;

    /// Active rules whose cursor is due on or before `as_of` and whose end
    /// date (when set) has not been passed.
    async fn list_due_rules(&self, as_of: NaiveDate) -> Result<Vec<recurrence_rule::Model>>;
}
