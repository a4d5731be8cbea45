use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use model::entities::recurrence_rule::{self, FrequencyType, RuleStatus};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::error::{EngineError, Result};
use crate::repository::RuleRepository;
use crate::schedule::Frequency;

/// Declarative input for creating a rule.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub category_id: Option<i32>,
    pub account_id: i32,
    pub frequency_type: FrequencyType,
    pub frequency_interval: i32,
    pub anchor_day: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_installment: bool,
    pub total_occurrences: Option<i32>,
}

impl RuleSpec {
    fn validate(&self) -> Result<()> {
        Frequency::new(self.frequency_type, self.frequency_interval, self.anchor_day)?;

        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("rule name must not be empty".to_string()));
        }
        if self.currency.trim().is_empty() {
            return Err(EngineError::Validation("currency must not be empty".to_string()));
        }
        if self.amount == Decimal::ZERO {
            return Err(EngineError::Validation("amount must not be zero".to_string()));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(EngineError::Validation(format!(
                    "end date {} is before start date {}",
                    end, self.start_date
                )));
            }
        }

        match (self.is_installment, self.total_occurrences) {
            (true, None) => Err(EngineError::Validation(
                "installment rules require total_occurrences".to_string(),
            )),
            (true, Some(total)) if total <= 0 => Err(EngineError::InvalidInstallmentPlan(format!(
                "total occurrences must be positive, got {total}"
            ))),
            (false, Some(_)) => Err(EngineError::Validation(
                "total_occurrences is only valid for installment rules".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Partial update of a rule's shape. `None` fields are left unchanged.
/// The start date and the installment flag are fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category_id: Option<i32>,
    pub account_id: Option<i32>,
    pub frequency_type: Option<FrequencyType>,
    pub frequency_interval: Option<i32>,
    pub anchor_day: Option<i32>,
    pub end_date: Option<NaiveDate>,
    pub total_occurrences: Option<i32>,
}

/// Governs a rule's lifecycle: creation, mid-stream edits, pause/resume and
/// soft deletion, including the reconciliation of already-generated future
/// occurrences when a rule's shape changes.
pub struct RuleLifecycleManager {
    repo: Arc<dyn RuleRepository>,
    /// Fixed "today" for tests; falls back to the current UTC date.
    today: Option<NaiveDate>,
}

impl RuleLifecycleManager {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self { repo, today: None }
    }

    /// Uses the provided date as "today" instead of the current date.
    pub fn new_with_today(repo: Arc<dyn RuleRepository>, today: NaiveDate) -> Self {
        Self {
            repo,
            today: Some(today),
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Validates and persists a new rule. The cursor starts at the start
    /// date with nothing generated.
    #[instrument(skip(self, spec), fields(owner_id = spec.owner_id))]
    pub async fn create(&self, spec: RuleSpec) -> Result<recurrence_rule::Model> {
        spec.validate()?;

        let rule = recurrence_rule::Model {
            id: 0,
            owner_id: spec.owner_id,
            name: spec.name,
            description: spec.description,
            amount: spec.amount,
            currency: spec.currency,
            category_id: spec.category_id,
            account_id: spec.account_id,
            frequency_type: spec.frequency_type,
            frequency_interval: spec.frequency_interval,
            anchor_day: spec.anchor_day,
            start_date: spec.start_date,
            end_date: spec.end_date,
            is_installment: spec.is_installment,
            total_occurrences: spec.total_occurrences,
            occurrences_generated: 0,
            next_due_date: spec.start_date,
            status: RuleStatus::Active,
            lock_version: 0,
        };

        let saved = self.repo.insert_rule(rule).await?;
        info!("created recurrence rule {} for owner {}", saved.id, saved.owner_id);
        Ok(saved)
    }

    /// Applies a partial update to a rule.
    ///
    /// With `delete_future` set, occurrences dated after today are removed,
    /// the counter is reset to the surviving (past) occurrences and the
    /// cursor is recomputed from the last past occurrence under the updated
    /// frequency. Without it, only the rule's metadata changes and
    /// already-generated future occurrences stay under the old schedule.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        rule_id: i32,
        update: RuleUpdate,
        delete_future: bool,
    ) -> Result<recurrence_rule::Model> {
        let mut rule = self.get_existing(rule_id).await?;

        // Shrink rejection happens against the counter as it stands now,
        // before any mutation: a failing update leaves the rule untouched.
        if let Some(new_total) = update.total_occurrences {
            if !rule.is_installment {
                return Err(EngineError::Validation(
                    "total_occurrences is only valid for installment rules".to_string(),
                ));
            }
            if new_total <= 0 {
                return Err(EngineError::InvalidInstallmentPlan(format!(
                    "total occurrences must be positive, got {new_total}"
                )));
            }
            if new_total < rule.occurrences_generated {
                return Err(EngineError::InvalidInstallmentPlan(format!(
                    "cannot reduce total occurrences to {} below the {} already generated",
                    new_total, rule.occurrences_generated
                )));
            }
        }

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = Some(description);
        }
        if let Some(amount) = update.amount {
            if amount == Decimal::ZERO {
                return Err(EngineError::Validation("amount must not be zero".to_string()));
            }
            rule.amount = amount;
        }
        if let Some(category_id) = update.category_id {
            rule.category_id = Some(category_id);
        }
        if let Some(account_id) = update.account_id {
            rule.account_id = account_id;
        }
        if let Some(frequency_type) = update.frequency_type {
            rule.frequency_type = frequency_type;
            // An anchor day only means something for month-based types.
            // Switching to Daily/Weekly drops the stored anchor unless the
            // caller supplies a new one, which validation below rejects.
            if matches!(frequency_type, FrequencyType::Daily | FrequencyType::Weekly)
                && update.anchor_day.is_none()
            {
                rule.anchor_day = None;
            }
        }
        if let Some(interval) = update.frequency_interval {
            rule.frequency_interval = interval;
        }
        if let Some(anchor_day) = update.anchor_day {
            rule.anchor_day = Some(anchor_day);
        }
        if let Some(end_date) = update.end_date {
            if end_date < rule.start_date {
                return Err(EngineError::Validation(format!(
                    "end date {} is before start date {}",
                    end_date, rule.start_date
                )));
            }
            rule.end_date = Some(end_date);
        }
        if let Some(total) = update.total_occurrences {
            rule.total_occurrences = Some(total);
        }

        // Validates the merged frequency shape.
        let frequency = Frequency::from_rule(&rule)?;

        if delete_future {
            let today = self.today();
            let removed = self.repo.delete_future_occurrences(rule_id, today).await?;
            debug!("removed {} future occurrences of rule {}", removed, rule_id);

            let remaining = self.repo.list_occurrences(rule_id).await?;
            rule.occurrences_generated = remaining.len() as i32;
            rule.next_due_date = match remaining.last() {
                Some(last) => frequency.next_due_date(last.due_date)?,
                None => rule.start_date,
            };
        }

        // Growing the plan (or rolling the counter back) reopens a
        // naturally completed rule.
        if rule.status == RuleStatus::Completed
            && rule
                .total_occurrences
                .is_some_and(|total| rule.occurrences_generated < total)
        {
            info!("rule {} reopened by update", rule.id);
            rule.status = RuleStatus::Active;
        }

        let saved = self.repo.save_rule(rule).await?;
        info!("updated rule {}", saved.id);
        Ok(saved)
    }

    /// Marks the rule deleted. Future occurrences are optionally removed;
    /// past occurrences are financial history and are never deleted here.
    #[instrument(skip(self))]
    pub async fn delete(&self, rule_id: i32, delete_future: bool) -> Result<()> {
        let mut rule = self.get_existing(rule_id).await?;

        if delete_future {
            let removed = self
                .repo
                .delete_future_occurrences(rule_id, self.today())
                .await?;
            debug!("removed {} future occurrences of deleted rule {}", removed, rule_id);
        }

        rule.status = RuleStatus::Deleted;
        self.repo.save_rule(rule).await?;
        info!("deleted rule {}", rule_id);
        Ok(())
    }

    /// Suspends generation. The cursor is left untouched, so resuming picks
    /// up exactly where the rule stopped. Pausing a paused rule is a no-op.
    #[instrument(skip(self))]
    pub async fn pause(&self, rule_id: i32) -> Result<recurrence_rule::Model> {
        let mut rule = self.get_existing(rule_id).await?;
        match rule.status {
            RuleStatus::Active => {
                rule.status = RuleStatus::Paused;
                let saved = self.repo.save_rule(rule).await?;
                info!("paused rule {}", rule_id);
                Ok(saved)
            }
            RuleStatus::Paused => Ok(rule),
            status => Err(EngineError::Validation(format!(
                "cannot pause a {status:?} rule"
            ))),
        }
    }

    /// Reactivates a paused rule. Resuming an active rule is a no-op;
    /// completed rules can only be reopened through `update`.
    #[instrument(skip(self))]
    pub async fn resume(&self, rule_id: i32) -> Result<recurrence_rule::Model> {
        let mut rule = self.get_existing(rule_id).await?;
        match rule.status {
            RuleStatus::Paused => {
                rule.status = RuleStatus::Active;
                let saved = self.repo.save_rule(rule).await?;
                info!("resumed rule {}", rule_id);
                Ok(saved)
            }
            RuleStatus::Active => Ok(rule),
            status => Err(EngineError::Validation(format!(
                "cannot resume a {status:?} rule"
            ))),
        }
    }

    async fn get_existing(&self, rule_id: i32) -> Result<recurrence_rule::Model> {
        match self.repo.get_rule(rule_id).await? {
            Some(rule) if rule.status != RuleStatus::Deleted => Ok(rule),
            _ => Err(EngineError::NotFound(rule_id)),
        }
    }
}
