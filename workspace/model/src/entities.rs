//! This file serves as the root for all SeaORM entity modules.
//! The recurrence engine persists exactly two things: the declarative
//! recurrence rules and the concrete occurrences generated from them.

pub mod occurrence;
pub mod recurrence_rule;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::occurrence::Entity as Occurrence;
    pub use super::recurrence_rule::Entity as RecurrenceRule;
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");

        Ok(db)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_rule_roundtrip() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let rule = recurrence_rule::ActiveModel {
            owner_id: Set(1),
            name: Set("Rent".to_string()),
            description: Set(None),
            amount: Set(Decimal::new(-120000, 2)),
            currency: Set("EUR".to_string()),
            category_id: Set(None),
            account_id: Set(1),
            frequency_type: Set(recurrence_rule::FrequencyType::Monthly),
            frequency_interval: Set(1),
            anchor_day: Set(Some(1)),
            start_date: Set(date(2025, 6, 1)),
            end_date: Set(None),
            is_installment: Set(false),
            total_occurrences: Set(None),
            occurrences_generated: Set(0),
            next_due_date: Set(date(2025, 6, 1)),
            status: Set(recurrence_rule::RuleStatus::Active),
            lock_version: Set(0),
            ..Default::default()
        };
        let rule = rule.insert(&db).await?;

        let found = RecurrenceRule::find_by_id(rule.id).one(&db).await?.unwrap();
        assert_eq!(found.frequency_type, recurrence_rule::FrequencyType::Monthly);
        assert_eq!(found.status, recurrence_rule::RuleStatus::Active);
        assert!(found.is_active());
        assert_eq!(found.amount, Decimal::new(-120000, 2));

        Ok(())
    }

    #[tokio::test]
    async fn test_occurrence_unique_per_rule_and_sequence() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let rule = recurrence_rule::ActiveModel {
            owner_id: Set(1),
            name: Set("Loan".to_string()),
            description: Set(None),
            amount: Set(Decimal::new(-600000, 2)),
            currency: Set("EUR".to_string()),
            category_id: Set(None),
            account_id: Set(1),
            frequency_type: Set(recurrence_rule::FrequencyType::Monthly),
            frequency_interval: Set(1),
            anchor_day: Set(Some(15)),
            start_date: Set(date(2025, 1, 15)),
            end_date: Set(None),
            is_installment: Set(true),
            total_occurrences: Set(Some(24)),
            occurrences_generated: Set(0),
            next_due_date: Set(date(2025, 1, 15)),
            status: Set(recurrence_rule::RuleStatus::Active),
            lock_version: Set(0),
            ..Default::default()
        };
        let rule = rule.insert(&db).await?;

        let first = occurrence::ActiveModel {
            rule_id: Set(rule.id),
            sequence_index: Set(1),
            amount: Set(Decimal::new(-25000, 2)),
            due_date: Set(date(2025, 1, 15)),
            ..Default::default()
        };
        first.insert(&db).await?;

        // The unique (rule_id, sequence_index) index must reject a duplicate.
        let duplicate = occurrence::ActiveModel {
            rule_id: Set(rule.id),
            sequence_index: Set(1),
            amount: Set(Decimal::new(-25000, 2)),
            due_date: Set(date(2025, 1, 15)),
            ..Default::default()
        };
        assert!(duplicate.insert(&db).await.is_err());

        let count = Occurrence::find()
            .filter(occurrence::Column::RuleId.eq(rule.id))
            .all(&db)
            .await?
            .len();
        assert_eq!(count, 1);

        Ok(())
    }
}
