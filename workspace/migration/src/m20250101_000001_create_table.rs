use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::{occurrence, recurrence_rule};
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create recurrence_rules table
        manager
            .create_table(
                Table::create()
                    .table(RecurrenceRule::table())
                    .if_not_exists()
                    .col(pk_auto(RecurrenceRule::column(recurrence_rule::Column::Id)))
                    .col(integer(RecurrenceRule::column(
                        recurrence_rule::Column::OwnerId,
                    )))
                    .col(string(RecurrenceRule::column(recurrence_rule::Column::Name)))
                    .col(string_null(RecurrenceRule::column(
                        recurrence_rule::Column::Description,
                    )))
                    .col(
                        decimal(RecurrenceRule::column(recurrence_rule::Column::Amount))
                            .decimal_len(16, 4),
                    )
                    .col(
                        string(RecurrenceRule::column(recurrence_rule::Column::Currency))
                            .string_len(3),
                    )
                    .col(integer_null(RecurrenceRule::column(
                        recurrence_rule::Column::CategoryId,
                    )))
                    .col(integer(RecurrenceRule::column(
                        recurrence_rule::Column::AccountId,
                    )))
                    .col(
                        string(RecurrenceRule::column(
                            recurrence_rule::Column::FrequencyType,
                        ))
                        .string_len(7),
                    )
                    .col(integer(RecurrenceRule::column(
                        recurrence_rule::Column::FrequencyInterval,
                    )))
                    .col(integer_null(RecurrenceRule::column(
                        recurrence_rule::Column::AnchorDay,
                    )))
                    .col(date(RecurrenceRule::column(
                        recurrence_rule::Column::StartDate,
                    )))
                    .col(date_null(RecurrenceRule::column(
                        recurrence_rule::Column::EndDate,
                    )))
                    .col(boolean(RecurrenceRule::column(
                        recurrence_rule::Column::IsInstallment,
                    )))
                    .col(integer_null(RecurrenceRule::column(
                        recurrence_rule::Column::TotalOccurrences,
                    )))
                    .col(
                        integer(RecurrenceRule::column(
                            recurrence_rule::Column::OccurrencesGenerated,
                        ))
                        .default(0),
                    )
                    .col(date(RecurrenceRule::column(
                        recurrence_rule::Column::NextDueDate,
                    )))
                    .col(
                        string(RecurrenceRule::column(recurrence_rule::Column::Status))
                            .string_len(9),
                    )
                    .col(
                        integer(RecurrenceRule::column(
                            recurrence_rule::Column::LockVersion,
                        ))
                        .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Create occurrences table
        manager
            .create_table(
                Table::create()
                    .table(Occurrence::table())
                    .if_not_exists()
                    .col(pk_auto(Occurrence::column(occurrence::Column::Id)))
                    .col(integer(Occurrence::column(occurrence::Column::RuleId)))
                    .col(integer(Occurrence::column(
                        occurrence::Column::SequenceIndex,
                    )))
                    .col(
                        decimal(Occurrence::column(occurrence::Column::Amount))
                            .decimal_len(16, 4),
                    )
                    .col(date(Occurrence::column(occurrence::Column::DueDate)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_occurrences_recurrence_rule")
                            .from(
                                Occurrence::table(),
                                Occurrence::column(occurrence::Column::RuleId),
                            )
                            .to(
                                RecurrenceRule::table(),
                                RecurrenceRule::column(recurrence_rule::Column::Id),
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The unique index that makes occurrence generation idempotent.
        manager
            .create_index(
                Index::create()
                    .name("idx_occurrences_rule_id_sequence_index")
                    .table(Occurrence::table())
                    .col(Occurrence::column(occurrence::Column::RuleId))
                    .col(Occurrence::column(occurrence::Column::SequenceIndex))
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index backing the due-rule scan of the scheduler driver.
        manager
            .create_index(
                Index::create()
                    .name("idx_recurrence_rules_status_next_due_date")
                    .table(RecurrenceRule::table())
                    .col(RecurrenceRule::column(recurrence_rule::Column::Status))
                    .col(RecurrenceRule::column(recurrence_rule::Column::NextDueDate))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Occurrence::table()).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RecurrenceRule::table()).to_owned())
            .await?;

        Ok(())
    }
}
