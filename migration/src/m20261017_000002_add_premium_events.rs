use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Outbox for premium lifecycle events, appended by the event dispatcher
        manager
            .create_table(
                Table::create()
                    .table(PremiumEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PremiumEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PremiumEvents::EventType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PremiumEvents::WalletAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PremiumEvents::Payload).json().not_null())
                    .col(
                        ColumnDef::new(PremiumEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PremiumEvents::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_premium_events_wallet_time")
                    .table(PremiumEvents::Table)
                    .col(PremiumEvents::WalletAddress)
                    .col(PremiumEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PremiumEvents::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum PremiumEvents {
    Table,
    Id,
    EventType,
    WalletAddress,
    Payload,
    OccurredAt,
    RecordedAt,
}
