use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Profiles::Id)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Profiles::Handle).string_len(64).not_null())
                    .col(ColumnDef::new(Profiles::OwnedBy).string_len(42).not_null())
                    .col(
                        ColumnDef::new(Profiles::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Profiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_profiles_owned_by")
                    .table(Profiles::Table)
                    .col(Profiles::OwnedBy)
                    .to_owned(),
            )
            .await?;

        // Both keys are unique across every row, active or not: a binding
        // occupies its wallet and its profile forever.
        manager
            .create_table(
                Table::create()
                    .table(PremiumLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PremiumLinks::WalletAddress)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PremiumLinks::ProfileId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PremiumLinks::LinkedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PremiumLinks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PremiumLinks::DeactivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_premium_links_profile_id")
                    .table(PremiumLinks::Table)
                    .col(PremiumLinks::ProfileId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PremiumLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
    Handle,
    OwnedBy,
    IsDefault,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PremiumLinks {
    Table,
    WalletAddress,
    ProfileId,
    LinkedAt,
    IsActive,
    DeactivatedAt,
}
