use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Role is stored as its canonical uppercase name so the schema stays
        // portable between Postgres and SQLite.
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len_null(User::PasswordHash, 255))
                    .col(string_len_null(User::GoogleId, 255).unique_key())
                    .col(string_len(User::Name, 100).not_null())
                    .col(string_len_null(User::Phone, 32))
                    .col(string_len(User::Role, 20).not_null())
                    .col(boolean(User::IsVerified).not_null().default(false))
                    .col(string_len_null(User::LicenseNumber, 64))
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Email,
    PasswordHash,
    GoogleId,
    Name,
    Phone,
    Role,
    IsVerified,
    LicenseNumber,
    CreatedAt,
}
