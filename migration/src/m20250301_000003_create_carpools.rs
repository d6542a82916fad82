use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carpool::Table)
                    .if_not_exists()
                    .col(uuid(Carpool::Id).primary_key())
                    .col(string_len(Carpool::FromLocation, 255).not_null())
                    .col(string_len(Carpool::ToLocation, 255).not_null())
                    .col(timestamp_with_time_zone(Carpool::DepartureTime).not_null())
                    .col(integer(Carpool::AvailableSeats).not_null())
                    .col(double(Carpool::PricePerSeat).not_null())
                    .col(text(Carpool::Description).not_null())
                    .col(uuid(Carpool::DriverId).not_null())
                    .col(
                        timestamp_with_time_zone(Carpool::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Carpool::AvailableSeats).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_driver")
                            .from(Carpool::Table, Carpool::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Carpool::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Carpool {
    Table,
    Id,
    FromLocation,
    ToLocation,
    DepartureTime,
    AvailableSeats,
    PricePerSeat,
    Description,
    DriverId,
    CreatedAt,
}
