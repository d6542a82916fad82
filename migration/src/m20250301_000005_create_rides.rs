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
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(uuid(Ride::Id).primary_key())
                    .col(uuid(Ride::PassengerId).not_null())
                    .col(uuid_null(Ride::DriverId))
                    .col(string_len(Ride::PickupLocation, 255).not_null())
                    .col(double(Ride::PickupLat).not_null())
                    .col(double(Ride::PickupLng).not_null())
                    .col(string_len(Ride::DropoffLocation, 255).not_null())
                    .col(double(Ride::DropoffLat).not_null())
                    .col(double(Ride::DropoffLng).not_null())
                    .col(double(Ride::Fare).not_null())
                    .col(double(Ride::Distance).not_null())
                    .col(integer(Ride::EstimatedTime).not_null())
                    .col(string_len(Ride::PaymentMethod, 20).not_null())
                    .col(string_len(Ride::Status, 20).not_null())
                    .col(timestamp_with_time_zone_null(Ride::AcceptedAt))
                    .col(timestamp_with_time_zone_null(Ride::StartedAt))
                    .col(timestamp_with_time_zone_null(Ride::CompletedAt))
                    .col(
                        timestamp_with_time_zone(Ride::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_passenger")
                            .from(Ride::Table, Ride::PassengerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_driver")
                            .from(Ride::Table, Ride::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ride_status")
                    .table(Ride::Table)
                    .col(Ride::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Ride {
    Table,
    Id,
    PassengerId,
    DriverId,
    PickupLocation,
    PickupLat,
    PickupLng,
    DropoffLocation,
    DropoffLat,
    DropoffLng,
    Fare,
    Distance,
    EstimatedTime,
    PaymentMethod,
    Status,
    AcceptedAt,
    StartedAt,
    CompletedAt,
    CreatedAt,
}
