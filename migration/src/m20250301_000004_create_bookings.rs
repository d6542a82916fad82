use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;
use super::m20250301_000002_create_cars::Car;
use super::m20250301_000003_create_carpools::Carpool;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::UserId).not_null())
                    .col(uuid_null(Booking::CarId))
                    .col(uuid_null(Booking::CarpoolId))
                    .col(timestamp_with_time_zone(Booking::StartDate).not_null())
                    .col(timestamp_with_time_zone_null(Booking::EndDate))
                    .col(double(Booking::TotalPrice).not_null())
                    .col(string_len(Booking::Status, 20).not_null())
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_car")
                            .from(Booking::Table, Booking::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    // Cancelled carpools are deleted; their bookings stay as history.
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_carpool")
                            .from(Booking::Table, Booking::CarpoolId)
                            .to(Carpool::Table, Carpool::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    UserId,
    CarId,
    CarpoolId,
    StartDate,
    EndDate,
    TotalPrice,
    Status,
    CreatedAt,
}
