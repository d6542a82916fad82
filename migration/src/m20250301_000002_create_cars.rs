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
                    .table(Car::Table)
                    .if_not_exists()
                    .col(uuid(Car::Id).primary_key())
                    .col(string_len(Car::Make, 100).not_null())
                    .col(string_len(Car::Model, 100).not_null())
                    .col(integer(Car::Year).not_null())
                    .col(string_len(Car::Color, 50).not_null())
                    .col(double(Car::PricePerDay).not_null())
                    .col(double_null(Car::HourlyRate))
                    .col(string_len(Car::Location, 255).not_null())
                    .col(string_len_null(Car::LicensePlate, 32))
                    .col(text(Car::Description).not_null())
                    .col(string_len(Car::ImageUrl, 1024).not_null())
                    .col(boolean(Car::Available).not_null().default(true))
                    .col(boolean(Car::Listed).not_null().default(true))
                    .col(uuid(Car::OwnerId).not_null())
                    .col(
                        timestamp_with_time_zone(Car::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_car_owner")
                            .from(Car::Table, Car::OwnerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Car::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Car {
    Table,
    Id,
    Make,
    Model,
    Year,
    Color,
    PricePerDay,
    HourlyRate,
    Location,
    LicensePlate,
    Description,
    ImageUrl,
    Available,
    Listed,
    OwnerId,
    CreatedAt,
}
