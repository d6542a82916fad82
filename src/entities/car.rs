use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub make: String,
    #[sea_orm(column_name = "model")]
    #[serde(rename = "model")]
    pub model_name: String,
    pub year: i32,
    pub color: String,
    pub price_per_day: f64,
    pub hourly_rate: Option<f64>,
    pub location: String,
    pub license_plate: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub image_url: String,
    /// Bookable right now: listed and not held by an open booking.
    pub available: bool,
    /// Offered for rent by the owner.
    pub listed: bool,
    pub owner_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
