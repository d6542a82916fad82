//! Car rentals and carpool seats.
//!
//! Capacity is claimed with conditional updates inside the same transaction
//! as the booking row, so two requests racing for the last seat (or the same
//! car) cannot both succeed.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::{car, carpool};
use crate::error::{AppError, AppResult};
use crate::policy::{authorize, Action, Actor};
use crate::services::fare;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub car_id: Option<Uuid>,
    pub carpool_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Who initiated a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledBy {
    Passenger,
    /// The owner of the rented car.
    Owner,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub car: Option<car::Model>,
    pub carpool: Option<carpool::Model>,
}

pub async fn create_booking(
    db: &DatabaseConnection,
    user_id: Uuid,
    request: NewBooking,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;

    let (car_id, carpool_id, start_date, end_date, total_price) =
        match (request.car_id, request.carpool_id) {
            (Some(car_id), None) => {
                let car = car::Entity::find_by_id(car_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

                if car.owner_id == user_id {
                    return Err(AppError::BadRequest("You cannot book your own car".to_string()));
                }

                let start = request
                    .start_date
                    .ok_or_else(|| AppError::BadRequest("Start date is required".to_string()))?;
                let end = request.end_date.ok_or_else(|| {
                    AppError::BadRequest("End date is required for car bookings".to_string())
                })?;
                let price = fare::rental_price(car.price_per_day, car.hourly_rate, start, end)?;

                let claimed = car::Entity::update_many()
                    .col_expr(car::Column::Available, Expr::value(false))
                    .filter(car::Column::Id.eq(car.id))
                    .filter(car::Column::Available.eq(true))
                    .exec(&txn)
                    .await?;

                if claimed.rows_affected == 0 {
                    tracing::warn!(car_id = %car.id, user_id = %user_id, "Car already taken");
                    return Err(AppError::Conflict("Car is not available".to_string()));
                }

                (Some(car.id), None, start, Some(end), price)
            }
            (None, Some(carpool_id)) => {
                let carpool = carpool::Entity::find_by_id(carpool_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Carpool not found".to_string()))?;

                if carpool.driver_id == user_id {
                    return Err(AppError::BadRequest(
                        "You cannot book your own carpool".to_string(),
                    ));
                }

                let departure = carpool.departure_time.with_timezone(&Utc);
                if departure <= Utc::now() {
                    return Err(AppError::BadRequest(
                        "Carpool has already departed".to_string(),
                    ));
                }

                let claimed = carpool::Entity::update_many()
                    .col_expr(
                        carpool::Column::AvailableSeats,
                        Expr::col(carpool::Column::AvailableSeats).sub(1),
                    )
                    .filter(carpool::Column::Id.eq(carpool.id))
                    .filter(carpool::Column::AvailableSeats.gt(0))
                    .exec(&txn)
                    .await?;

                if claimed.rows_affected == 0 {
                    tracing::warn!(carpool_id = %carpool.id, user_id = %user_id, "Carpool full");
                    return Err(AppError::Conflict("No seats available".to_string()));
                }

                (
                    None,
                    Some(carpool.id),
                    request.start_date.unwrap_or(departure),
                    None,
                    carpool.price_per_seat,
                )
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Provide either carId or carpoolId".to_string(),
                ));
            }
        };

    let booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        car_id: Set(car_id),
        carpool_id: Set(carpool_id),
        start_date: Set(start_date.into()),
        end_date: Set(end_date.map(Into::into)),
        total_price: Set(total_price),
        status: Set(BookingStatus::Pending),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %user_id,
        car_id = ?booking.car_id,
        carpool_id = ?booking.carpool_id,
        total_price = booking.total_price,
        "Booking created"
    );

    Ok(booking)
}

async fn find_booking<C: ConnectionTrait>(db: &C, booking_id: Uuid) -> AppResult<booking::Model> {
    booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

/// The user who owns the car, or drives the carpool, a booking is for.
async fn resource_owner<C: ConnectionTrait>(db: &C, booking: &booking::Model) -> AppResult<Uuid> {
    if let Some(car_id) = booking.car_id {
        if let Some(car) = car::Entity::find_by_id(car_id).one(db).await? {
            return Ok(car.owner_id);
        }
    }

    if let Some(carpool_id) = booking.carpool_id {
        if let Some(carpool) = carpool::Entity::find_by_id(carpool_id).one(db).await? {
            return Ok(carpool.driver_id);
        }
    }

    Err(AppError::NotFound(
        "The car or carpool for this booking no longer exists".to_string(),
    ))
}

/// Move a booking to `next`, provided nobody changed its status meanwhile.
async fn set_status<C: ConnectionTrait>(
    db: &C,
    booking: &booking::Model,
    next: BookingStatus,
) -> AppResult<booking::Model> {
    let mut active: booking::ActiveModel = booking.clone().into();
    active.status = Set(next);

    booking::Entity::update(active)
        .filter(booking::Column::Status.eq(booking.status))
        .exec(db)
        .await
        .map_err(|e| match e {
            DbErr::RecordNotUpdated => {
                AppError::Conflict("Booking was updated by another request".to_string())
            }
            other => other.into(),
        })
}

/// Pending and confirmed bookings on a car.
pub async fn open_car_bookings<C: ConnectionTrait>(db: &C, car_id: Uuid) -> AppResult<u64> {
    Ok(booking::Entity::find()
        .filter(booking::Column::CarId.eq(car_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .count(db)
        .await?)
}

/// Mark a listed car available again unless a booking still holds it.
/// Cars the owner unlisted stay unavailable.
pub async fn release_car<C: ConnectionTrait>(db: &C, car_id: Uuid) -> AppResult<()> {
    if open_car_bookings(db, car_id).await? == 0 {
        car::Entity::update_many()
            .col_expr(car::Column::Available, Expr::value(true))
            .filter(car::Column::Id.eq(car_id))
            .filter(car::Column::Listed.eq(true))
            .exec(db)
            .await?;
    }

    Ok(())
}

async fn release_seat<C: ConnectionTrait>(db: &C, carpool_id: Uuid) -> AppResult<()> {
    carpool::Entity::update_many()
        .col_expr(
            carpool::Column::AvailableSeats,
            Expr::col(carpool::Column::AvailableSeats).add(1),
        )
        .filter(carpool::Column::Id.eq(carpool_id))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn cancel_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
    actor: &Actor,
    by: CancelledBy,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;
    let booking = find_booking(&txn, booking_id).await?;

    match by {
        CancelledBy::Passenger => {
            authorize(Action::CancelOwnBooking, actor, Some(booking.user_id))?;
        }
        CancelledBy::Owner => {
            let car_id = booking.car_id.ok_or_else(|| {
                AppError::BadRequest(
                    "Only car rental bookings can be cancelled by the owner".to_string(),
                )
            })?;
            let car = car::Entity::find_by_id(car_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;
            authorize(Action::CancelRentalAsOwner, actor, Some(car.owner_id))?;
        }
    }

    if !booking.status.is_active() {
        return Err(AppError::BadRequest(
            "Booking cannot be cancelled in its current status".to_string(),
        ));
    }

    let cancelled = set_status(&txn, &booking, BookingStatus::Cancelled).await?;
    if let Some(carpool_id) = booking.carpool_id {
        release_seat(&txn, carpool_id).await?;
    }
    if let Some(car_id) = booking.car_id {
        release_car(&txn, car_id).await?;
    }

    txn.commit().await?;

    tracing::info!(booking_id = %booking.id, actor = %actor.id, ?by, "Booking cancelled");
    Ok(cancelled)
}

pub async fn confirm_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
    actor: &Actor,
) -> AppResult<booking::Model> {
    let booking = find_booking(db, booking_id).await?;
    let owner = resource_owner(db, &booking).await?;
    authorize(Action::ManageBookingAsOwner, actor, Some(owner))?;

    if booking.status != BookingStatus::Pending {
        return Err(AppError::BadRequest(
            "Only pending bookings can be confirmed".to_string(),
        ));
    }

    let confirmed = set_status(db, &booking, BookingStatus::Confirmed).await?;
    tracing::info!(booking_id = %booking.id, "Booking confirmed");
    Ok(confirmed)
}

/// Finish a booking. Completed car rentals hand the car back; carpool seats
/// stay consumed.
pub async fn complete_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
    actor: &Actor,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;
    let booking = find_booking(&txn, booking_id).await?;
    let owner = resource_owner(&txn, &booking).await?;
    authorize(Action::ManageBookingAsOwner, actor, Some(owner))?;

    if !booking.status.is_active() {
        return Err(AppError::BadRequest(
            "Booking cannot be completed in its current status".to_string(),
        ));
    }

    let completed = set_status(&txn, &booking, BookingStatus::Completed).await?;
    if let Some(car_id) = booking.car_id {
        release_car(&txn, car_id).await?;
    }

    txn.commit().await?;

    tracing::info!(booking_id = %booking.id, "Booking completed");
    Ok(completed)
}

/// Cancel a carpool before departure: every booking on it is cancelled and
/// the carpool removed, all in one transaction. Returns the number of
/// bookings cancelled.
pub async fn cancel_carpool(
    db: &DatabaseConnection,
    carpool_id: Uuid,
    actor: &Actor,
) -> AppResult<u64> {
    let txn = db.begin().await?;

    let carpool = carpool::Entity::find_by_id(carpool_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Carpool not found".to_string()))?;

    authorize(Action::CancelCarpool, actor, Some(carpool.driver_id))?;

    if carpool.departure_time.with_timezone(&Utc) <= Utc::now() {
        return Err(AppError::BadRequest(
            "Cannot cancel a carpool that has already departed".to_string(),
        ));
    }

    let cancelled = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Cancelled))
        .filter(booking::Column::CarpoolId.eq(carpool.id))
        .exec(&txn)
        .await?;

    carpool::Entity::delete_by_id(carpool.id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        carpool_id = %carpool.id,
        bookings_cancelled = cancelled.rows_affected,
        "Carpool cancelled"
    );

    Ok(cancelled.rows_affected)
}

async fn with_details<C: ConnectionTrait>(
    db: &C,
    bookings: Vec<booking::Model>,
) -> AppResult<Vec<BookingDetails>> {
    let car_ids: Vec<Uuid> = bookings.iter().filter_map(|b| b.car_id).collect();
    let carpool_ids: Vec<Uuid> = bookings.iter().filter_map(|b| b.carpool_id).collect();

    let cars = if car_ids.is_empty() {
        Vec::new()
    } else {
        car::Entity::find()
            .filter(car::Column::Id.is_in(car_ids))
            .all(db)
            .await?
    };

    let carpools = if carpool_ids.is_empty() {
        Vec::new()
    } else {
        carpool::Entity::find()
            .filter(carpool::Column::Id.is_in(carpool_ids))
            .all(db)
            .await?
    };

    Ok(bookings
        .into_iter()
        .map(|b| BookingDetails {
            car: b.car_id.and_then(|id| cars.iter().find(|c| c.id == id).cloned()),
            carpool: b
                .carpool_id
                .and_then(|id| carpools.iter().find(|c| c.id == id).cloned()),
            booking: b,
        })
        .collect())
}

pub async fn my_bookings<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> AppResult<Vec<BookingDetails>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?;

    with_details(db, bookings).await
}

/// Bookings made against cars the user owns or carpools they drive.
pub async fn owner_bookings<C: ConnectionTrait>(
    db: &C,
    owner_id: Uuid,
) -> AppResult<Vec<BookingDetails>> {
    let car_ids: Vec<Uuid> = car::Entity::find()
        .filter(car::Column::OwnerId.eq(owner_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let carpool_ids: Vec<Uuid> = carpool::Entity::find()
        .filter(carpool::Column::DriverId.eq(owner_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let mut bookings = Vec::new();
    if !car_ids.is_empty() {
        bookings.extend(
            booking::Entity::find()
                .filter(booking::Column::CarId.is_in(car_ids))
                .all(db)
                .await?,
        );
    }
    if !carpool_ids.is_empty() {
        bookings.extend(
            booking::Entity::find()
                .filter(booking::Column::CarpoolId.is_in(carpool_ids))
                .all(db)
                .await?,
        );
    }
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    with_details(db, bookings).await
}
