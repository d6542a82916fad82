use axum::{extract::State, Extension, Json};
use uuid::Uuid;

use crate::entities::booking;
use crate::error::AppResult;
use crate::handlers::{AppJson, AppPath};
use crate::policy::Actor;
use crate::services::bookings::{self, BookingDetails, CancelledBy, NewBooking};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Book a car rental or a carpool seat
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewBooking>,
) -> AppResult<Json<booking::Model>> {
    Ok(Json(bookings::create_booking(&state.db, claims.sub, payload).await?))
}

/// Get my bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingDetails>>> {
    Ok(Json(bookings::my_bookings(&state.db, claims.sub).await?))
}

/// Bookings on my cars and carpools
pub async fn owner_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingDetails>>> {
    Ok(Json(bookings::owner_bookings(&state.db, claims.sub).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    let booking =
        bookings::cancel_booking(&state.db, booking_id, &actor, CancelledBy::Passenger).await?;
    Ok(Json(booking))
}

/// Cancel a rental of one of my cars
pub async fn driver_cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    let booking =
        bookings::cancel_booking(&state.db, booking_id, &actor, CancelledBy::Owner).await?;
    Ok(Json(booking))
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(bookings::confirm_booking(&state.db, booking_id, &actor).await?))
}

pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(bookings::complete_booking(&state.db, booking_id, &actor).await?))
}
