use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::carpool;
use crate::error::{AppError, AppResult};
use crate::handlers::{AppJson, AppPath, AppQuery};
use crate::policy::{authorize, Action, Actor};
use crate::services::bookings;
use crate::utils::jwt::Claims;
use crate::AppState;

const MAX_SEATS: i32 = 8;

#[derive(Debug, Deserialize)]
pub struct CarpoolFilter {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarpoolRequest {
    pub from: String,
    pub to: String,
    pub departure_time: DateTime<Utc>,
    pub available_seats: i32,
    pub price_per_seat: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCarpoolResponse {
    pub message: String,
    pub cancelled_bookings: u64,
}

fn validate_carpool(payload: &CreateCarpoolRequest, now: DateTime<Utc>) -> AppResult<()> {
    if payload.from.trim().is_empty() || payload.to.trim().is_empty() {
        return Err(AppError::BadRequest("Origin and destination are required".to_string()));
    }
    if payload.departure_time <= now {
        return Err(AppError::BadRequest("Departure time must be in the future".to_string()));
    }
    if !(1..=MAX_SEATS).contains(&payload.available_seats) {
        return Err(AppError::BadRequest(format!(
            "Seats must be between 1 and {}",
            MAX_SEATS
        )));
    }
    if !payload.price_per_seat.is_finite() || payload.price_per_seat < 0.0 {
        return Err(AppError::BadRequest("Price per seat cannot be negative".to_string()));
    }
    Ok(())
}

/// List upcoming carpools that still have seats
pub async fn list_carpools(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<CarpoolFilter>,
) -> AppResult<Json<Vec<carpool::Model>>> {
    let now = Utc::now();
    let mut query = carpool::Entity::find()
        .filter(carpool::Column::DepartureTime.gt(now))
        .filter(carpool::Column::AvailableSeats.gt(0))
        .order_by_asc(carpool::Column::DepartureTime);

    if let Some(from) = filter.from.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        query = query.filter(carpool::Column::FromLocation.contains(from));
    }
    if let Some(to) = filter.to.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(carpool::Column::ToLocation.contains(to));
    }

    Ok(Json(query.all(&state.db).await?))
}

/// Get carpool details
pub async fn get_carpool(
    State(state): State<AppState>,
    AppPath(carpool_id): AppPath<Uuid>,
) -> AppResult<Json<carpool::Model>> {
    let carpool = carpool::Entity::find_by_id(carpool_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carpool not found".to_string()))?;

    Ok(Json(carpool))
}

/// Offer a carpool (verified drivers)
pub async fn create_carpool(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateCarpoolRequest>,
) -> AppResult<Json<carpool::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    authorize(Action::CreateCarpool, &actor, None)?;

    let now = Utc::now();
    validate_carpool(&payload, now)?;

    let carpool = carpool::ActiveModel {
        id: Set(Uuid::new_v4()),
        from_location: Set(payload.from.trim().to_string()),
        to_location: Set(payload.to.trim().to_string()),
        departure_time: Set(payload.departure_time.into()),
        available_seats: Set(payload.available_seats),
        price_per_seat: Set(payload.price_per_seat),
        description: Set(payload.description.trim().to_string()),
        driver_id: Set(actor.id),
        created_at: Set(now.into()),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(
        carpool_id = %carpool.id,
        driver_id = %actor.id,
        seats = carpool.available_seats,
        "Carpool offered"
    );

    Ok(Json(carpool))
}

/// Cancel a carpool and every booking on it (creating driver)
pub async fn cancel_carpool(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(carpool_id): AppPath<Uuid>,
) -> AppResult<Json<CancelCarpoolResponse>> {
    let actor = Actor::load(&state.db, &claims).await?;
    let cancelled = bookings::cancel_carpool(&state.db, carpool_id, &actor).await?;

    Ok(Json(CancelCarpoolResponse {
        message: "Carpool cancelled".to_string(),
        cancelled_bookings: cancelled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(seats: i32, departs_in: Duration) -> CreateCarpoolRequest {
        CreateCarpoolRequest {
            from: "Bengaluru".to_string(),
            to: "Mysuru".to_string(),
            departure_time: Utc::now() + departs_in,
            available_seats: seats,
            price_per_seat: 350.0,
            description: String::new(),
        }
    }

    #[test]
    fn carpools_must_depart_in_the_future() {
        let now = Utc::now();
        assert!(validate_carpool(&request(3, Duration::hours(2)), now).is_ok());
        assert!(validate_carpool(&request(3, Duration::hours(-2)), now).is_err());
    }

    #[test]
    fn seat_counts_are_bounded() {
        let now = Utc::now();
        assert!(validate_carpool(&request(0, Duration::hours(2)), now).is_err());
        assert!(validate_carpool(&request(MAX_SEATS + 1, Duration::hours(2)), now).is_err());
        assert!(validate_carpool(&request(MAX_SEATS, Duration::hours(2)), now).is_ok());
    }
}
