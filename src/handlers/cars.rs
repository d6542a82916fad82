use axum::{extract::State, Extension, Json};
use chrono::{Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::car;
use crate::error::{AppError, AppResult};
use crate::handlers::{AppJson, AppPath, AppQuery, MessageResponse};
use crate::policy::{authorize, Action, Actor};
use crate::services::bookings;
use crate::services::reviews::{self, CarReviews, ReviewQuery};
use crate::utils::jwt::Claims;
use crate::AppState;

const OLDEST_CAR_YEAR: i32 = 1980;

#[derive(Debug, Deserialize)]
pub struct CarFilter {
    pub available: Option<bool>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub price_per_day: f64,
    pub hourly_rate: Option<f64>,
    pub location: String,
    pub license_plate: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCarRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub price_per_day: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub license_plate: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Lists or unlists the car.
    pub available: Option<bool>,
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn check_year(year: i32) -> AppResult<()> {
    let newest = Utc::now().year() + 1;
    if !(OLDEST_CAR_YEAR..=newest).contains(&year) {
        return Err(AppError::BadRequest(format!(
            "Year must be between {} and {}",
            OLDEST_CAR_YEAR, newest
        )));
    }
    Ok(())
}

fn check_price(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::BadRequest(format!("{} must be a positive number", field)));
    }
    Ok(())
}

/// List cars, optionally only available ones or those near a location
pub async fn list_cars(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<CarFilter>,
) -> AppResult<Json<Vec<car::Model>>> {
    let mut query = car::Entity::find().order_by_desc(car::Column::CreatedAt);

    if let Some(available) = filter.available {
        query = query.filter(car::Column::Available.eq(available));
    }
    if let Some(location) = filter.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        query = query.filter(car::Column::Location.contains(location));
    }

    Ok(Json(query.all(&state.db).await?))
}

/// Get car details
pub async fn get_car(
    State(state): State<AppState>,
    AppPath(car_id): AppPath<Uuid>,
) -> AppResult<Json<car::Model>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    Ok(Json(car))
}

/// Paginated reviews for a car
pub async fn car_reviews(
    State(state): State<AppState>,
    AppPath(car_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<ReviewQuery>,
) -> AppResult<Json<CarReviews>> {
    Ok(Json(reviews::list_car_reviews(&state.db, car_id, query).await?))
}

/// List a car for rent (verified drivers)
pub async fn create_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateCarRequest>,
) -> AppResult<Json<car::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    authorize(Action::CreateCar, &actor, None)?;

    check_year(payload.year)?;
    check_price("Price per day", payload.price_per_day)?;
    if let Some(rate) = payload.hourly_rate {
        check_price("Hourly rate", rate)?;
    }

    let car = car::ActiveModel {
        id: Set(Uuid::new_v4()),
        make: Set(required("Make", &payload.make)?),
        model_name: Set(required("Model", &payload.model)?),
        year: Set(payload.year),
        color: Set(required("Color", &payload.color)?),
        price_per_day: Set(payload.price_per_day),
        hourly_rate: Set(payload.hourly_rate),
        location: Set(required("Location", &payload.location)?),
        license_plate: Set(payload
            .license_plate
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty())),
        description: Set(payload.description.trim().to_string()),
        image_url: Set(payload.image_url.trim().to_string()),
        available: Set(true),
        listed: Set(true),
        owner_id: Set(actor.id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(car_id = %car.id, owner_id = %actor.id, "Car listed");
    Ok(Json(car))
}

async fn owned_car(state: &AppState, claims: &Claims, car_id: Uuid) -> AppResult<car::Model> {
    let actor = Actor::load(&state.db, claims).await?;
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    authorize(Action::ManageCar, &actor, Some(car.owner_id))?;
    Ok(car)
}

/// Update a car (owner)
pub async fn update_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(car_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCarRequest>,
) -> AppResult<Json<car::Model>> {
    let car = owned_car(&state, &claims, car_id).await?;
    let mut active = car.into_active_model();

    if let Some(make) = payload.make {
        active.make = Set(required("Make", &make)?);
    }
    if let Some(model) = payload.model {
        active.model_name = Set(required("Model", &model)?);
    }
    if let Some(year) = payload.year {
        check_year(year)?;
        active.year = Set(year);
    }
    if let Some(color) = payload.color {
        active.color = Set(required("Color", &color)?);
    }
    if let Some(price) = payload.price_per_day {
        check_price("Price per day", price)?;
        active.price_per_day = Set(price);
    }
    if let Some(rate) = payload.hourly_rate {
        // Zero switches the car back to daily billing.
        if rate == 0.0 {
            active.hourly_rate = Set(None);
        } else {
            check_price("Hourly rate", rate)?;
            active.hourly_rate = Set(Some(rate));
        }
    }
    if let Some(location) = payload.location {
        active.location = Set(required("Location", &location)?);
    }
    if let Some(plate) = payload.license_plate {
        let plate = plate.trim().to_uppercase();
        active.license_plate = Set((!plate.is_empty()).then_some(plate));
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(image_url.trim().to_string());
    }
    if let Some(listed) = payload.available {
        active.listed = Set(listed);
        if !listed {
            active.available = Set(false);
        }
    }

    let txn = state.db.begin().await?;
    // Row update first: it holds the car's lock while open bookings are counted.
    let mut car = active.update(&txn).await?;
    if payload.available == Some(true) && !car.available {
        bookings::release_car(&txn, car.id).await?;
        car = car::Entity::find_by_id(car.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;
    }
    txn.commit().await?;

    tracing::info!(car_id = %car.id, listed = car.listed, available = car.available, "Car updated");
    Ok(Json(car))
}

/// Delete a car (owner). Cars with open bookings cannot be removed.
pub async fn delete_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(car_id): AppPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let car = owned_car(&state, &claims, car_id).await?;

    if bookings::open_car_bookings(&state.db, car.id).await? > 0 {
        return Err(AppError::Conflict(
            "Car has pending or confirmed bookings".to_string(),
        ));
    }

    car::Entity::delete_by_id(car.id).exec(&state.db).await?;
    tracing::info!(car_id = %car.id, "Car deleted");

    Ok(Json(MessageResponse {
        message: "Car deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::entities::user::{self, UserRole};
    use crate::services::bookings::{CancelledBy, NewBooking};
    use crate::test_support::{self, actor};

    fn rental(car_id: Uuid) -> NewBooking {
        let start = Utc::now() + Duration::days(1);
        NewBooking {
            car_id: Some(car_id),
            start_date: Some(start),
            end_date: Some(start + Duration::days(2)),
            ..Default::default()
        }
    }

    async fn set_listed(state: &AppState, owner: &user::Model, car_id: Uuid, listed: bool) -> car::Model {
        let Json(car) = update_car(
            State(state.clone()),
            Extension(test_support::claims(owner)),
            AppPath(car_id),
            AppJson(UpdateCarRequest {
                available: Some(listed),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        car
    }

    #[tokio::test]
    async fn relisting_a_booked_car_keeps_it_held() {
        let db = test_support::setup_db().await;
        let owner = test_support::create_user(&db, UserRole::Driver, true).await;
        let first = test_support::create_user(&db, UserRole::Passenger, true).await;
        let second = test_support::create_user(&db, UserRole::Passenger, true).await;
        let car = test_support::create_car(&db, owner.id, 1000.0, None).await;
        let state = test_support::app_state(db.clone());

        bookings::create_booking(&db, first.id, rental(car.id)).await.unwrap();

        let car = set_listed(&state, &owner, car.id, true).await;
        assert!(car.listed);
        assert!(!car.available);

        let err = bookings::create_booking(&db, second.id, rental(car.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(bookings::open_car_bookings(&db, car.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unlisted_cars_stay_unavailable_after_the_rental_ends() {
        let db = test_support::setup_db().await;
        let owner = test_support::create_user(&db, UserRole::Driver, true).await;
        let renter = test_support::create_user(&db, UserRole::Passenger, true).await;
        let car = test_support::create_car(&db, owner.id, 1000.0, None).await;
        let state = test_support::app_state(db.clone());

        let booking = bookings::create_booking(&db, renter.id, rental(car.id)).await.unwrap();
        set_listed(&state, &owner, car.id, false).await;
        bookings::cancel_booking(&db, booking.id, &actor(&renter), CancelledBy::Passenger)
            .await
            .unwrap();

        let held = car::Entity::find_by_id(car.id).one(&db).await.unwrap().unwrap();
        assert!(!held.listed);
        assert!(!held.available);

        let relisted = set_listed(&state, &owner, car.id, true).await;
        assert!(relisted.available);
    }

    #[test]
    fn years_outside_the_supported_range_are_rejected() {
        assert!(check_year(2020).is_ok());
        assert!(check_year(1950).is_err());
        assert!(check_year(Utc::now().year() + 5).is_err());
    }

    #[test]
    fn prices_must_be_positive_and_finite() {
        assert!(check_price("Price per day", 1500.0).is_ok());
        assert!(check_price("Price per day", 0.0).is_err());
        assert!(check_price("Price per day", f64::NAN).is_err());
    }

    #[test]
    fn required_fields_are_trimmed() {
        assert_eq!(required("Make", "  Tata ").unwrap(), "Tata");
        assert!(matches!(required("Make", "   "), Err(AppError::BadRequest(msg)) if msg == "Make is required"));
    }
}
