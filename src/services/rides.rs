use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::ride::{self, PaymentMethod, RideStatus};
use crate::error::{AppError, AppResult};
use crate::policy::{authorize, Action, Actor};
use crate::services::fare;
use crate::services::ride_lifecycle::{plan, CancelRoute, Command, Relation};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub pickup_location: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub dropoff_location: String,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Tier picked in the client. Billing always uses the default formula.
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideListKind {
    Available,
    DriverRides,
    MyRides,
}

impl RideListKind {
    pub fn parse(value: Option<&str>) -> AppResult<Self> {
        match value.map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("myrides") => Ok(Self::MyRides),
            Some("available") => Ok(Self::Available),
            Some("driverrides") => Ok(Self::DriverRides),
            Some(other) => Err(AppError::BadRequest(format!("Invalid ride type: {}", other))),
        }
    }
}

pub async fn create_ride<C: ConnectionTrait>(
    db: &C,
    passenger_id: Uuid,
    request: NewRide,
) -> AppResult<ride::Model> {
    if request.pickup_location.trim().is_empty() || request.dropoff_location.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Pickup and dropoff locations are required".to_string(),
        ));
    }

    let quote = fare::quote(
        (request.pickup_lat, request.pickup_lng),
        (request.dropoff_lat, request.dropoff_lng),
    );

    if let Some(tier) = request.vehicle_type.as_deref() {
        tracing::debug!(vehicle_type = tier, "Vehicle tier is informational, billing default fare");
    }

    let ride = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        passenger_id: Set(passenger_id),
        driver_id: Set(None),
        pickup_location: Set(request.pickup_location),
        pickup_lat: Set(request.pickup_lat),
        pickup_lng: Set(request.pickup_lng),
        dropoff_location: Set(request.dropoff_location),
        dropoff_lat: Set(request.dropoff_lat),
        dropoff_lng: Set(request.dropoff_lng),
        fare: Set(quote.fare),
        distance: Set(quote.distance),
        estimated_time: Set(quote.estimated_time),
        payment_method: Set(request.payment_method),
        status: Set(RideStatus::Searching),
        accepted_at: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(
        ride_id = %ride.id,
        passenger_id = %passenger_id,
        distance_km = ride.distance,
        fare = ride.fare,
        "Ride requested"
    );

    Ok(ride)
}

pub async fn list_rides<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    kind: RideListKind,
) -> AppResult<Vec<ride::Model>> {
    let query = match kind {
        RideListKind::Available => {
            authorize(Action::ListAvailableRides, actor, None)?;
            ride::Entity::find()
                .filter(ride::Column::Status.eq(RideStatus::Searching))
                .filter(ride::Column::PassengerId.ne(actor.id))
        }
        RideListKind::DriverRides => {
            ride::Entity::find().filter(ride::Column::DriverId.eq(actor.id))
        }
        RideListKind::MyRides => {
            ride::Entity::find().filter(ride::Column::PassengerId.eq(actor.id))
        }
    };

    Ok(query
        .order_by_desc(ride::Column::CreatedAt)
        .all(db)
        .await?)
}

async fn find_ride<C: ConnectionTrait>(db: &C, ride_id: Uuid) -> AppResult<ride::Model> {
    ride::Entity::find_by_id(ride_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

/// Participants see their rides; drivers also see open requests.
pub async fn get_ride<C: ConnectionTrait>(
    db: &C,
    ride_id: Uuid,
    actor: &Actor,
) -> AppResult<ride::Model> {
    let ride = find_ride(db, ride_id).await?;

    let visible = match Relation::of(&ride, actor.id, actor.role) {
        Relation::Passenger | Relation::AssignedDriver => true,
        Relation::OtherDriver => ride.status == RideStatus::Searching,
        Relation::Outsider => false,
    };

    if !visible {
        return Err(AppError::Forbidden(
            "You do not have access to this ride".to_string(),
        ));
    }

    Ok(ride)
}

/// Run a lifecycle command against a stored ride.
///
/// The write is conditional on the status the command was validated
/// against; a concurrent transition makes it fail with 409 instead of
/// silently overwriting.
pub async fn transition<C: ConnectionTrait>(
    db: &C,
    ride_id: Uuid,
    command: Command,
    actor: &Actor,
) -> AppResult<ride::Model> {
    let ride = find_ride(db, ride_id).await?;
    let relation = Relation::of(&ride, actor.id, actor.role);

    let transition = match plan(ride.status, command, relation) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(
                ride_id = %ride.id,
                actor = %actor.id,
                status = ?ride.status,
                ?command,
                error = %e,
                "Ride transition refused"
            );
            return Err(e);
        }
    };

    let Some(next) = transition.to else {
        tracing::info!(ride_id = %ride.id, driver_id = %actor.id, "Ride request rejected by driver");
        return Ok(ride);
    };

    let now = Utc::now();
    let mut active: ride::ActiveModel = ride.clone().into();
    active.status = Set(next);
    match command {
        Command::Accept => {
            active.driver_id = Set(Some(actor.id));
            active.accepted_at = Set(Some(now.into()));
        }
        Command::Start => active.started_at = Set(Some(now.into())),
        Command::Complete => active.completed_at = Set(Some(now.into())),
        _ => {}
    }

    let mut update = ride::Entity::update(active).filter(ride::Column::Status.eq(transition.from));
    if command == Command::Accept {
        update = update.filter(ride::Column::DriverId.is_null());
    }

    let updated = update.exec(db).await.map_err(|e| match e {
        DbErr::RecordNotUpdated => {
            AppError::Conflict("Ride was updated by another request".to_string())
        }
        other => other.into(),
    })?;

    tracing::info!(
        ride_id = %updated.id,
        actor = %actor.id,
        from = ?transition.from,
        to = ?next,
        "Ride status changed"
    );

    Ok(updated)
}

/// Cancel through the participant's own route: passengers get the
/// passenger rules, everyone else is held to the driver rules.
pub async fn cancel_ride<C: ConnectionTrait>(
    db: &C,
    ride_id: Uuid,
    actor: &Actor,
) -> AppResult<ride::Model> {
    let ride = find_ride(db, ride_id).await?;
    let route = if ride.passenger_id == actor.id {
        CancelRoute::Passenger
    } else {
        CancelRoute::Driver
    };

    transition(db, ride.id, Command::Cancel(route), actor).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::test_support::{self, actor};

    fn bangalore_ride() -> NewRide {
        NewRide {
            pickup_location: "MG Road".to_string(),
            pickup_lat: 12.9716,
            pickup_lng: 77.5946,
            dropoff_location: "Koramangala".to_string(),
            dropoff_lat: 12.9352,
            dropoff_lng: 77.6146,
            payment_method: PaymentMethod::Cash,
            vehicle_type: Some("SUV".to_string()),
        }
    }

    #[tokio::test]
    async fn new_rides_are_quoted_with_the_default_formula() {
        let db = test_support::setup_db().await;
        let passenger = test_support::create_user(&db, UserRole::Passenger, true).await;

        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();
        assert_eq!(ride.status, RideStatus::Searching);
        assert_eq!(ride.distance, 4.6);
        assert_eq!(ride.fare, 119.0);
        assert_eq!(ride.estimated_time, 10);
        assert!(ride.driver_id.is_none());
    }

    #[tokio::test]
    async fn full_lifecycle_stamps_timestamps() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let driver = actor(&test_support::create_user(&db, UserRole::Driver, true).await);

        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();

        let ride = transition(&db, ride.id, Command::Accept, &driver).await.unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id, Some(driver.id));
        assert!(ride.accepted_at.is_some());

        let ride = transition(&db, ride.id, Command::Arrive, &driver).await.unwrap();
        assert_eq!(ride.status, RideStatus::Arrived);

        let ride = transition(&db, ride.id, Command::Start, &driver).await.unwrap();
        assert_eq!(ride.status, RideStatus::InProgress);
        assert!(ride.started_at.is_some());

        let ride = transition(&db, ride.id, Command::Complete, &driver).await.unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert!(ride.completed_at.is_some());

        let err = transition(&db, ride.id, Command::Cancel(CancelRoute::Any), &passenger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn refused_transitions_leave_the_ride_untouched() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let driver = actor(&test_support::create_user(&db, UserRole::Driver, true).await);
        let stranger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);

        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();

        // Not accepted yet.
        assert!(matches!(
            transition(&db, ride.id, Command::Start, &driver).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            transition(&db, ride.id, Command::Accept, &stranger).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            transition(&db, ride.id, Command::Cancel(CancelRoute::Driver), &driver).await,
            Err(AppError::Forbidden(_))
        ));

        let stored = find_ride(&db, ride.id).await.unwrap();
        assert_eq!(stored.status, RideStatus::Searching);
        assert!(stored.driver_id.is_none());
    }

    #[tokio::test]
    async fn reject_keeps_the_ride_open_for_other_drivers() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let first = actor(&test_support::create_user(&db, UserRole::Driver, true).await);
        let second = actor(&test_support::create_user(&db, UserRole::Driver, true).await);

        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();

        let rejected = transition(&db, ride.id, Command::Reject, &first).await.unwrap();
        assert_eq!(rejected.status, RideStatus::Searching);

        let available = list_rides(&db, &second, RideListKind::Available).await.unwrap();
        assert_eq!(available.len(), 1);

        transition(&db, ride.id, Command::Accept, &second).await.unwrap();
        let err = transition(&db, ride.id, Command::Accept, &first).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert!(list_rides(&db, &first, RideListKind::Available).await.unwrap().is_empty());
        assert_eq!(list_rides(&db, &second, RideListKind::DriverRides).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn passengers_cannot_list_open_requests() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);

        let err = list_rides(&db, &passenger, RideListKind::Available).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(list_rides(&db, &passenger, RideListKind::MyRides).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outsiders_cannot_read_a_ride() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let stranger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let driver = actor(&test_support::create_user(&db, UserRole::Driver, true).await);

        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();

        assert!(get_ride(&db, ride.id, &passenger).await.is_ok());
        assert!(get_ride(&db, ride.id, &driver).await.is_ok());
        assert!(matches!(
            get_ride(&db, ride.id, &stranger).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn cancel_follows_the_callers_route() {
        let db = test_support::setup_db().await;
        let passenger = actor(&test_support::create_user(&db, UserRole::Passenger, true).await);
        let driver = actor(&test_support::create_user(&db, UserRole::Driver, true).await);

        // Drivers may only cancel once they hold the ride.
        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();
        assert!(matches!(
            cancel_ride(&db, ride.id, &driver).await,
            Err(AppError::Forbidden(_))
        ));

        transition(&db, ride.id, Command::Accept, &driver).await.unwrap();
        let cancelled = cancel_ride(&db, ride.id, &driver).await.unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);

        // Passengers lose the option once the driver has arrived.
        let ride = create_ride(&db, passenger.id, bangalore_ride()).await.unwrap();
        transition(&db, ride.id, Command::Accept, &driver).await.unwrap();
        transition(&db, ride.id, Command::Arrive, &driver).await.unwrap();
        assert!(matches!(
            cancel_ride(&db, ride.id, &passenger).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn list_kind_parsing() {
        assert_eq!(RideListKind::parse(None).unwrap(), RideListKind::MyRides);
        assert_eq!(RideListKind::parse(Some("available")).unwrap(), RideListKind::Available);
        assert_eq!(RideListKind::parse(Some("driverrides")).unwrap(), RideListKind::DriverRides);
        assert!(RideListKind::parse(Some("everything")).is_err());
    }
}
