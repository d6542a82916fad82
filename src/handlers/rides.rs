use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::ride;
use crate::error::AppResult;
use crate::handlers::{AppJson, AppPath, AppQuery};
use crate::policy::Actor;
use crate::services::ride_lifecycle::{Command, PatchAction};
use crate::services::rides::{self, NewRide, RideListKind};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RideListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RideActionRequest {
    pub action: PatchAction,
}

/// Request a ride; fare, distance and ETA are computed server-side
pub async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewRide>,
) -> AppResult<Json<ride::Model>> {
    Ok(Json(rides::create_ride(&state.db, claims.sub, payload).await?))
}

pub async fn list_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<RideListQuery>,
) -> AppResult<Json<Vec<ride::Model>>> {
    let kind = RideListKind::parse(query.kind.as_deref())?;
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(rides::list_rides(&state.db, &actor, kind).await?))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(ride_id): AppPath<Uuid>,
) -> AppResult<Json<ride::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(rides::get_ride(&state.db, ride_id, &actor).await?))
}

async fn run(state: &AppState, claims: &Claims, ride_id: Uuid, command: Command) -> AppResult<Json<ride::Model>> {
    let actor = Actor::load(&state.db, claims).await?;
    Ok(Json(rides::transition(&state.db, ride_id, command, &actor).await?))
}

pub async fn accept_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(ride_id): AppPath<Uuid>,
) -> AppResult<Json<ride::Model>> {
    run(&state, &claims, ride_id, Command::Accept).await
}

pub async fn reject_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(ride_id): AppPath<Uuid>,
) -> AppResult<Json<ride::Model>> {
    run(&state, &claims, ride_id, Command::Reject).await
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(ride_id): AppPath<Uuid>,
) -> AppResult<Json<ride::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(rides::cancel_ride(&state.db, ride_id, &actor).await?))
}

/// `{"action": "arrive" | "start" | "complete" | "cancel"}`
pub async fn update_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(ride_id): AppPath<Uuid>,
    AppJson(payload): AppJson<RideActionRequest>,
) -> AppResult<Json<ride::Model>> {
    run(&state, &claims, ride_id, payload.action.into()).await
}
