use axum::{extract::State, Extension, Json};

use crate::entities::review;
use crate::error::AppResult;
use crate::handlers::AppJson;
use crate::policy::Actor;
use crate::services::reviews::{self, NewReview};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Review a completed car rental
pub async fn create_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewReview>,
) -> AppResult<Json<review::Model>> {
    let actor = Actor::load(&state.db, &claims).await?;
    Ok(Json(reviews::create_review(&state.db, &actor, payload).await?))
}
