use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, AppResult};
use crate::policy::{authorize, Action, Actor};
use crate::utils::jwt::{resolve_bearer, Claims};
use crate::AppState;

/// Extract and validate JWT token from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = resolve_bearer(header, &state.config.jwt_secret)
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid token".to_string()))?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Require admin role. Checked against the stored account, not the token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    let actor = Actor::load(&state.db, claims).await?;
    authorize(Action::ManageUsers, &actor, None)?;

    Ok(next.run(request).await)
}
