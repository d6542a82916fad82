use axum::{extract::State, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::{AppPath, AppQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub role: Option<String>,
    pub verified: Option<bool>,
}

/// List all users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<UserFilter>,
) -> AppResult<Json<Vec<user::Model>>> {
    let mut query = user::Entity::find().order_by_desc(user::Column::CreatedAt);

    if let Some(raw) = filter.role.as_deref() {
        let role = UserRole::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid role: {}", raw)))?;
        query = query.filter(user::Column::Role.eq(role));
    }
    if let Some(verified) = filter.verified {
        query = query.filter(user::Column::IsVerified.eq(verified));
    }

    Ok(Json(query.all(&state.db).await?))
}

/// Approve a user's verification (admin)
pub async fn verify_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<Uuid>,
) -> AppResult<Json<user::Model>> {
    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_verified {
        return Ok(Json(user));
    }

    let mut active = user.into_active_model();
    active.is_verified = Set(true);
    let user = active.update(&state.db).await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User verified");
    Ok(Json(user))
}
