use axum::{extract::State, Extension, Json};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use serde::Deserialize;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::AppJson;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
}

/// Edit the caller's own profile. Blank strings clear optional fields.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<user::Model>> {
    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    let role = user.role;
    let mut active = user.into_active_model();

    if let Some(name) = payload.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
        active.name = Set(name.to_string());
    }

    if let Some(phone) = payload.phone {
        let phone = phone.trim();
        active.phone = Set((!phone.is_empty()).then(|| phone.to_string()));
    }

    if let Some(license) = payload.license_number {
        let license = license.trim();
        if license.is_empty() && role == UserRole::Driver {
            return Err(AppError::BadRequest(
                "License number is required for drivers".to_string(),
            ));
        }
        active.license_number = Set((!license.is_empty()).then(|| license.to_string()));
    }

    let user = active.update(&state.db).await?;
    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(user))
}
