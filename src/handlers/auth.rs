use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::AppJson;
use crate::utils::jwt::{create_token, Claims};
use crate::AppState;

const MIN_PASSWORD_LENGTH: usize = 6;
const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: user::Model,
}

/// Subset of Google's tokeninfo response.
#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn issue_token(config: &Config, user: &user::Model) -> AppResult<String> {
    create_token(
        user.id,
        &user.email,
        user.role,
        &config.jwt_secret,
        config.jwt_expiration_hours,
    )
}

/// Validate a registration and return the role it asks for.
fn validate_registration(payload: &RegisterRequest) -> AppResult<UserRole> {
    if payload.email.trim().is_empty() || payload.password.is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Email, password and name are required".to_string(),
        ));
    }

    if !payload.email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let role = match payload.role.as_deref() {
        None => UserRole::Passenger,
        Some(raw) => match UserRole::parse(raw) {
            Some(role @ (UserRole::Passenger | UserRole::Driver)) => role,
            _ => return Err(AppError::BadRequest("Invalid role".to_string())),
        },
    };

    let has_license = payload
        .license_number
        .as_deref()
        .is_some_and(|l| !l.trim().is_empty());
    if role == UserRole::Driver && !has_license {
        return Err(AppError::BadRequest(
            "License number is required for drivers".to_string(),
        ));
    }

    Ok(role)
}

pub async fn register_user<C: ConnectionTrait>(db: &C, payload: RegisterRequest) -> AppResult<user::Model> {
    let role = validate_registration(&payload)?;
    let email = normalize_email(&payload.email);

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;

    if existing.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(Some(hash_password(&payload.password)?)),
        google_id: Set(None),
        name: Set(payload.name.trim().to_string()),
        phone: Set(non_empty(payload.phone)),
        role: Set(role),
        is_verified: Set(false),
        license_number: Set(non_empty(payload.license_number)),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User registered");
    Ok(user)
}

/// Register a new passenger or driver account
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = register_user(&state.db, payload).await?;
    let token = issue_token(&state.config, &user)?;

    Ok(Json(AuthResponse { token, user }))
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(&payload.email)))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let stored = user.password_hash.as_deref().ok_or_else(|| {
        AppError::Unauthorized("This account uses Google sign-in".to_string())
    })?;

    let parsed_hash = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            AppError::Unauthorized("Invalid email or password".to_string())
        })?;

    let token = issue_token(&state.config, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

fn check_token_info(info: &GoogleTokenInfo, client_id: &str) -> AppResult<()> {
    if info.aud != client_id {
        return Err(AppError::Unauthorized(
            "Google token was issued for another application".to_string(),
        ));
    }

    let verified = match &info.email_verified {
        Some(serde_json::Value::Bool(v)) => *v,
        Some(serde_json::Value::String(v)) => v == "true",
        _ => false,
    };
    if !verified {
        return Err(AppError::Unauthorized("Google email is not verified".to_string()));
    }

    Ok(())
}

/// Find the account for a verified Google identity, linking or creating it
/// as needed.
async fn upsert_google_user<C: ConnectionTrait>(db: &C, info: GoogleTokenInfo) -> AppResult<user::Model> {
    if let Some(user) = user::Entity::find()
        .filter(user::Column::GoogleId.eq(&info.sub))
        .one(db)
        .await?
    {
        return Ok(user);
    }

    let email = normalize_email(&info.email);
    if let Some(user) = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
    {
        let mut active = user.into_active_model();
        active.google_id = Set(Some(info.sub));
        let user = active.update(db).await?;
        tracing::info!(user_id = %user.id, "Linked Google account");
        return Ok(user);
    }

    let name = non_empty(info.name).unwrap_or_else(|| email.clone());
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(None),
        google_id: Set(Some(info.sub)),
        name: Set(name),
        phone: Set(None),
        role: Set(UserRole::Passenger),
        is_verified: Set(false),
        license_number: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %user.id, "User registered with Google");
    Ok(user)
}

/// Sign in with a Google ID token
pub async fn google_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<GoogleLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let client_id = state
        .config
        .google_client_id
        .as_deref()
        .ok_or_else(|| AppError::Internal("Google sign-in is not configured".to_string()))?;

    let response = state
        .http
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", payload.id_token.as_str())])
        .send()
        .await?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "Google rejected ID token");
        return Err(AppError::Unauthorized("Invalid Google token".to_string()));
    }

    let info: GoogleTokenInfo = response.json().await?;
    check_token_info(&info, client_id)?;

    let user = upsert_google_user(&state.db, info).await?;
    let token = issue_token(&state.config, &user)?;

    Ok(Json(AuthResponse { token, user }))
}

/// Current user profile
pub async fn verify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<user::Model>> {
    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(user))
}

/// Seed the admin account if it doesn't exist
pub async fn seed_admin<C: ConnectionTrait>(db: &C, config: &Config) -> AppResult<()> {
    let email = normalize_email(&config.admin_email);
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let (password, generated) = match &config.admin_password {
        Some(password) => (password.clone(), false),
        None => {
            let password: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(20)
                .map(char::from)
                .collect();
            (password, true)
        }
    };

    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        password_hash: Set(Some(hash_password(&password)?)),
        google_id: Set(None),
        name: Set("Admin".to_string()),
        phone: Set(None),
        role: Set(UserRole::Admin),
        is_verified: Set(true),
        license_number: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    if generated {
        tracing::warn!(
            email = %email,
            password = %password,
            "Admin account created with a generated password; set ADMIN_PASSWORD to choose one"
        );
    } else {
        tracing::info!(email = %email, "Admin account created");
    }

    Ok(())
}
