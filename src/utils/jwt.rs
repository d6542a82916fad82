use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user id
    pub email: String,
    pub role: UserRole,
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

pub fn create_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Resolve an `Authorization` header value to its claims.
///
/// Returns `None` for a missing or malformed header, a bad signature or an
/// expired token.
pub fn resolve_bearer(header: Option<&str>, secret: &str) -> Option<Claims> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }

    match verify_token(token, secret) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_roundtrip_keeps_identity() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "rider@example.com", UserRole::Driver, SECRET, 1).unwrap();

        let claims = resolve_bearer(Some(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Driver);
    }

    #[test]
    fn test_malformed_headers_are_rejected() {
        let token = create_token(Uuid::new_v4(), "a@b.c", UserRole::Passenger, SECRET, 1).unwrap();

        assert!(resolve_bearer(None, SECRET).is_none());
        assert!(resolve_bearer(Some(&token), SECRET).is_none());
        assert!(resolve_bearer(Some("Bearer "), SECRET).is_none());
        assert!(resolve_bearer(Some("Basic abc"), SECRET).is_none());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token(Uuid::new_v4(), "a@b.c", UserRole::Passenger, SECRET, 1).unwrap();
        assert!(resolve_bearer(Some(&format!("Bearer {}", token)), "other").is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Default validation allows 60s of leeway.
        let token = create_token(Uuid::new_v4(), "a@b.c", UserRole::Passenger, SECRET, -2).unwrap();
        assert!(resolve_bearer(Some(&format!("Bearer {}", token)), SECRET).is_none());
    }
}
