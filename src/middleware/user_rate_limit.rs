use axum::http::Request;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorError, GovernorLayer,
};
use uuid::Uuid;

use crate::middleware::rate_limit::rate_limit_error_handler;
use crate::utils::jwt::Claims;

/// Keys requests by the JWT subject placed in extensions by `auth_middleware`
#[derive(Debug, Clone, Copy)]
pub struct UserIdExtractor;

impl KeyExtractor for UserIdExtractor {
    type Key = Uuid;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let claims = req
            .extensions()
            .get::<Claims>()
            .ok_or(GovernorError::UnableToExtractKey)?;

        Ok(claims.sub)
    }
}

pub type UserGovernorLayer = GovernorLayer<
    UserIdExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Per-user limiter for authenticated routes
/// - 300 requests per minute, bursts of 100
///
/// Must sit inside the auth layer so the claims are present.
pub fn create_user_governor() -> UserGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(200)
            .burst_size(100)
            .key_extractor(UserIdExtractor)
            .finish()
            .expect("rate limit quota must be non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    #[test]
    fn requests_are_keyed_by_token_subject() {
        let user_id = Uuid::new_v4();
        let mut request = Request::new(());
        request.extensions_mut().insert(Claims {
            sub: user_id,
            email: "rider@example.com".to_string(),
            role: UserRole::Passenger,
            exp: 0,
            iat: 0,
        });

        assert_eq!(UserIdExtractor.extract(&request).unwrap(), user_id);
    }

    #[test]
    fn unauthenticated_requests_have_no_key() {
        let request = Request::new(());
        assert!(UserIdExtractor.extract(&request).is_err());
    }
}
