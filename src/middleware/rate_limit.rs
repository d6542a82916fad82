use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

use crate::error::AppError;

/// Type alias for IP-based governor layers
pub type IpGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

fn ip_governor(per_ms: u64, burst: u32) -> IpGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .finish()
            .expect("rate limit quota must be non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Global limiter applied to every request (per IP address)
/// - 1000 requests per minute (one token every 60ms)
pub fn create_global_governor() -> IpGovernorLayer {
    ip_governor(60, 1000)
}

/// Limiter for unauthenticated routes (per IP address)
/// - 200 requests per minute, bursts of 50
pub fn create_public_governor() -> IpGovernorLayer {
    ip_governor(300, 50)
}

/// Answer rejected requests with the usual JSON error envelope
pub fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    let err = match error {
        GovernorError::TooManyRequests { wait_time, .. } => AppError::TooManyRequests(format!(
            "Too many requests, retry in {} seconds",
            wait_time
        )),
        GovernorError::UnableToExtractKey => {
            AppError::Internal("Unable to identify client for rate limiting".to_string())
        }
        other => AppError::Internal(format!("Rate limiter failure: {}", other)),
    };

    err.into_response()
}

/// Middleware to log rate limiting and request details
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::debug!(
        client_ip = %addr.ip(),
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let response = next.run(request).await;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            "RATE LIMITED - Request rejected due to too many requests"
        );
    } else if status.is_client_error() || status.is_server_error() {
        tracing::warn!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            status = %status,
            "Request failed"
        );
    } else {
        tracing::debug!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            status = %status,
            "Request completed"
        );
    }

    response
}
