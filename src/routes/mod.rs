use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, carpools, cars, geocode, reviews, rides, users, wallet};
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::user_rate_limit::create_user_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes, limited per IP
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/google", post(auth::google_login))
        .route("/cars", get(cars::list_cars))
        .route("/cars/{id}", get(cars::get_car))
        .route("/cars/{id}/reviews", get(cars::car_reviews))
        .route("/carpool", get(carpools::list_carpools))
        .route("/carpool/{id}", get(carpools::get_carpool))
        .route("/geocode", get(geocode::geocode))
        .layer(create_public_governor());

    // Authenticated routes, limited per user. Role, verification and
    // ownership checks happen in the handlers via the policy table.
    let protected_routes = Router::new()
        .route("/auth/verify", get(auth::verify))
        .route("/users/me", put(users::update_me))
        // Cars and carpools
        .route("/cars", post(cars::create_car))
        .route("/cars/{id}", put(cars::update_car).delete(cars::delete_car))
        .route("/carpool", post(carpools::create_carpool))
        .route("/carpool/{id}/cancel", post(carpools::cancel_carpool))
        // Bookings
        .route("/bookings", post(bookings::create_booking).get(bookings::my_bookings))
        .route("/bookings/owner", get(bookings::owner_bookings))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/bookings/{id}/driver-cancel", post(bookings::driver_cancel_booking))
        .route("/bookings/{id}/confirm", post(bookings::confirm_booking))
        .route("/bookings/{id}/complete", post(bookings::complete_booking))
        .route("/reviews", post(reviews::create_review))
        // Instant rides
        .route("/rides", post(rides::create_ride).get(rides::list_rides))
        .route("/rides/{id}", get(rides::get_ride).patch(rides::update_ride))
        .route("/rides/{id}/accept", post(rides::accept_ride))
        .route("/rides/{id}/reject", post(rides::reject_ride))
        .route("/rides/{id}/cancel", post(rides::cancel_ride))
        // Wallet
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/add", post(wallet::add_funds))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .layer(create_user_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/verify", post(admin::verify_user))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = public_routes
        .merge(protected_routes)
        .nest("/admin", admin_routes);

    Router::new().nest("/api", api).with_state(state)
}
