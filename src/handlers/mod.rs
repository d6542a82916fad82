pub mod admin;
pub mod auth;
pub mod bookings;
pub mod carpools;
pub mod cars;
mod extract;
pub mod geocode;
pub mod reviews;
pub mod rides;
pub mod users;
pub mod wallet;

use serde::Serialize;

pub use extract::{AppJson, AppPath, AppQuery};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
