pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::geocode::Geocoder;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    /// Outbound client for Google token checks.
    pub http: reqwest::Client,
    pub geocoder: Geocoder,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> AppResult<Self> {
        let geocoder = Geocoder::new(&config.geocoder_url, &config.geocoder_user_agent)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            db,
            config,
            http,
            geocoder,
        })
    }
}
