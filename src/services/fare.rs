//! Ride fares and rental prices.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::utils::geo::{haversine_distance, round_to};

pub const BASE_FARE: f64 = 50.0;
pub const PER_KM_RATE: f64 = 15.0;
/// 30 km/h.
pub const AVERAGE_SPEED_KM_PER_MIN: f64 = 0.5;

/// Great-circle distance rounded to one decimal place.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    round_to(haversine_distance(lat1, lng1, lat2, lng2), 1)
}

pub fn ride_fare(distance_km: f64) -> f64 {
    round_to(BASE_FARE + distance_km * PER_KM_RATE, 2)
}

pub fn estimated_minutes(distance_km: f64) -> i32 {
    (distance_km / AVERAGE_SPEED_KM_PER_MIN).ceil() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideQuote {
    pub distance: f64,
    pub fare: f64,
    pub estimated_time: i32,
}

pub fn quote(pickup: (f64, f64), dropoff: (f64, f64)) -> RideQuote {
    let distance = distance_km(pickup.0, pickup.1, dropoff.0, dropoff.1);
    RideQuote {
        distance,
        fare: ride_fare(distance),
        estimated_time: estimated_minutes(distance),
    }
}

/// Price of renting a car between `start` and `end`.
///
/// Cars with an hourly rate are billed per started hour, everything else per
/// started day; either way at least one unit is charged.
pub fn rental_price(
    price_per_day: f64,
    hourly_rate: Option<f64>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<f64> {
    if end <= start {
        return Err(AppError::BadRequest(
            "End date must be after start date".to_string(),
        ));
    }

    let hours = (end - start).num_seconds() as f64 / 3600.0;

    let price = match hourly_rate.filter(|rate| *rate > 0.0) {
        Some(rate) => hours.ceil().max(1.0) * rate,
        None => (hours / 24.0).ceil().max(1.0) * price_per_day,
    };

    Ok(round_to(price, 2))
}
