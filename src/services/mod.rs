pub mod bookings;
pub mod fare;
pub mod geocode;
pub mod reviews;
pub mod ride_lifecycle;
pub mod rides;
pub mod wallet;
