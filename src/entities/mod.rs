pub mod booking;
pub mod car;
pub mod carpool;
pub mod review;
pub mod ride;
pub mod transaction;
pub mod user;
pub mod wallet;
