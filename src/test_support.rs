//! Fixtures for service tests: a migrated in-memory SQLite database and
//! helpers to seed rows.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::config::Config;
use crate::entities::user::{self, UserRole};
use crate::entities::{car, carpool};
use crate::policy::Actor;
use crate::utils::jwt::{create_token, Claims};
use crate::AppState;

pub const JWT_SECRET: &str = "test-secret";

pub async fn setup_db() -> DatabaseConnection {
    // One connection, or every checkout would see a fresh empty database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn create_user(db: &DatabaseConnection, role: UserRole, is_verified: bool) -> user::Model {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(format!("{}@example.com", id)),
        password_hash: Set(None),
        google_id: Set(None),
        name: Set("Test User".to_string()),
        phone: Set(None),
        role: Set(role),
        is_verified: Set(is_verified),
        license_number: Set((role == UserRole::Driver).then(|| "DL-0420110012345".to_string())),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

pub async fn create_car(
    db: &DatabaseConnection,
    owner_id: Uuid,
    price_per_day: f64,
    hourly_rate: Option<f64>,
) -> car::Model {
    car::ActiveModel {
        id: Set(Uuid::new_v4()),
        make: Set("Maruti".to_string()),
        model_name: Set("Swift".to_string()),
        year: Set(2022),
        color: Set("White".to_string()),
        price_per_day: Set(price_per_day),
        hourly_rate: Set(hourly_rate),
        location: Set("Bengaluru".to_string()),
        license_plate: Set(Some("KA01AB1234".to_string())),
        description: Set(String::new()),
        image_url: Set(String::new()),
        available: Set(true),
        listed: Set(true),
        owner_id: Set(owner_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert car")
}

pub async fn create_carpool(
    db: &DatabaseConnection,
    driver_id: Uuid,
    seats: i32,
    departure: DateTime<Utc>,
) -> carpool::Model {
    carpool::ActiveModel {
        id: Set(Uuid::new_v4()),
        from_location: Set("Bengaluru".to_string()),
        to_location: Set("Mysuru".to_string()),
        departure_time: Set(departure.into()),
        available_seats: Set(seats),
        price_per_seat: Set(350.0),
        description: Set(String::new()),
        driver_id: Set(driver_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert carpool")
}

pub fn actor(user: &user::Model) -> Actor {
    Actor::from(user)
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration_hours: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        google_client_id: None,
        geocoder_url: "http://127.0.0.1:9".to_string(),
        geocoder_user_agent: "ride-share-backend-tests".to_string(),
        admin_email: "admin@rideshare.local".to_string(),
        admin_password: None,
        max_concurrent_requests: 16,
    }
}

pub fn app_state(db: DatabaseConnection) -> AppState {
    AppState::new(db, test_config()).expect("Failed to build application state")
}

pub fn claims(user: &user::Model) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: now + 3600,
        iat: now,
    }
}

pub fn bearer(user: &user::Model) -> String {
    let token = create_token(user.id, &user.email, user.role, JWT_SECRET, 1)
        .expect("Failed to sign token");
    format!("Bearer {}", token)
}
