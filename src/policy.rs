//! Route-level authorization.
//!
//! Every guarded action is listed once in [`rules`]; handlers and services
//! call [`authorize`] instead of repeating role, verification and ownership
//! checks at each call site.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;

/// The authenticated identity performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
    pub is_verified: bool,
}

impl Actor {
    /// Re-read the account behind a token so role and verification changes
    /// take effect without waiting for the token to expire.
    pub async fn load<C: ConnectionTrait>(db: &C, claims: &Claims) -> AppResult<Self> {
        let user = user::Entity::find_by_id(claims.sub)
            .one(db)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        Ok(Self::from(&user))
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            role: user.role,
            is_verified: user.is_verified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCar,
    ManageCar,
    CreateCarpool,
    CancelCarpool,
    CancelOwnBooking,
    CancelRentalAsOwner,
    ManageBookingAsOwner,
    ReviewBooking,
    ListAvailableRides,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Role(UserRole),
    Verified,
    /// The actor must be the owner passed to [`authorize`].
    Owner,
}

fn rules(action: Action) -> &'static [Rule] {
    use Rule::*;

    match action {
        Action::CreateCar | Action::CreateCarpool => &[Role(UserRole::Driver), Verified],
        Action::ManageCar | Action::CancelCarpool => &[Owner],
        Action::CancelOwnBooking | Action::ReviewBooking => &[Owner],
        Action::CancelRentalAsOwner | Action::ManageBookingAsOwner => &[Owner],
        Action::ListAvailableRides => &[Role(UserRole::Driver)],
        Action::ManageUsers => &[Role(UserRole::Admin)],
    }
}

fn describe(action: Action) -> &'static str {
    match action {
        Action::CreateCar => "list cars",
        Action::ManageCar => "manage this car",
        Action::CreateCarpool => "offer carpools",
        Action::CancelCarpool => "cancel this carpool",
        Action::CancelOwnBooking => "cancel this booking",
        Action::CancelRentalAsOwner => "cancel bookings on this car",
        Action::ManageBookingAsOwner => "manage this booking",
        Action::ReviewBooking => "review this booking",
        Action::ListAvailableRides => "view available rides",
        Action::ManageUsers => "manage users",
    }
}

/// Check `actor` against the rules of `action`.
///
/// `owner` is the user that owns the resource being acted on; it is only
/// consulted by actions with an ownership rule.
pub fn authorize(action: Action, actor: &Actor, owner: Option<Uuid>) -> AppResult<()> {
    for rule in rules(action) {
        let allowed = match rule {
            Rule::Role(role) => actor.role == *role,
            Rule::Verified => actor.is_verified,
            Rule::Owner => owner == Some(actor.id),
        };

        if !allowed {
            tracing::debug!(?action, ?rule, actor = %actor.id, "Authorization denied");
            let message = match rule {
                Rule::Role(UserRole::Driver) => format!("Only drivers can {}", describe(action)),
                Rule::Role(UserRole::Admin) => format!("Admin access required to {}", describe(action)),
                Rule::Role(UserRole::Passenger) => format!("Only passengers can {}", describe(action)),
                Rule::Verified => format!("Your account must be verified to {}", describe(action)),
                Rule::Owner => format!("You are not allowed to {}", describe(action)),
            };
            return Err(AppError::Forbidden(message));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: UserRole, is_verified: bool) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            is_verified,
        }
    }

    #[test]
    fn unverified_drivers_cannot_list_cars() {
        let driver = actor(UserRole::Driver, false);
        let err = authorize(Action::CreateCar, &driver, None).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg.contains("verified")));

        let verified = actor(UserRole::Driver, true);
        assert!(authorize(Action::CreateCar, &verified, None).is_ok());
    }

    #[test]
    fn passengers_cannot_offer_carpools_even_when_verified() {
        let passenger = actor(UserRole::Passenger, true);
        assert!(authorize(Action::CreateCarpool, &passenger, None).is_err());
    }

    #[test]
    fn ownership_rules_compare_the_owner() {
        let owner = actor(UserRole::Driver, true);
        let other = actor(UserRole::Driver, true);

        assert!(authorize(Action::ManageCar, &owner, Some(owner.id)).is_ok());
        assert!(authorize(Action::ManageCar, &other, Some(owner.id)).is_err());
        assert!(authorize(Action::ManageCar, &owner, None).is_err());
    }

    #[test]
    fn only_admins_manage_users() {
        assert!(authorize(Action::ManageUsers, &actor(UserRole::Admin, true), None).is_ok());
        assert!(authorize(Action::ManageUsers, &actor(UserRole::Driver, true), None).is_err());
    }

    #[test]
    fn available_rides_are_for_drivers() {
        assert!(authorize(Action::ListAvailableRides, &actor(UserRole::Driver, false), None).is_ok());
        assert!(authorize(Action::ListAvailableRides, &actor(UserRole::Passenger, false), None).is_err());
    }
}
