//! Ride status transitions and who may trigger them.
//!
//! ```text
//! SEARCHING -> ACCEPTED -> ARRIVED -> IN_PROGRESS -> COMPLETED
//!      \           \__________\____________\______-> CANCELLED
//! ```
//!
//! Actor checks run before state checks, so a stranger poking at a finished
//! ride gets 403 rather than learning its status from a 400.

use serde::Deserialize;
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};

/// Which cancellation endpoint was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRoute {
    Passenger,
    Driver,
    /// `PATCH /rides/{id}` with `{"action": "cancel"}`.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Accept,
    Reject,
    Arrive,
    Start,
    Complete,
    Cancel(CancelRoute),
}

/// Actions accepted by the generic `PATCH` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchAction {
    Arrive,
    Start,
    Complete,
    Cancel,
}

impl From<PatchAction> for Command {
    fn from(action: PatchAction) -> Self {
        match action {
            PatchAction::Arrive => Command::Arrive,
            PatchAction::Start => Command::Start,
            PatchAction::Complete => Command::Complete,
            PatchAction::Cancel => Command::Cancel(CancelRoute::Any),
        }
    }
}

/// How the actor relates to a particular ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Passenger,
    AssignedDriver,
    /// A driver account that is not assigned to this ride.
    OtherDriver,
    Outsider,
}

impl Relation {
    pub fn of(ride: &ride::Model, actor_id: Uuid, role: UserRole) -> Self {
        if ride.passenger_id == actor_id {
            Relation::Passenger
        } else if ride.driver_id == Some(actor_id) {
            Relation::AssignedDriver
        } else if role == UserRole::Driver {
            Relation::OtherDriver
        } else {
            Relation::Outsider
        }
    }
}

/// Outcome of a permitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RideStatus,
    /// `None` when the command leaves the ride untouched (reject).
    pub to: Option<RideStatus>,
}

fn check_actor(command: Command, relation: Relation) -> AppResult<()> {
    use Relation::*;

    let (allowed, message) = match command {
        Command::Accept | Command::Reject => (
            matches!(relation, OtherDriver | AssignedDriver),
            "Only drivers can respond to ride requests",
        ),
        Command::Arrive | Command::Start | Command::Complete => (
            relation == AssignedDriver,
            "Only the assigned driver can update this ride",
        ),
        Command::Cancel(CancelRoute::Passenger) => (
            relation == Passenger,
            "Only the passenger can cancel this ride",
        ),
        Command::Cancel(CancelRoute::Driver) => (
            relation == AssignedDriver,
            "Only the assigned driver can cancel this ride",
        ),
        Command::Cancel(CancelRoute::Any) => (
            matches!(relation, Passenger | AssignedDriver),
            "You are not part of this ride",
        ),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(message.to_string()))
    }
}

fn next_status(status: RideStatus, command: Command) -> AppResult<Option<RideStatus>> {
    use RideStatus::*;

    let invalid = |message: &str| Err(AppError::BadRequest(message.to_string()));

    match (command, status) {
        (Command::Accept, Searching) => Ok(Some(Accepted)),
        (Command::Reject, Searching) => Ok(None),
        (Command::Accept | Command::Reject, _) => invalid("Ride is no longer available"),

        (Command::Arrive, Accepted) => Ok(Some(Arrived)),
        (Command::Arrive, _) => invalid("Ride must be accepted before arriving"),

        (Command::Start, Accepted | Arrived) => Ok(Some(InProgress)),
        (Command::Start, _) => invalid("Ride cannot be started in its current status"),

        (Command::Complete, InProgress) => Ok(Some(Completed)),
        (Command::Complete, _) => invalid("Only rides in progress can be completed"),

        (Command::Cancel(_), Completed) => invalid("Completed rides cannot be cancelled"),
        (Command::Cancel(_), Cancelled) => invalid("Ride is already cancelled"),
        (Command::Cancel(CancelRoute::Passenger), Searching | Accepted) => Ok(Some(Cancelled)),
        (Command::Cancel(CancelRoute::Driver), Accepted) => Ok(Some(Cancelled)),
        (Command::Cancel(CancelRoute::Any), _) => Ok(Some(Cancelled)),
        (Command::Cancel(_), _) => invalid("Ride can no longer be cancelled"),
    }
}

/// Decide whether `relation` may run `command` on a ride in `status`.
pub fn plan(status: RideStatus, command: Command, relation: Relation) -> AppResult<Transition> {
    check_actor(command, relation)?;
    let to = next_status(status, command)?;
    Ok(Transition { from: status, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    const COMMANDS: [Command; 8] = [
        Command::Accept,
        Command::Reject,
        Command::Arrive,
        Command::Start,
        Command::Complete,
        Command::Cancel(CancelRoute::Passenger),
        Command::Cancel(CancelRoute::Driver),
        Command::Cancel(CancelRoute::Any),
    ];

    const RELATIONS: [Relation; 4] = [
        Relation::Passenger,
        Relation::AssignedDriver,
        Relation::OtherDriver,
        Relation::Outsider,
    ];

    /// The full permission table, written out independently of `plan`.
    fn expected(status: RideStatus, command: Command, relation: Relation) -> Option<Option<RideStatus>> {
        use Relation::*;
        use RideStatus::*;

        let driver = matches!(relation, OtherDriver | AssignedDriver);
        match command {
            Command::Accept if driver && status == Searching => Some(Some(Accepted)),
            Command::Reject if driver && status == Searching => Some(None),
            Command::Arrive if relation == AssignedDriver && status == Accepted => Some(Some(Arrived)),
            Command::Start if relation == AssignedDriver && matches!(status, Accepted | Arrived) => {
                Some(Some(InProgress))
            }
            Command::Complete if relation == AssignedDriver && status == InProgress => {
                Some(Some(Completed))
            }
            Command::Cancel(CancelRoute::Passenger)
                if relation == Passenger && matches!(status, Searching | Accepted) =>
            {
                Some(Some(Cancelled))
            }
            Command::Cancel(CancelRoute::Driver) if relation == AssignedDriver && status == Accepted => {
                Some(Some(Cancelled))
            }
            Command::Cancel(CancelRoute::Any)
                if matches!(relation, Passenger | AssignedDriver)
                    && !matches!(status, Completed | Cancelled) =>
            {
                Some(Some(Cancelled))
            }
            _ => None,
        }
    }

    #[test]
    fn permitted_actions_match_the_table_exactly() {
        for status in RideStatus::iter() {
            for command in COMMANDS {
                for relation in RELATIONS {
                    let result = plan(status, command, relation);
                    match expected(status, command, relation) {
                        Some(to) => {
                            let transition = result.unwrap_or_else(|e| {
                                panic!("{command:?} by {relation:?} from {status:?} failed: {e}")
                            });
                            assert_eq!(transition.from, status);
                            assert_eq!(transition.to, to);
                        }
                        None => assert!(
                            matches!(result, Err(AppError::Forbidden(_) | AppError::BadRequest(_))),
                            "{command:?} by {relation:?} from {status:?} should be refused"
                        ),
                    }
                }
            }
        }
    }

    #[test]
    fn actor_mismatch_wins_over_invalid_state() {
        let err = plan(RideStatus::Completed, Command::Complete, Relation::Outsider).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = plan(RideStatus::Completed, Command::Complete, Relation::AssignedDriver).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn completed_rides_cannot_be_cancelled_by_anyone() {
        for route in [CancelRoute::Passenger, CancelRoute::Driver, CancelRoute::Any] {
            for relation in [Relation::Passenger, Relation::AssignedDriver] {
                assert!(plan(RideStatus::Completed, Command::Cancel(route), relation).is_err());
            }
        }
    }

    #[test]
    fn passengers_cannot_accept_rides() {
        let err = plan(RideStatus::Searching, Command::Accept, Relation::Passenger).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn patch_actions_deserialize_lowercase() {
        let action: PatchAction = serde_json::from_str("\"start\"").unwrap();
        assert_eq!(Command::from(action), Command::Start);
        assert!(serde_json::from_str::<PatchAction>("\"accept\"").is_err());
    }
}
