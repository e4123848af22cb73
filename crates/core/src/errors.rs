use thiserror::Error;

use crate::domain::event::EventStatus;

/// Validation failures of roster transitions. Every variant is recoverable
/// and reported back to the originating user as a plain-language notice via
/// [`DomainError::user_notice`]; only `InvariantViolation` and
/// `InvalidStatusTransition` indicate state that should never be reachable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("user already enrolled")]
    AlreadyEnrolled,
    #[error("user not enrolled")]
    NotEnrolled,
    #[error("roster {roster} does not allow guests")]
    GuestsNotAllowed { roster: String },
    #[error("a roster selection is required")]
    NoRosterSelected,
    #[error("roster {roster} has {spots_left} spot(s) left but {requested} requested")]
    InsufficientCapacity { roster: String, spots_left: u32, requested: u32 },
    #[error("roster capacity must be at least 1 and the name must not be blank")]
    InvalidCapacity,
    #[error("the last remaining roster cannot be removed")]
    LastRosterProtected,
    #[error("roster {roster} is occupied")]
    RosterOccupied { roster: String },
    #[error("no roster named {roster}")]
    RosterNotFound { roster: String },
    #[error("announcement already posted in channel {channel}")]
    AlreadyShared { channel: String },
    #[error("invalid event transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: EventStatus, to: EventStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Plain-language text for the ephemeral notice shown to the user who
    /// triggered the transition.
    pub fn user_notice(&self) -> String {
        match self {
            Self::AlreadyEnrolled => {
                "It appears you are already on the roster or standby list for this event."
                    .to_string()
            }
            Self::NotEnrolled => {
                "It appears your name was not on the list for that event after all.".to_string()
            }
            Self::GuestsNotAllowed { roster } => {
                format!("My apologies, but the roster *{roster}* does not permit guests.")
            }
            Self::NoRosterSelected => {
                "Please select which roster you wish to join.".to_string()
            }
            Self::InsufficientCapacity { roster, .. } => format!(
                "My apologies, but there are not enough spots left for you and your guest(s) on \
                 the *{roster}* roster."
            ),
            Self::InvalidCapacity => {
                "A roster needs a name and a capacity of at least 1.".to_string()
            }
            Self::LastRosterProtected => {
                "I cannot remove the last remaining roster from an event.".to_string()
            }
            Self::RosterOccupied { roster } => {
                format!("I cannot remove the roster *{roster}* as it is currently occupied.")
            }
            Self::RosterNotFound { roster } => {
                format!("I could not find a roster named \"{roster}\" for this event.")
            }
            Self::AlreadyShared { .. } => {
                "It appears this announcement has already been posted in that channel.".to_string()
            }
            Self::InvalidStatusTransition { .. } | Self::InvariantViolation(_) => {
                "My apologies, an unforeseen complication has arisen.".to_string()
            }
        }
    }

    /// Whether this failure points at corrupted or raced state rather than a
    /// bad request. Such failures abort the transition and are logged at high
    /// severity instead of being shown as validation feedback.
    pub fn is_invariant_breach(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::InvalidStatusTransition { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store unavailable: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) if error.is_invariant_breach() => Self::Internal {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Domain(_) => Self::BadRequest {
                message: "domain validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn validation_error_maps_to_bad_request() {
        let interface =
            ApplicationError::from(DomainError::AlreadyEnrolled).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn invariant_breach_maps_to_internal_not_bad_request() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "negative spots observed".to_owned(),
        ))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Persistence("database lock timeout".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn every_validation_variant_renders_a_user_notice() {
        let variants = [
            DomainError::AlreadyEnrolled,
            DomainError::NotEnrolled,
            DomainError::GuestsNotAllowed { roster: "Court 1".to_owned() },
            DomainError::NoRosterSelected,
            DomainError::InsufficientCapacity {
                roster: "Court 1".to_owned(),
                spots_left: 1,
                requested: 3,
            },
            DomainError::InvalidCapacity,
            DomainError::LastRosterProtected,
            DomainError::RosterOccupied { roster: "Court 1".to_owned() },
            DomainError::RosterNotFound { roster: "Court 9".to_owned() },
            DomainError::AlreadyShared { channel: "C1".to_owned() },
        ];

        for variant in variants {
            assert!(!variant.user_notice().is_empty());
            assert!(!variant.is_invariant_breach());
        }
    }
}
