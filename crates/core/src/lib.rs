pub mod capacity;
pub mod config;
pub mod domain;
pub mod errors;
pub mod inquiry;
pub mod transitions;

pub use capacity::{
    available_rosters, is_full, occupied_spots, spots_left, total_capacity, total_occupied,
    RosterAvailability,
};
pub use domain::calendar::CalendarTokens;
pub use domain::channel::ChannelConfig;
pub use domain::event::{
    ChannelId, EventId, EventRecord, EventStatus, Participant, PostedMessage, Roster, RosterId,
    UserId,
};
pub use domain::profile::{EventCategory, EventProfile};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use inquiry::Inquiry;
pub use transitions::{JoinOutcome, LeaveOutcome, Promotion, RemovalSite};
