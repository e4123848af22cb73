use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Short shareable code, e.g. `EVT-3FA9C10B`.
    pub fn generate() -> Self {
        Self(format!("EVT-{:08X}", rand::thread_rng().gen::<u32>()))
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterId(pub String);

impl RosterId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Scheduled,
    Active,
}

impl EventStatus {
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!((self, next), (EventStatus::Scheduled, EventStatus::Active))
    }
}

/// One ledger entry: a channel currently displaying the live announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub channel_id: ChannelId,
    pub message_ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub email: Option<String>,
    pub guest_count: u32,
}

impl Participant {
    pub fn new(id: UserId, email: Option<String>, guest_count: u32) -> Self {
        Self { id, email, guest_count }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub id: RosterId,
    pub name: String,
    pub capacity: u32,
    pub allow_guests: bool,
    pub players: Vec<Participant>,
}

impl Roster {
    pub fn new(name: impl Into<String>, capacity: u32, allow_guests: bool) -> Self {
        Self {
            id: RosterId::generate(),
            name: name.into(),
            capacity,
            allow_guests,
            players: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub title: String,
    pub event_type: String,
    pub category: super::profile::EventCategory,
    pub location: String,
    pub description: Option<String>,
    pub venue_code: Option<String>,
    /// Display date, e.g. "Friday, June 5th".
    pub booking_date: String,
    /// Display time, e.g. "17:30".
    pub booking_time: String,
    /// Canonical instant of the engagement itself.
    pub booking_full_date: DateTime<Utc>,
    pub rosters: Vec<Roster>,
    pub standby: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub posted_messages: Vec<PostedMessage>,
    pub status: EventStatus,
    /// Set only while `Scheduled`: when the announcement should first go out.
    pub post_at: Option<DateTime<Utc>>,
    /// Set only while `Scheduled`: where the first post lands.
    pub scheduled_channel_id: Option<ChannelId>,
}

impl EventRecord {
    /// Total capacity is always derived from the rosters so it cannot drift.
    pub fn max_capacity(&self) -> u32 {
        self.rosters.iter().map(|roster| roster.capacity).sum()
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.roster_of(user).is_some() || self.on_standby(user)
    }

    pub fn roster_of(&self, user: &UserId) -> Option<&Roster> {
        self.rosters.iter().find(|roster| roster.players.iter().any(|player| &player.id == user))
    }

    pub fn on_standby(&self, user: &UserId) -> bool {
        self.standby.iter().any(|player| &player.id == user)
    }

    /// The channel that "owns" this event: the first ledger entry for live
    /// announcements, or the designated channel while still scheduled.
    pub fn home_channel(&self) -> Option<&ChannelId> {
        self.posted_messages
            .first()
            .map(|posted| &posted.channel_id)
            .or(self.scheduled_channel_id.as_ref())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Scheduled
            && self.post_at.map(|post_at| post_at <= now).unwrap_or(false)
    }

    /// One-time publish transition: Scheduled -> Active, appending exactly the
    /// first ledger entry and clearing the scheduling fields.
    pub fn activate(&mut self, first_post: PostedMessage) -> Result<(), DomainError> {
        if !self.status.can_transition_to(EventStatus::Active) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: EventStatus::Active,
            });
        }
        if !self.posted_messages.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "scheduled event {} already has {} posted message(s)",
                self.id,
                self.posted_messages.len()
            )));
        }

        self.status = EventStatus::Active;
        self.post_at = None;
        self.scheduled_channel_id = None;
        self.posted_messages.push(first_post);
        Ok(())
    }

    /// Append an additional announcement location. The ledger holds at most
    /// one entry per channel.
    pub fn record_share(&mut self, posted: PostedMessage) -> Result<(), DomainError> {
        if self.posted_messages.iter().any(|existing| existing.channel_id == posted.channel_id) {
            return Err(DomainError::AlreadyShared { channel: posted.channel_id.0.clone() });
        }
        self.posted_messages.push(posted);
        Ok(())
    }
}
