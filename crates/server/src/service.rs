//! Event orchestration: every roster transition follows the same protocol -
//! acquire the event's lock, re-fetch the freshest record, apply the pure
//! transition, persist the full document, then best-effort resync every
//! posted announcement. The per-event-id lock is the serialization point
//! that keeps two concurrent joins from both taking the last spot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::{
    ChannelId, EventId, EventRecord, EventStatus, Participant, Roster, RosterId, UserId,
};
use convoke_core::errors::DomainError;
use convoke_core::inquiry;
use convoke_core::transitions::{self, JoinOutcome, LeaveOutcome};
use convoke_db::repositories::{
    ChannelConfigStore, EventStore, ProfileStore, RepositoryError,
};
use convoke_slack::announce;
use convoke_slack::blocks::MessageBuilder;
use convoke_slack::events::{ConfigureChannelRequest, CreateEventRequest};
use convoke_slack::gateway::{ChatGateway, GatewayError};
use convoke_slack::sync;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event {0} not found")]
    EventNotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store unavailable: {0}")]
    Store(#[from] RepositoryError),
    #[error("chat gateway failure: {0}")]
    Gateway(#[from] GatewayError),
    #[error("channel {0} is not configured")]
    ChannelNotConfigured(String),
    #[error("unknown event profile {0}")]
    ProfileNotFound(String),
    #[error("administrator privileges required")]
    NotAdmin,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    /// Plain-language text for the user who triggered the operation.
    /// Collaborator failures get a generic apology; the detail goes to logs.
    pub fn user_notice(&self) -> String {
        match self {
            Self::EventNotFound(id) => {
                format!("I could not find an event with the ID `{id}`.")
            }
            Self::Domain(error) => error.user_notice(),
            Self::ChannelNotConfigured(channel) => format!(
                "I have not yet been configured for <#{channel}>. Please invite me there and \
                 configure my duties first."
            ),
            Self::ProfileNotFound(name) => {
                format!("No event profile named *{name}* exists. Create one first.")
            }
            Self::NotAdmin => {
                "My apologies, but only the channel administrator may perform this duty."
                    .to_string()
            }
            Self::InvalidRequest(detail) => detail.clone(),
            Self::Store(_) | Self::Gateway(_) => {
                "My apologies, an unforeseen complication has arisen.".to_string()
            }
        }
    }
}

/// Keyed async mutexes granting per-event-identifier mutual exclusion for
/// all transitions. The registry itself is only held long enough to clone
/// the per-event entry.
#[derive(Default)]
pub struct EventLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EventLocks {
    pub async fn acquire(&self, id: &EventId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut registry = self.inner.lock().await;
            registry.entry(id.0.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOutcome {
    pub event: EventRecord,
    pub scheduled: bool,
}

pub struct EventService {
    events: Arc<dyn EventStore>,
    channels: Arc<dyn ChannelConfigStore>,
    profiles: Arc<dyn ProfileStore>,
    gateway: Arc<dyn ChatGateway>,
    locks: EventLocks,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventStore>,
        channels: Arc<dyn ChannelConfigStore>,
        profiles: Arc<dyn ProfileStore>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self { events, channels, profiles, gateway, locks: EventLocks::default() }
    }

    pub fn gateway(&self) -> &dyn ChatGateway {
        self.gateway.as_ref()
    }

    pub(crate) fn events_store(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub(crate) fn channel_store(&self) -> &dyn ChannelConfigStore {
        self.channels.as_ref()
    }

    pub(crate) async fn lock_event(&self, id: &EventId) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }

    pub async fn get_event(&self, id: &EventId) -> Result<EventRecord, ServiceError> {
        self.events
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::EventNotFound(id.0.clone()))
    }

    async fn home_channel_config(
        &self,
        event: &EventRecord,
    ) -> Result<Option<ChannelConfig>, ServiceError> {
        match event.home_channel() {
            Some(channel) => Ok(self.channels.get(channel).await?),
            None => Ok(None),
        }
    }

    /// Best-effort broadcast; the transition is already committed, so a
    /// failed location only gets logged by the synchronizer.
    async fn resync_announcements(&self, event: &EventRecord) {
        if event.posted_messages.is_empty() {
            return;
        }
        let config = match self.home_channel_config(event).await {
            Ok(config) => config,
            Err(error) => {
                warn!(
                    event_name = "event.resync.config_lookup_failed",
                    event_id = %event.id,
                    error = %error,
                    "channel config lookup failed; resyncing with defaults"
                );
                None
            }
        };
        sync::resync(event, config.as_ref(), self.gateway.as_ref()).await;
    }

    fn fail_transition(&self, event_id: &EventId, operation: &str, error: DomainError) -> ServiceError {
        if error.is_invariant_breach() {
            error!(
                event_name = "event.transition.invariant_breach",
                event_id = %event_id,
                operation,
                error = %error,
                "transition aborted; record left unpersisted"
            );
        }
        ServiceError::Domain(error)
    }

    pub async fn join(
        &self,
        event_id: &EventId,
        user: &UserId,
        requested_roster: Option<&RosterId>,
        guest_count: u32,
    ) -> Result<JoinOutcome, ServiceError> {
        // Contact lookup happens before the serialization point; only the
        // read-validate-write against the store runs under the lock.
        let email = self.gateway.user_email(user).await.unwrap_or_default();

        let (event, outcome) = {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.get_event(event_id).await?;
            let outcome =
                transitions::join(&mut event, user.clone(), email, requested_roster, guest_count)
                    .map_err(|error| self.fail_transition(event_id, "join", error))?;
            self.events.save(event.clone()).await?;
            (event, outcome)
        };

        info!(
            event_name = "event.transition.join",
            event_id = %event_id,
            user_id = %user,
            standby = matches!(outcome, JoinOutcome::Standby),
            "join committed"
        );
        self.resync_announcements(&event).await;
        Ok(outcome)
    }

    pub async fn leave(
        &self,
        event_id: &EventId,
        user: &UserId,
    ) -> Result<(EventRecord, LeaveOutcome), ServiceError> {
        let (event, outcome) = {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.get_event(event_id).await?;
            let outcome = transitions::leave(&mut event, user)
                .map_err(|error| self.fail_transition(event_id, "leave", error))?;
            self.events.save(event.clone()).await?;
            (event, outcome)
        };

        info!(
            event_name = "event.transition.leave",
            event_id = %event_id,
            user_id = %user,
            promoted = outcome.promoted.is_some(),
            "leave committed"
        );

        if let Some(promotion) = &outcome.promoted {
            let notice = format!(
                "Fortune smiles upon you! A position for *{}* has become available. You are now \
                 on the roster for *{}*.",
                event.title, promotion.roster_name
            );
            if let Err(error) = self.gateway.send_direct_message(&promotion.user_id, &notice).await
            {
                warn!(
                    event_name = "event.promotion.notify_failed",
                    event_id = %event_id,
                    user_id = %promotion.user_id,
                    error = %error,
                    "promotion notification failed; roster change already committed"
                );
            }
        }

        self.resync_announcements(&event).await;
        Ok((event, outcome))
    }

    pub async fn add_roster(
        &self,
        event_id: &EventId,
        actor: &UserId,
        name: &str,
        capacity: u32,
        allow_guests: bool,
    ) -> Result<EventRecord, ServiceError> {
        let event = {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.get_event(event_id).await?;
            self.require_admin(&event, actor).await?;

            transitions::add_roster(&mut event, name, capacity, allow_guests)
                .map_err(|error| self.fail_transition(event_id, "add_roster", error))?;

            self.events.save(event.clone()).await?;
            event
        };

        self.resync_announcements(&event).await;
        Ok(event)
    }

    pub async fn remove_roster(
        &self,
        event_id: &EventId,
        actor: &UserId,
        roster_name: &str,
    ) -> Result<Roster, ServiceError> {
        let (event, removed) = {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.get_event(event_id).await?;
            self.require_admin(&event, actor).await?;

            let removed = transitions::remove_roster(&mut event, roster_name)
                .map_err(|error| self.fail_transition(event_id, "remove_roster", error))?;

            self.events.save(event.clone()).await?;
            (event, removed)
        };

        self.resync_announcements(&event).await;
        Ok(removed)
    }

    /// Post the live announcement into an additional channel, appending a
    /// ledger entry. The target channel must be configured.
    pub async fn share(
        &self,
        event_id: &EventId,
        actor: &UserId,
        target_channel: &ChannelId,
    ) -> Result<EventRecord, ServiceError> {
        let snapshot = {
            let _guard = self.locks.acquire(event_id).await;
            let event = self.get_event(event_id).await?;
            self.require_admin(&event, actor).await?;
            if event.posted_messages.iter().any(|posted| &posted.channel_id == target_channel) {
                return Err(ServiceError::Domain(DomainError::AlreadyShared {
                    channel: target_channel.0.clone(),
                }));
            }
            event
        };

        let target_config = self
            .channels
            .get(target_channel)
            .await?
            .ok_or_else(|| ServiceError::ChannelNotConfigured(target_channel.0.clone()))?;

        let intro = format!(
            "A summons is issued! :trumpet:\n\nAll are invited to the engagement of *{}* on \
             *{}*. There are still positions available. Will you answer the call?",
            snapshot.title, snapshot.booking_date
        );
        let message = announce::announcement_message(&snapshot, Some(&target_config), Some(&intro));
        let posted = self.gateway.post_message(target_channel, &message).await?;

        // The post happened outside the lock; re-fetch before recording so a
        // racing share of the same channel loses cleanly.
        let result = {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.get_event(event_id).await?;
            match event.record_share(posted.clone()) {
                Ok(()) => {
                    self.events.save(event.clone()).await?;
                    Ok(event)
                }
                Err(error) => Err(error),
            }
        };

        match result {
            Ok(event) => {
                info!(
                    event_name = "event.share.posted",
                    event_id = %event_id,
                    channel_id = %target_channel,
                    locations = event.posted_messages.len(),
                    "announcement shared into additional channel"
                );
                Ok(event)
            }
            Err(error) => {
                if let Err(cleanup_error) = self.gateway.delete_message(&posted).await {
                    warn!(
                        event_name = "event.share.orphan_cleanup_failed",
                        event_id = %event_id,
                        channel_id = %target_channel,
                        error = %cleanup_error,
                        "losing share left an orphan announcement behind"
                    );
                }
                Err(ServiceError::Domain(error))
            }
        }
    }

    /// Cancel an event: best-effort removal of every posted announcement,
    /// then the record itself. Once the record is gone, no further
    /// synchronization happens for this identifier.
    pub async fn delete(
        &self,
        event_id: &EventId,
        actor: &UserId,
    ) -> Result<EventRecord, ServiceError> {
        let event = {
            let _guard = self.locks.acquire(event_id).await;
            let event = self.get_event(event_id).await?;
            self.require_admin(&event, actor).await?;
            // Removing the record first halts any further synchronization
            // for this identifier.
            self.events.delete(event_id).await?;
            event
        };
        info!(event_name = "event.delete.committed", event_id = %event_id, "event expunged");

        for posted in &event.posted_messages {
            if let Err(error) = self.gateway.delete_message(posted).await {
                warn!(
                    event_name = "event.delete.message_failed",
                    event_id = %event_id,
                    channel_id = %posted.channel_id,
                    message_ts = %posted.message_ts,
                    error = %error,
                    "failed to delete one posted announcement; continuing"
                );
            }
        }

        Ok(event)
    }

    pub async fn create_event(
        &self,
        request: CreateEventRequest,
        author: &UserId,
    ) -> Result<CreateOutcome, ServiceError> {
        let channel_config = self
            .channels
            .get(&request.channel_id)
            .await?
            .ok_or_else(|| ServiceError::ChannelNotConfigured(request.channel_id.0.clone()))?;

        let profile = self
            .profiles
            .get(&request.event_type)
            .await?
            .ok_or_else(|| ServiceError::ProfileNotFound(request.event_type.clone()))?;

        if request.rosters.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "At least one roster is required before an event can be proclaimed.".to_string(),
            ));
        }

        let booking_full_date = parse_booking_instant(&request.date, &request.time)?;
        let now = Utc::now();
        // A post time more than a few seconds out means deferred publication.
        let scheduled =
            request.post_at.map(|post_at| post_at > now + Duration::seconds(5)).unwrap_or(false);

        let mut rosters = Vec::with_capacity(request.rosters.len());
        for draft in &request.rosters {
            if draft.name.trim().is_empty() || draft.capacity < 1 {
                return Err(ServiceError::Domain(DomainError::InvalidCapacity));
            }
            rosters.push(Roster::new(draft.name.trim(), draft.capacity, draft.allow_guests));
        }

        let mut event = EventRecord {
            id: EventId::generate(),
            title: request.title.clone(),
            event_type: request.event_type.clone(),
            category: profile.category,
            location: request.location.clone(),
            description: request.description.clone(),
            venue_code: profile.venue_code.clone(),
            booking_date: format_booking_date(booking_full_date),
            booking_time: request.time.clone(),
            booking_full_date,
            rosters,
            standby: Vec::new(),
            created_at: now,
            created_by: author.clone(),
            posted_messages: Vec::new(),
            status: if scheduled { EventStatus::Scheduled } else { EventStatus::Active },
            post_at: scheduled.then(|| request.post_at.unwrap_or(now)),
            scheduled_channel_id: scheduled.then(|| request.channel_id.clone()),
        };

        if scheduled {
            // The scheduling gate posts it once post_at arrives.
            self.events.save(event.clone()).await?;
            info!(
                event_name = "event.create.scheduled",
                event_id = %event.id,
                channel_id = %request.channel_id,
                "event stored for deferred announcement"
            );
            return Ok(CreateOutcome { event, scheduled: true });
        }

        let message = announce::announcement_message(&event, Some(&channel_config), None);
        let posted = self.gateway.post_message(&request.channel_id, &message).await?;
        event.posted_messages.push(posted);
        self.events.save(event.clone()).await?;
        info!(
            event_name = "event.create.posted",
            event_id = %event.id,
            channel_id = %request.channel_id,
            "event announced"
        );

        Ok(CreateOutcome { event, scheduled: false })
    }

    pub async fn configure_channel(
        &self,
        request: ConfigureChannelRequest,
        actor: &UserId,
    ) -> Result<ChannelConfig, ServiceError> {
        let config = ChannelConfig {
            channel_id: request.channel_id.clone(),
            default_event_type: request.default_event_type,
            reaction_emoji: request.reaction_emoji.replace(':', ""),
            display_emoji: request.display_emoji.replace(':', ""),
            reminder_template: request.reminder_template,
            configured_by: actor.clone(),
            configured_at: Utc::now(),
        };
        self.channels.set(config.clone()).await?;

        let notice = MessageBuilder::new(format!(
            "My duties for this channel have been set by <@{actor}>. I am now at your service."
        ))
        .section("channel.configured.v1", |section| {
            section.mrkdwn(format!(
                "My duties for this channel have been set by <@{actor}>. I am now at your \
                 service."
            ));
        })
        .build();
        if let Err(error) = self.gateway.post_message(&request.channel_id, &notice).await {
            warn!(
                event_name = "channel.configured.notice_failed",
                channel_id = %request.channel_id,
                error = %error,
                "configuration saved but the channel notice failed"
            );
        }

        Ok(config)
    }

    pub async fn next_event(&self) -> Result<Option<EventRecord>, ServiceError> {
        let mut upcoming = self.events.find_upcoming(start_of_today()).await?;
        Ok(if upcoming.is_empty() { None } else { Some(upcoming.remove(0)) })
    }

    pub async fn list_upcoming(&self) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self.events.find_upcoming(start_of_today()).await?)
    }

    pub async fn my_events(&self, user: &UserId) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self.events.find_by_participant(user, start_of_today()).await?)
    }

    /// Keyword inquiry answering over the next upcoming event.
    pub async fn inquiry_answer(&self, text: &str, user: &UserId) -> Result<String, ServiceError> {
        let classified = inquiry::classify(text);
        if classified == inquiry::Inquiry::Help {
            return Ok(inquiry::help_reply());
        }

        let Some(event) = self.next_event().await? else {
            return Ok(inquiry::no_event_reply());
        };

        Ok(match classified {
            inquiry::Inquiry::MyStatus => inquiry::status_reply(&event, user),
            inquiry::Inquiry::SpotsLeft => inquiry::spots_reply(&event),
            inquiry::Inquiry::NextEvent => inquiry::overview_reply(&event),
            inquiry::Inquiry::Help => inquiry::help_reply(),
        })
    }

    pub async fn is_channel_admin(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .channels
            .get(channel)
            .await?
            .map(|config| config.is_admin(user))
            .unwrap_or(false))
    }

    async fn require_admin(&self, event: &EventRecord, actor: &UserId) -> Result<(), ServiceError> {
        let Some(channel) = event.home_channel() else {
            return Err(ServiceError::NotAdmin);
        };
        if self.is_channel_admin(channel, actor).await? {
            Ok(())
        } else {
            Err(ServiceError::NotAdmin)
        }
    }

    /// Re-post helper used by the scheduling gate after a publish.
    pub(crate) async fn persist(&self, event: &EventRecord) -> Result<(), ServiceError> {
        Ok(self.events.save(event.clone()).await?)
    }
}

fn parse_booking_instant(date: &str, time: &str) -> Result<DateTime<Utc>, ServiceError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
        ServiceError::InvalidRequest(format!("`{date}` is not a valid date (expected YYYY-MM-DD)"))
    })?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| {
        ServiceError::InvalidRequest(format!("`{time}` is not a valid time (expected HH:MM)"))
    })?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

fn format_booking_date(instant: DateTime<Utc>) -> String {
    instant.format("%A, %B %-d").to_string()
}

fn start_of_today() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Participant mix used by reminders and calendar attendee lists.
pub fn roster_player_ids(event: &EventRecord) -> Vec<UserId> {
    event
        .rosters
        .iter()
        .flat_map(|roster| roster.players.iter().map(|player| player.id.clone()))
        .collect()
}

pub fn all_participants(event: &EventRecord) -> Vec<Participant> {
    event
        .rosters
        .iter()
        .flat_map(|roster| roster.players.iter().cloned())
        .chain(event.standby.iter().cloned())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use convoke_core::domain::event::{ChannelId, PostedMessage, UserId};
    use convoke_slack::blocks::MessageTemplate;
    use convoke_slack::gateway::{ChatGateway, GatewayError};

    /// Records every gateway interaction; optionally fails posts/updates to
    /// scripted channels.
    #[derive(Default)]
    pub struct RecordingGateway {
        pub fail_post_channels: Vec<String>,
        pub state: Mutex<RecordingState>,
        next_ts: Mutex<u64>,
    }

    #[derive(Default)]
    pub struct RecordingState {
        pub posts: Vec<(String, String)>,
        pub updates: Vec<(String, String)>,
        pub deletes: Vec<(String, String)>,
        pub ephemerals: Vec<(String, String)>,
        pub direct_messages: Vec<(String, String)>,
        pub group_messages: Vec<(Vec<String>, String)>,
    }

    impl RecordingGateway {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn post_message(
            &self,
            channel: &ChannelId,
            message: &MessageTemplate,
        ) -> Result<PostedMessage, GatewayError> {
            if self.fail_post_channels.contains(&channel.0) {
                return Err(GatewayError::Post("channel_not_found".to_string()));
            }
            let ts = {
                let mut next = self.next_ts.lock().expect("ts lock");
                *next += 1;
                format!("1730000000.{:04}", *next)
            };
            self.state
                .lock()
                .expect("state lock")
                .posts
                .push((channel.0.clone(), message.fallback_text.clone()));
            Ok(PostedMessage { channel_id: channel.clone(), message_ts: ts })
        }

        async fn update_message(
            &self,
            location: &PostedMessage,
            message: &MessageTemplate,
        ) -> Result<(), GatewayError> {
            self.state
                .lock()
                .expect("state lock")
                .updates
                .push((location.channel_id.0.clone(), message.fallback_text.clone()));
            Ok(())
        }

        async fn delete_message(&self, location: &PostedMessage) -> Result<(), GatewayError> {
            self.state
                .lock()
                .expect("state lock")
                .deletes
                .push((location.channel_id.0.clone(), location.message_ts.clone()));
            Ok(())
        }

        async fn post_ephemeral(
            &self,
            _channel: &ChannelId,
            user: &UserId,
            text: &str,
        ) -> Result<(), GatewayError> {
            self.state
                .lock()
                .expect("state lock")
                .ephemerals
                .push((user.0.clone(), text.to_string()));
            Ok(())
        }

        async fn send_direct_message(
            &self,
            user: &UserId,
            text: &str,
        ) -> Result<(), GatewayError> {
            self.state
                .lock()
                .expect("state lock")
                .direct_messages
                .push((user.0.clone(), text.to_string()));
            Ok(())
        }

        async fn send_group_message(
            &self,
            users: &[UserId],
            text: &str,
        ) -> Result<(), GatewayError> {
            self.state
                .lock()
                .expect("state lock")
                .group_messages
                .push((users.iter().map(|user| user.0.clone()).collect(), text.to_string()));
            Ok(())
        }

        async fn user_email(&self, user: &UserId) -> Result<Option<String>, GatewayError> {
            Ok(Some(format!("{}@example.com", user.0.to_ascii_lowercase())))
        }
    }
}
