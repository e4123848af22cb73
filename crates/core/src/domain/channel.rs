use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{ChannelId, UserId};

pub const DEFAULT_REACTION_EMOJI: &str = "hand";
pub const DEFAULT_DISPLAY_EMOJI: &str = "scroll";
pub const DEFAULT_REMINDER_TEMPLATE: &str = "Reminder: our engagement {event_title} is scheduled \
for tomorrow at {event_time}. Please plan accordingly. {weather}";

/// Per-channel bot settings. The user who configured the channel acts as its
/// administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: ChannelId,
    pub default_event_type: String,
    pub reaction_emoji: String,
    pub display_emoji: String,
    pub reminder_template: Option<String>,
    pub configured_by: UserId,
    pub configured_at: DateTime<Utc>,
}

impl ChannelConfig {
    pub fn is_admin(&self, user: &UserId) -> bool {
        &self.configured_by == user
    }

    pub fn display_emoji(&self) -> &str {
        if self.display_emoji.is_empty() { DEFAULT_DISPLAY_EMOJI } else { &self.display_emoji }
    }

    pub fn reaction_emoji(&self) -> &str {
        if self.reaction_emoji.is_empty() { DEFAULT_REACTION_EMOJI } else { &self.reaction_emoji }
    }

    pub fn reminder_template(&self) -> &str {
        self.reminder_template.as_deref().unwrap_or(DEFAULT_REMINDER_TEMPLATE)
    }
}
