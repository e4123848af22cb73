use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::UserId;

/// Per-user credentials for the external calendar provider, obtained through
/// its authorization flow and refreshed opportunistically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTokens {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}
