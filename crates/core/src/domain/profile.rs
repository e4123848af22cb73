use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{Roster, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    /// Players occupy seats themselves (courts, lanes, tables).
    Participatory,
    /// Attendees watch; a single shared roster.
    Spectator,
}

/// Named template consumed at event-creation time only. Controls the default
/// roster shape and location defaults for new events of this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProfile {
    pub name: String,
    pub category: EventCategory,
    /// Plural label for capacity units, e.g. "courts", "tables".
    pub capacity_unit: String,
    /// Seats each unit holds when the category is participatory.
    pub seats_per_unit: u32,
    pub default_location: Option<String>,
    pub venue_code: Option<String>,
    pub default_capacity: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl EventProfile {
    /// Default roster shape for a new event of this profile. Participatory
    /// profiles get one roster per unit ("Court 1", "Court 2", ...);
    /// spectator profiles get a single shared "Attendees" roster.
    pub fn default_rosters(&self) -> Vec<Roster> {
        match self.category {
            EventCategory::Participatory => {
                let unit = singular_unit(&self.capacity_unit);
                (1..=self.default_capacity)
                    .map(|index| {
                        Roster::new(
                            format!("{unit} {index}"),
                            self.seats_per_unit.max(1),
                            false,
                        )
                    })
                    .collect()
            }
            EventCategory::Spectator => {
                vec![Roster::new("Attendees", self.default_capacity.max(1), true)]
            }
        }
    }
}

fn singular_unit(capacity_unit: &str) -> String {
    let trimmed = capacity_unit.trim();
    let singular = trimmed.strip_suffix('s').unwrap_or(trimmed);
    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Roster".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::event::UserId;

    use super::{EventCategory, EventProfile};

    fn profile(category: EventCategory, capacity_unit: &str, default_capacity: u32) -> EventProfile {
        EventProfile {
            name: "Padel Match".to_string(),
            category,
            capacity_unit: capacity_unit.to_string(),
            seats_per_unit: 4,
            default_location: Some("Center Court".to_string()),
            venue_code: None,
            default_capacity,
            created_by: UserId("U-ADMIN".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn participatory_profile_builds_one_roster_per_unit() {
        let rosters = profile(EventCategory::Participatory, "courts", 3).default_rosters();

        assert_eq!(rosters.len(), 3);
        assert_eq!(rosters[0].name, "Court 1");
        assert_eq!(rosters[2].name, "Court 3");
        assert!(rosters.iter().all(|roster| roster.capacity == 4 && !roster.allow_guests));
    }

    #[test]
    fn spectator_profile_builds_single_attendee_roster() {
        let rosters = profile(EventCategory::Spectator, "attendees", 20).default_rosters();

        assert_eq!(rosters.len(), 1);
        assert_eq!(rosters[0].name, "Attendees");
        assert_eq!(rosters[0].capacity, 20);
        assert!(rosters[0].allow_guests);
    }
}
