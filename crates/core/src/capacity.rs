//! Pure spot accounting over rosters. Guests consume additional seats, so a
//! participant with `guest_count` N occupies 1 + N spots.

use crate::domain::event::{EventRecord, Roster, RosterId};

pub fn occupied_spots(roster: &Roster) -> u32 {
    roster.players.iter().map(|player| 1 + player.guest_count).sum()
}

/// May report a negative value only as a defensive observation; valid
/// transitions never produce one.
pub fn spots_left(roster: &Roster) -> i64 {
    i64::from(roster.capacity) - i64::from(occupied_spots(roster))
}

pub fn total_occupied(event: &EventRecord) -> u32 {
    event.rosters.iter().map(occupied_spots).sum()
}

pub fn total_capacity(event: &EventRecord) -> u32 {
    event.max_capacity()
}

pub fn is_full(event: &EventRecord) -> bool {
    available_rosters(event).is_empty()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterAvailability {
    pub id: RosterId,
    pub name: String,
    pub spots_left: u32,
    pub allow_guests: bool,
}

/// Rosters with at least one open spot, in declaration order.
pub fn available_rosters(event: &EventRecord) -> Vec<RosterAvailability> {
    event
        .rosters
        .iter()
        .filter_map(|roster| {
            let left = spots_left(roster);
            (left > 0).then(|| RosterAvailability {
                id: roster.id.clone(),
                name: roster.name.clone(),
                spots_left: left as u32,
                allow_guests: roster.allow_guests,
            })
        })
        .collect()
}
