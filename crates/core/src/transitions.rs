//! Roster transition engine: join, leave with standby promotion, and roster
//! management. Every transition is all-or-nothing: it validates against the
//! current record and only then mutates, so a failed call leaves the record
//! logically unchanged.

use crate::capacity;
use crate::domain::event::{EventRecord, Participant, Roster, RosterId, UserId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Admitted { roster_id: RosterId, roster_name: String, guest_count: u32 },
    /// All rosters were full; the user was queued on standby. This is the
    /// designed overflow path, not a failure.
    Standby,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemovalSite {
    Roster(String),
    Standby,
}

/// A standby participant moved onto a roster by a vacancy. The caller owes
/// the promoted user a direct notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    pub user_id: UserId,
    pub roster_id: RosterId,
    pub roster_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub removed_from: RemovalSite,
    pub promoted: Option<Promotion>,
}

pub fn join(
    event: &mut EventRecord,
    user: UserId,
    email: Option<String>,
    requested_roster: Option<&RosterId>,
    guest_count: u32,
) -> Result<JoinOutcome, DomainError> {
    if event.contains_user(&user) {
        return Err(DomainError::AlreadyEnrolled);
    }

    let available = capacity::available_rosters(event);
    if available.is_empty() {
        // Standby never tracks guests.
        event.standby.push(Participant::new(user, email, 0));
        return Ok(JoinOutcome::Standby);
    }

    let target_id = match requested_roster {
        Some(id) => id.clone(),
        // The target is implied only when a single no-guest roster is open;
        // otherwise the caller must have collected an explicit selection.
        None => match available.as_slice() {
            [sole] if !sole.allow_guests => sole.id.clone(),
            _ => return Err(DomainError::NoRosterSelected),
        },
    };

    let Some(index) = event.rosters.iter().position(|roster| roster.id == target_id) else {
        return Err(DomainError::RosterNotFound { roster: target_id.0 });
    };

    {
        let roster = &event.rosters[index];
        if guest_count > 0 && !roster.allow_guests {
            return Err(DomainError::GuestsNotAllowed { roster: roster.name.clone() });
        }

        let left = capacity::spots_left(roster);
        if left < 0 {
            // A negative balance means a concurrent write slipped past the
            // serialization point; abort rather than clamp.
            return Err(DomainError::InvariantViolation(format!(
                "roster {} reports negative spots left ({left})",
                roster.name
            )));
        }

        let requested = 1 + guest_count;
        if i64::from(requested) > left {
            return Err(DomainError::InsufficientCapacity {
                roster: roster.name.clone(),
                spots_left: left as u32,
                requested,
            });
        }
    }

    let roster = &mut event.rosters[index];
    roster.players.push(Participant::new(user, email, guest_count));
    Ok(JoinOutcome::Admitted {
        roster_id: roster.id.clone(),
        roster_name: roster.name.clone(),
        guest_count,
    })
}

pub fn leave(event: &mut EventRecord, user: &UserId) -> Result<LeaveOutcome, DomainError> {
    for index in 0..event.rosters.len() {
        let Some(position) =
            event.rosters[index].players.iter().position(|player| &player.id == user)
        else {
            continue;
        };

        event.rosters[index].players.remove(position);

        // Strict FIFO: the earliest-queued standby participant takes the
        // vacated spot, always with zero guests and regardless of the
        // roster's guest policy.
        let promoted = if event.standby.is_empty() {
            None
        } else {
            let mut next = event.standby.remove(0);
            next.guest_count = 0;
            let promotion = Promotion {
                user_id: next.id.clone(),
                roster_id: event.rosters[index].id.clone(),
                roster_name: event.rosters[index].name.clone(),
            };
            event.rosters[index].players.push(next);
            Some(promotion)
        };

        return Ok(LeaveOutcome {
            removed_from: RemovalSite::Roster(event.rosters[index].name.clone()),
            promoted,
        });
    }

    if let Some(position) = event.standby.iter().position(|player| &player.id == user) {
        event.standby.remove(position);
        return Ok(LeaveOutcome { removed_from: RemovalSite::Standby, promoted: None });
    }

    Err(DomainError::NotEnrolled)
}

pub fn add_roster(
    event: &mut EventRecord,
    name: &str,
    capacity: u32,
    allow_guests: bool,
) -> Result<RosterId, DomainError> {
    let name = name.trim();
    if name.is_empty() || capacity < 1 {
        return Err(DomainError::InvalidCapacity);
    }

    let roster = Roster::new(name, capacity, allow_guests);
    let id = roster.id.clone();
    event.rosters.push(roster);
    Ok(id)
}

pub fn remove_roster(event: &mut EventRecord, name: &str) -> Result<Roster, DomainError> {
    if event.rosters.len() <= 1 {
        return Err(DomainError::LastRosterProtected);
    }

    let Some(index) =
        event.rosters.iter().position(|roster| roster.name.eq_ignore_ascii_case(name.trim()))
    else {
        return Err(DomainError::RosterNotFound { roster: name.trim().to_string() });
    };

    if !event.rosters[index].players.is_empty() {
        return Err(DomainError::RosterOccupied { roster: event.rosters[index].name.clone() });
    }

    Ok(event.rosters.remove(index))
}
