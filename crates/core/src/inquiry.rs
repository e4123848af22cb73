//! Keyword matching for natural-language inquiries ("when is the next
//! event?", "am I playing?") plus pure reply composition. A thin read-only
//! layer over the event queries; no date parsing happens here.

use crate::capacity;
use crate::domain::event::{EventRecord, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inquiry {
    MyStatus,
    SpotsLeft,
    NextEvent,
    Help,
}

const STATUS_PHRASES: &[&str] = &["my status", "am i in", "am i playing"];
const SPOTS_PHRASES: &[&str] = &["spots left", "open spots", "how many spots"];
const NEXT_PHRASES: &[&str] = &["next event", "next match", "next game", "upcoming"];

pub fn classify(text: &str) -> Inquiry {
    let lowered = text.to_lowercase();
    let matches_any = |phrases: &[&str]| phrases.iter().any(|phrase| lowered.contains(phrase));

    if matches_any(STATUS_PHRASES) {
        Inquiry::MyStatus
    } else if matches_any(SPOTS_PHRASES) {
        Inquiry::SpotsLeft
    } else if matches_any(NEXT_PHRASES) {
        Inquiry::NextEvent
    } else {
        Inquiry::Help
    }
}

pub fn help_reply() -> String {
    "You may inquire about the 'next event', ask about your 'status', or check how many \
     'spots are left'."
        .to_string()
}

pub fn no_event_reply() -> String {
    "My apologies, but I could not find an upcoming engagement to check against.".to_string()
}

pub fn status_reply(event: &EventRecord, user: &UserId) -> String {
    if let Some(roster) = event.roster_of(user) {
        format!(
            "Your name is on the roster for *{}* for the event *{}* on *{}*.",
            roster.name, event.title, event.booking_date
        )
    } else if event.on_standby(user) {
        format!("Your name is held on the standby list for *{}*.", event.title)
    } else {
        format!(
            "It appears your name is not yet on any roster for *{}*. Use the 'Join Event' \
             button on the announcement should you wish to join.",
            event.title
        )
    }
}

pub fn spots_reply(event: &EventRecord) -> String {
    let spots_left =
        i64::from(capacity::total_capacity(event)) - i64::from(capacity::total_occupied(event));
    if spots_left > 0 {
        format!("For the event *{}*, there remain *{spots_left}* open position(s).", event.title)
    } else {
        format!(
            "The rosters for *{}* are at full complement, but you may still join the standby \
             list.",
            event.title
        )
    }
}

pub fn overview_reply(event: &EventRecord) -> String {
    let mut reply = format!(
        "The next scheduled engagement is *{}* on *{}* at *{}*.\n*Location:* {}",
        event.title, event.booking_date, event.booking_time, event.location
    );

    for roster in &event.rosters {
        let mentions = if roster.players.is_empty() {
            "_None as of yet._".to_string()
        } else {
            roster
                .players
                .iter()
                .map(|player| format!("<@{}>", player.id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        reply.push_str(&format!(
            "\n*{} ({}/{})*: {mentions}",
            roster.name,
            capacity::occupied_spots(roster),
            roster.capacity
        ));
    }

    if !event.standby.is_empty() {
        let standby = event
            .standby
            .iter()
            .map(|player| format!("<@{}>", player.id))
            .collect::<Vec<_>>()
            .join(", ");
        reply.push_str(&format!("\n*Awaiting the call:* {standby}"));
    }

    reply
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::event::{
        ChannelId, EventId, EventRecord, EventStatus, Participant, Roster, UserId,
    };
    use crate::domain::profile::EventCategory;

    use super::{classify, overview_reply, spots_reply, status_reply, Inquiry};

    fn event() -> EventRecord {
        let mut court = Roster::new("Court 1", 4, false);
        court.players.push(Participant::new(UserId("U1".to_string()), None, 0));
        court.players.push(Participant::new(UserId("U2".to_string()), None, 0));

        EventRecord {
            id: EventId("EVT-0000FEED".to_string()),
            title: "Padel Night".to_string(),
            event_type: "Padel Match".to_string(),
            category: EventCategory::Participatory,
            location: "Center Court".to_string(),
            description: None,
            venue_code: None,
            booking_date: "Friday, June 5th".to_string(),
            booking_time: "17:30".to_string(),
            booking_full_date: Utc::now(),
            rosters: vec![court],
            standby: vec![Participant::new(UserId("U3".to_string()), None, 0)],
            created_at: Utc::now(),
            created_by: UserId("U-CREATOR".to_string()),
            posted_messages: Vec::new(),
            status: EventStatus::Active,
            post_at: None,
            scheduled_channel_id: Some(ChannelId("C1".to_string())),
        }
    }

    #[test]
    fn classifies_known_phrases() {
        assert_eq!(classify("Am I playing on friday?"), Inquiry::MyStatus);
        assert_eq!(classify("how many SPOTS are left?"), Inquiry::SpotsLeft);
        assert_eq!(classify("when is the next match?"), Inquiry::NextEvent);
        assert_eq!(classify("good morning"), Inquiry::Help);
    }

    #[test]
    fn status_takes_precedence_over_next_event_phrasing() {
        assert_eq!(classify("am i in the next game?"), Inquiry::MyStatus);
    }

    #[test]
    fn status_reply_distinguishes_roster_standby_and_absent() {
        let event = event();
        assert!(status_reply(&event, &UserId("U1".to_string())).contains("Court 1"));
        assert!(status_reply(&event, &UserId("U3".to_string())).contains("standby"));
        assert!(status_reply(&event, &UserId("U9".to_string())).contains("not yet on any roster"));
    }

    #[test]
    fn spots_reply_reports_remaining_positions() {
        let event = event();
        assert!(spots_reply(&event).contains("*2*"));
    }

    #[test]
    fn overview_lists_rosters_and_standby() {
        let reply = overview_reply(&event());
        assert!(reply.contains("*Court 1 (2/4)*"));
        assert!(reply.contains("<@U1>, <@U2>"));
        assert!(reply.contains("Awaiting the call"));
    }
}
