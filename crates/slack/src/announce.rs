//! Announcement rendering: the single source of every posted or updated
//! event message. Rendering is a pure function of the event record and the
//! channel's display preferences, so re-rendering an unchanged record always
//! yields byte-identical output.

use convoke_core::capacity;
use convoke_core::domain::channel::{ChannelConfig, DEFAULT_DISPLAY_EMOJI};
use convoke_core::domain::event::{EventId, EventRecord, Participant, UserId};

use crate::blocks::{Block, ButtonElement, ButtonStyle, MessageBuilder, MessageTemplate};

pub const JOIN_ACTION_ID: &str = "event.join.v1";
pub const ADD_TO_CALENDAR_ACTION_ID: &str = "event.add_to_calendar.v1";
pub const CONFIGURE_CHANNEL_ACTION_ID: &str = "channel.configure.v1";

/// The rendered message is the only durable link back to the record in some
/// flows, so the event id rides along in a marker block id.
const EVENT_ID_MARKER_PREFIX: &str = "event-id::";

fn mention(player: &Participant) -> String {
    if player.guest_count > 0 {
        format!("<@{}> (+{})", player.id, player.guest_count)
    } else {
        format!("<@{}>", player.id)
    }
}

fn mention_list(players: &[Participant], empty_label: &str) -> String {
    if players.is_empty() {
        empty_label.to_string()
    } else {
        players.iter().map(mention).collect::<Vec<_>>().join("\n- ")
    }
}

pub fn announcement_message(
    event: &EventRecord,
    channel_config: Option<&ChannelConfig>,
    intro_override: Option<&str>,
) -> MessageTemplate {
    let display_emoji =
        channel_config.map(ChannelConfig::display_emoji).unwrap_or(DEFAULT_DISPLAY_EMOJI);

    let mut intro = match intro_override {
        Some(custom) => custom.to_string(),
        None => format!(
            "A summons, esteemed gentlefolk! :{display_emoji}:\n\nArrangements have been made \
             for *{}* upon *{}*.",
            event.title, event.booking_date
        ),
    };
    if let Some(description) = &event.description {
        intro.push_str(&format!("\n\n_{description}_"));
    }

    let mut particulars = format!(
        "*The particulars:*\n\
         • :clock530: *Time:* {}\n\
         • :round_pushpin: *Location:* {}\n\
         • :busts_in_silhouette: *Capacity:* {} of {} positions filled",
        event.booking_time,
        event.location,
        capacity::total_occupied(event),
        capacity::total_capacity(event),
    );
    if let Some(venue_code) = &event.venue_code {
        particulars.push_str(&format!("\n• :key: *Entry code:* {venue_code}"));
    }

    let mut builder = MessageBuilder::new(format!("An invitation to {} awaits!", event.title))
        .section("event.announce.intro.v1", |section| {
            section.mrkdwn(intro);
        })
        .divider("event.announce.divider.top.v1")
        .section("event.announce.particulars.v1", |section| {
            section.mrkdwn(particulars);
        })
        .section("event.announce.usage.v1", |section| {
            section.mrkdwn(
                "Use the 'Join Event' button to sign up. To leave, use the `/convoke leave` \
                 command.",
            );
        })
        .actions("event.announce.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(JOIN_ACTION_ID, "Join Event")
                        .style(ButtonStyle::Primary)
                        .value(event.id.0.clone()),
                )
                .button(
                    ButtonElement::new(ADD_TO_CALENDAR_ACTION_ID, "Add to Calendar")
                        .value(event.id.0.clone()),
                );
        })
        .divider("event.announce.divider.rosters.v1");

    for (index, roster) in event.rosters.iter().enumerate() {
        let body = format!(
            "*The roster for {}* ({}/{})\n- {}",
            roster.name,
            capacity::occupied_spots(roster),
            roster.capacity,
            mention_list(&roster.players, "_Awaiting participants_"),
        );
        builder = builder.section(format!("event.announce.roster.{index}.v1"), |section| {
            section.mrkdwn(body);
        });
    }

    let standby = format!(
        "*The standby list* :hourglass_flowing_sand: ({}):\n- {}",
        event.standby.len(),
        mention_list(&event.standby, "_Presently vacant_"),
    );

    builder
        .section("event.announce.standby.v1", |section| {
            section.mrkdwn(standby);
        })
        .divider(format!("{EVENT_ID_MARKER_PREFIX}{}", event.id.0))
        .build()
}

/// Recover the event id from a rendered announcement's blocks.
pub fn event_id_from_blocks(blocks: &[Block]) -> Option<EventId> {
    blocks.iter().find_map(|block| {
        let Block::Divider { block_id } = block else {
            return None;
        };
        block_id.strip_prefix(EVENT_ID_MARKER_PREFIX).map(|id| EventId(id.to_string()))
    })
}

fn event_summary_line(event: &EventRecord) -> String {
    format!(
        "*{}*\n:calendar: {} at {}\n:round_pushpin: {}\n:busts_in_silhouette: {} of {} \
         positions filled",
        event.title,
        event.booking_date,
        event.booking_time,
        event.location,
        capacity::total_occupied(event),
        capacity::total_capacity(event),
    )
}

pub fn upcoming_events_message(events: &[EventRecord]) -> MessageTemplate {
    let mut builder = MessageBuilder::new("Here is a list of upcoming events.")
        .header("event.list.header.v1", "Forthcoming engagements");

    for (index, event) in events.iter().enumerate() {
        builder = builder
            .section(format!("event.list.entry.{index}.v1"), |section| {
                section.mrkdwn(event_summary_line(event));
            })
            .divider(format!("event.list.divider.{index}.v1"));
    }

    builder.build()
}

pub fn next_event_message(event: &EventRecord) -> MessageTemplate {
    MessageBuilder::new(format!("The next scheduled engagement is {}.", event.title))
        .header("event.next.header.v1", "The next engagement")
        .section("event.next.summary.v1", |section| {
            section.mrkdwn(event_summary_line(event));
        })
        .build()
}

pub fn my_events_message(events: &[EventRecord], user: &UserId) -> MessageTemplate {
    let mut builder = MessageBuilder::new("Here are your upcoming engagements.")
        .header("event.mine.header.v1", "Your personal ledger");

    for (index, event) in events.iter().enumerate() {
        let status = if event.on_standby(user) { "(on standby)" } else { "(confirmed)" };
        builder = builder
            .section(format!("event.mine.entry.{index}.v1"), |section| {
                section.mrkdwn(format!(
                    "*{}* - {status}\n:calendar: {} at {}",
                    event.title, event.booking_date, event.booking_time
                ));
            })
            .divider(format!("event.mine.divider.{index}.v1"));
    }

    builder.build()
}

pub fn config_prompt_message(greeting: &str) -> MessageTemplate {
    MessageBuilder::new("Channel configuration required.")
        .section("channel.configure.prompt.v1", |section| {
            section.mrkdwn(greeting);
        })
        .actions("channel.configure.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(CONFIGURE_CHANNEL_ACTION_ID, "Configure Convoke")
                    .style(ButtonStyle::Primary)
                    .value("configure_channel"),
            );
        })
        .build()
}

/// Shown when a join needs an explicit roster choice: the open rosters with
/// their remaining spots. The actual picker dialog is the gateway's concern.
pub fn roster_selection_message(event: &EventRecord) -> MessageTemplate {
    let open = capacity::available_rosters(event);
    let mut lines: Vec<String> = Vec::with_capacity(open.len());
    for slot in &open {
        let guests = if slot.allow_guests { " - guests welcome" } else { "" };
        lines.push(format!("• *{}* ({} spot(s) left){guests}", slot.name, slot.spots_left));
    }

    MessageBuilder::new(format!("Select a roster for {}.", event.title))
        .section("event.join.select.v1", |section| {
            section.mrkdwn(format!(
                "A roster selection is needed for *{}*. The open rosters are:\n{}",
                event.title,
                lines.join("\n")
            ));
        })
        .context("event.join.select.hint.v1", |context| {
            context.plain(
                "The option to bring guests may only be available for specific rosters.",
            );
        })
        .build()
}

pub fn calendar_connect_message(auth_url: &str) -> MessageTemplate {
    MessageBuilder::new("Connect your calendar account.")
        .section("event.calendar.connect.v1", |section| {
            section.mrkdwn(
                "Before I can add events to your calendar, you must grant me permission. \
                 Please click the button below to sign in.",
            );
        })
        .actions("event.calendar.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("event.calendar.authorize.v1", "Connect Calendar")
                    .style(ButtonStyle::Primary)
                    .url(auth_url),
            );
        })
        .build()
}
