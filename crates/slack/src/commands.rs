use async_trait::async_trait;
use thiserror::Error;

use convoke_core::domain::event::{ChannelId, EventId};

use crate::blocks::{self, MessageBuilder, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub verb: String,
    pub event_id: Option<EventId>,
    pub freeform_args: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterSpec {
    pub name: String,
    pub capacity: u32,
    pub allow_guests: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventCommand {
    Create,
    Leave { event_id: Option<EventId> },
    List,
    Next,
    Mine,
    Share { event_id: Option<EventId>, channel: Option<ChannelId> },
    AddRoster { event_id: Option<EventId>, spec: Option<RosterSpec> },
    RemoveRoster { event_id: Option<EventId>, roster_name: String },
    Delete { event_id: Option<EventId> },
    CalendarLogin,
    Help,
    Unknown { verb: String, freeform_args: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_event_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != "/convoke" {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let text = payload.text.trim().to_owned();
    let mut parts = text.split_whitespace();
    let verb = parts.next().unwrap_or("help").to_ascii_lowercase();
    let freeform_args = parts.collect::<Vec<_>>().join(" ");
    let event_id = freeform_args.split_whitespace().find_map(parse_event_id_token);

    Ok(CommandEnvelope {
        command: "convoke".to_owned(),
        verb,
        event_id,
        freeform_args,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        trigger_ts: payload.trigger_ts,
        request_id: payload.request_id,
    })
}

pub fn parse_event_command(input: &str) -> EventCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return EventCommand::Help;
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let freeform_args = parts.collect::<Vec<_>>().join(" ");
    classify_event_command(&verb, freeform_args)
}

fn classify_event_command(verb: &str, freeform_args: String) -> EventCommand {
    let event_id = freeform_args.split_whitespace().find_map(parse_event_id_token);

    match verb {
        "create" => EventCommand::Create,
        "leave" => EventCommand::Leave { event_id },
        "list" => EventCommand::List,
        "next" => EventCommand::Next,
        "mine" | "my-events" => EventCommand::Mine,
        "share" => EventCommand::Share {
            event_id,
            channel: freeform_args.split_whitespace().find_map(parse_channel_token),
        },
        "add-roster" => {
            EventCommand::AddRoster { event_id, spec: parse_roster_spec(&freeform_args) }
        }
        "remove-roster" => EventCommand::RemoveRoster {
            event_id,
            roster_name: remainder_after_event_id(&freeform_args),
        },
        "delete" => EventCommand::Delete { event_id },
        "calendar" | "gcal" => EventCommand::CalendarLogin,
        "help" => EventCommand::Help,
        _ => EventCommand::Unknown { verb: verb.to_owned(), freeform_args },
    }
}

/// Tokens after the event id form the roster spec: a capacity, an optional
/// `+guests` flag, and the remaining words as the roster name.
/// `add-roster EVT-00C0FFEE 4 +guests Skybox Upper`
fn parse_roster_spec(args: &str) -> Option<RosterSpec> {
    let mut capacity = None::<u32>;
    let mut allow_guests = false;
    let mut name_parts: Vec<&str> = Vec::new();

    for token in args.split_whitespace() {
        if parse_event_id_token(token).is_some() {
            continue;
        }
        if token.eq_ignore_ascii_case("+guests") {
            allow_guests = true;
            continue;
        }
        if capacity.is_none() {
            if let Ok(value) = token.parse::<u32>() {
                capacity = Some(value);
                continue;
            }
        }
        name_parts.push(token);
    }

    let name = name_parts.join(" ");
    if name.is_empty() {
        return None;
    }

    Some(RosterSpec { name, capacity: capacity.unwrap_or(0), allow_guests })
}

fn remainder_after_event_id(args: &str) -> String {
    args.split_whitespace()
        .filter(|token| parse_event_id_token(token).is_none())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accepts `EVT-` followed by 8 hex digits, tolerating surrounding
/// punctuation and lowercase input. The canonical form is uppercase.
pub fn parse_event_id_token(token: &str) -> Option<EventId> {
    let trimmed = token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-');
    let upper = trimmed.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    if bytes.len() != 12 || !upper.starts_with("EVT-") {
        return None;
    }

    if bytes[4..12].iter().all(u8::is_ascii_hexdigit) {
        Some(EventId(upper))
    } else {
        None
    }
}

/// Accepts `<#C123|name>`, `#C123`, or a bare channel id.
pub fn parse_channel_token(token: &str) -> Option<ChannelId> {
    let inner = token.strip_prefix("<#").and_then(|rest| rest.strip_suffix('>'));
    let candidate = match inner {
        Some(body) => body.split('|').next().unwrap_or(body),
        None => token.strip_prefix('#').unwrap_or(token),
    };

    let looks_like_channel = candidate.len() > 1
        && candidate.starts_with('C')
        && candidate.chars().all(|ch| ch.is_ascii_alphanumeric());
    looks_like_channel.then(|| ChannelId(candidate.to_string()))
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: EventCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match classify_event_command(&envelope.verb, envelope.freeform_args.clone()) {
            EventCommand::Create => self.service.create_event(&envelope).await,
            EventCommand::Leave { event_id } => self.service.leave_event(event_id, &envelope).await,
            EventCommand::List => self.service.list_events(&envelope).await,
            EventCommand::Next => self.service.next_event(&envelope).await,
            EventCommand::Mine => self.service.my_events(&envelope).await,
            EventCommand::Share { event_id, channel } => {
                self.service.share_event(event_id, channel, &envelope).await
            }
            EventCommand::AddRoster { event_id, spec } => {
                self.service.add_roster(event_id, spec, &envelope).await
            }
            EventCommand::RemoveRoster { event_id, roster_name } => {
                self.service.remove_roster(event_id, roster_name, &envelope).await
            }
            EventCommand::Delete { event_id } => {
                self.service.delete_event(event_id, &envelope).await
            }
            EventCommand::CalendarLogin => self.service.calendar_login(&envelope).await,
            EventCommand::Help => Ok(blocks::help_message()),
            EventCommand::Unknown { verb, .. } => Ok(blocks::error_message(
                &format!("Unsupported command `/convoke {verb}`. Try `/convoke help`."),
                &envelope.request_id,
            )),
        }
    }
}

#[async_trait]
pub trait EventCommandService: Send + Sync {
    async fn create_event(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn leave_event(
        &self,
        event_id: Option<EventId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn list_events(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn next_event(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn my_events(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn share_event(
        &self,
        event_id: Option<EventId>,
        channel: Option<ChannelId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn add_roster(
        &self,
        event_id: Option<EventId>,
        spec: Option<RosterSpec>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn remove_roster(
        &self,
        event_id: Option<EventId>,
        roster_name: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn delete_event(
        &self,
        event_id: Option<EventId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn calendar_login(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

fn placeholder_message(summary: impl Into<String>) -> MessageTemplate {
    let summary = summary.into();
    MessageBuilder::new(summary.clone())
        .section("event.placeholder.v1", |section| {
            section.plain(summary);
        })
        .build()
}

#[derive(Default)]
pub struct NoopEventCommandService;

#[async_trait]
impl EventCommandService for NoopEventCommandService {
    async fn create_event(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(placeholder_message("event creation form requested"))
    }

    async fn leave_event(
        &self,
        event_id: Option<EventId>,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let target = event_id.map(|id| id.0).unwrap_or_else(|| "your events".to_owned());
        Ok(placeholder_message(format!("leave requested for {target}")))
    }

    async fn list_events(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(placeholder_message("listing upcoming events"))
    }

    async fn next_event(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(placeholder_message("next event requested"))
    }

    async fn my_events(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(placeholder_message("personal ledger requested"))
    }

    async fn share_event(
        &self,
        event_id: Option<EventId>,
        channel: Option<ChannelId>,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let event = event_id.map(|id| id.0).unwrap_or_else(|| "unknown".to_owned());
        let channel = channel.map(|id| id.0).unwrap_or_else(|| "unknown".to_owned());
        Ok(placeholder_message(format!("share {event} into {channel}")))
    }

    async fn add_roster(
        &self,
        event_id: Option<EventId>,
        spec: Option<RosterSpec>,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let event = event_id.map(|id| id.0).unwrap_or_else(|| "unknown".to_owned());
        let detail = spec
            .map(|spec| format!("{} (capacity {})", spec.name, spec.capacity))
            .unwrap_or_else(|| "no spec".to_owned());
        Ok(placeholder_message(format!("add roster to {event}: {detail}")))
    }

    async fn remove_roster(
        &self,
        event_id: Option<EventId>,
        roster_name: String,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let event = event_id.map(|id| id.0).unwrap_or_else(|| "unknown".to_owned());
        Ok(placeholder_message(format!("remove roster {roster_name} from {event}")))
    }

    async fn delete_event(
        &self,
        event_id: Option<EventId>,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let event = event_id.map(|id| id.0).unwrap_or_else(|| "unknown".to_owned());
        Ok(placeholder_message(format!("delete requested for {event}")))
    }

    async fn calendar_login(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(placeholder_message("calendar authorization link requested"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use convoke_core::domain::event::EventId;

    use super::{
        normalize_event_command, parse_channel_token, parse_event_command, parse_event_id_token,
        CommandEnvelope, CommandParseError, CommandRouteError, CommandRouter,
        EventCommand, EventCommandService, NoopEventCommandService, RosterSpec,
        SlashCommandPayload,
    };
    use crate::blocks::MessageTemplate;

    fn envelope(verb: &str, args: &str) -> CommandEnvelope {
        CommandEnvelope {
            command: "convoke".to_owned(),
            verb: verb.to_owned(),
            event_id: args.split_whitespace().find_map(parse_event_id_token),
            freeform_args: args.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1".to_owned(),
            request_id: format!("req-{verb}"),
        }
    }

    #[test]
    fn parse_event_command_preserves_known_verbs() {
        assert!(matches!(parse_event_command("create"), EventCommand::Create));
        assert!(matches!(parse_event_command("leave EVT-00C0FFEE"), EventCommand::Leave { .. }));
        assert!(matches!(parse_event_command("list"), EventCommand::List));
        assert!(matches!(parse_event_command("next"), EventCommand::Next));
        assert!(matches!(parse_event_command("mine"), EventCommand::Mine));
        assert!(matches!(parse_event_command("help"), EventCommand::Help));
        assert!(matches!(parse_event_command(""), EventCommand::Help));
        assert!(matches!(parse_event_command("abracadabra"), EventCommand::Unknown { .. }));
    }

    #[test]
    fn event_id_token_accepts_canonical_and_scruffy_forms() {
        assert_eq!(
            parse_event_id_token("EVT-00C0FFEE"),
            Some(EventId("EVT-00C0FFEE".to_owned()))
        );
        assert_eq!(
            parse_event_id_token("#evt-00c0ffee,"),
            Some(EventId("EVT-00C0FFEE".to_owned()))
        );
        assert_eq!(parse_event_id_token("EVT-XYZ"), None);
        assert_eq!(parse_event_id_token("EVT-00C0FFEE9"), None);
        assert_eq!(parse_event_id_token("Q-2026-0001"), None);
    }

    #[test]
    fn channel_token_accepts_slack_escapes_and_bare_ids() {
        assert_eq!(parse_channel_token("<#C042ABC|general>").map(|id| id.0), Some("C042ABC".to_owned()));
        assert_eq!(parse_channel_token("#C042ABC").map(|id| id.0), Some("C042ABC".to_owned()));
        assert_eq!(parse_channel_token("C042ABC").map(|id| id.0), Some("C042ABC".to_owned()));
        assert_eq!(parse_channel_token("general"), None);
    }

    #[test]
    fn add_roster_parses_capacity_guest_flag_and_name() {
        let command = parse_event_command("add-roster EVT-00C0FFEE 4 +guests Skybox Upper");
        let EventCommand::AddRoster { event_id, spec } = command else {
            panic!("expected add-roster command");
        };

        assert_eq!(event_id.map(|id| id.0), Some("EVT-00C0FFEE".to_owned()));
        assert_eq!(
            spec,
            Some(RosterSpec { name: "Skybox Upper".to_owned(), capacity: 4, allow_guests: true })
        );
    }

    #[test]
    fn remove_roster_keeps_the_full_roster_name() {
        let command = parse_event_command("remove-roster EVT-00C0FFEE Court 2");
        let EventCommand::RemoveRoster { event_id, roster_name } = command else {
            panic!("expected remove-roster command");
        };

        assert_eq!(event_id.map(|id| id.0), Some("EVT-00C0FFEE".to_owned()));
        assert_eq!(roster_name, "Court 2");
    }

    #[test]
    fn share_extracts_event_and_target_channel() {
        let command = parse_event_command("share EVT-00C0FFEE <#C042ABC|announcements>");
        let EventCommand::Share { event_id, channel } = command else {
            panic!("expected share command");
        };

        assert_eq!(event_id.map(|id| id.0), Some("EVT-00C0FFEE".to_owned()));
        assert_eq!(channel.map(|id| id.0), Some("C042ABC".to_owned()));
    }

    #[test]
    fn normalize_event_command_rejects_foreign_slash_commands() {
        let error = normalize_event_command(SlashCommandPayload {
            command: "/otherbot".to_owned(),
            text: "help".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1".to_owned(),
            request_id: "req-1".to_owned(),
        })
        .expect_err("foreign command must fail");

        assert!(matches!(error, CommandParseError::UnsupportedCommand(_)));
    }

    #[test]
    fn normalize_event_command_extracts_verb_and_event_id() {
        let envelope = normalize_event_command(SlashCommandPayload {
            command: "/convoke".to_owned(),
            text: "  DELETE evt-00c0ffee ".to_owned(),
            channel_id: "C123".to_owned(),
            user_id: "U123".to_owned(),
            trigger_ts: "1700000000.1".to_owned(),
            request_id: "req-123".to_owned(),
        })
        .expect("normalized");

        assert_eq!(envelope.verb, "delete");
        assert_eq!(envelope.event_id.map(|id| id.0), Some("EVT-00C0FFEE".to_owned()));
    }

    #[tokio::test]
    async fn router_resolves_help_and_unknown_without_the_service() {
        let router = CommandRouter::new(NoopEventCommandService);

        let help = router.route(envelope("help", "")).await.expect("help route");
        assert!(!help.blocks.is_empty());

        let unknown = router.route(envelope("abracadabra", "")).await.expect("unknown route");
        assert!(unknown.fallback_text.contains("Unsupported command"));
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        #[derive(Default)]
        struct RecordingService {
            calls: Mutex<Vec<&'static str>>,
        }

        impl RecordingService {
            fn record(&self, name: &'static str) -> Result<MessageTemplate, CommandRouteError> {
                self.calls.lock().expect("lock").push(name);
                Ok(crate::blocks::help_message())
            }
        }

        #[async_trait::async_trait]
        impl EventCommandService for RecordingService {
            async fn create_event(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("create")
            }

            async fn leave_event(
                &self,
                _event_id: Option<EventId>,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("leave")
            }

            async fn list_events(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("list")
            }

            async fn next_event(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("next")
            }

            async fn my_events(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("mine")
            }

            async fn share_event(
                &self,
                _event_id: Option<EventId>,
                _channel: Option<convoke_core::domain::event::ChannelId>,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("share")
            }

            async fn add_roster(
                &self,
                _event_id: Option<EventId>,
                _spec: Option<RosterSpec>,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("add-roster")
            }

            async fn remove_roster(
                &self,
                _event_id: Option<EventId>,
                _roster_name: String,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("remove-roster")
            }

            async fn delete_event(
                &self,
                _event_id: Option<EventId>,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("delete")
            }

            async fn calendar_login(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<MessageTemplate, CommandRouteError> {
                self.record("calendar")
            }
        }

        let router = CommandRouter::new(RecordingService::default());
        for (verb, args) in [
            ("create", ""),
            ("leave", "EVT-00C0FFEE"),
            ("list", ""),
            ("next", ""),
            ("mine", ""),
            ("share", "EVT-00C0FFEE #C042ABC"),
            ("add-roster", "EVT-00C0FFEE 4 Court 3"),
            ("remove-roster", "EVT-00C0FFEE Court 3"),
            ("delete", "EVT-00C0FFEE"),
            ("calendar", ""),
        ] {
            router.route(envelope(verb, args)).await.expect("route");
        }

        let calls = router.service.calls.lock().expect("lock");
        assert_eq!(
            &*calls,
            &[
                "create",
                "leave",
                "list",
                "next",
                "mine",
                "share",
                "add-roster",
                "remove-roster",
                "delete",
                "calendar"
            ]
        );
    }
}
