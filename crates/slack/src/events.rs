use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use convoke_core::domain::event::{ChannelId, EventId, RosterId, UserId};
use convoke_core::inquiry;

use crate::{
    announce,
    blocks::MessageTemplate,
    commands::{
        normalize_event_command, CommandParseError, CommandRouteError, CommandRouter,
        EventCommandService, NoopEventCommandService, SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    AppMention(MentionEvent),
    DirectMessage(DirectMessageEvent),
    MemberJoinedChannel(MemberJoinedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::MemberJoinedChannel(_) => SlackEventType::MemberJoinedChannel,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    ViewSubmission,
    AppMention,
    DirectMessage,
    MemberJoinedChannel,
    Unsupported,
}

/// A button click on a posted message. The event id travels in the button
/// value; the announcement marker block is the fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: ChannelId,
    pub message_ts: String,
    pub user_id: UserId,
    pub action_id: String,
    pub value: Option<String>,
    pub trigger_id: Option<String>,
    pub request_id: Option<String>,
}

/// A structured intent collected by a modal. Modal rendering and state
/// extraction belong to the messaging gateway; by the time an intent reaches
/// the core it is already typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: UserId,
    pub channel_id: Option<ChannelId>,
    pub intent: ViewIntent,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewIntent {
    JoinRoster { event_id: EventId, roster_id: Option<RosterId>, guest_count: u32 },
    CreateEvent(CreateEventRequest),
    ConfigureChannel(ConfigureChannelRequest),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterDraft {
    pub name: String,
    pub capacity: u32,
    pub allow_guests: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateEventRequest {
    pub channel_id: ChannelId,
    pub title: String,
    pub event_type: String,
    /// `YYYY-MM-DD`, as delivered by the date picker.
    pub date: String,
    /// `HH:MM`, as delivered by the time picker.
    pub time: String,
    pub location: String,
    pub description: Option<String>,
    pub post_at: Option<DateTime<Utc>>,
    pub rosters: Vec<RosterDraft>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigureChannelRequest {
    pub channel_id: ChannelId,
    pub default_event_type: String,
    pub reaction_emoji: String,
    pub display_emoji: String,
    pub reminder_template: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionEvent {
    pub channel_id: ChannelId,
    pub message_ts: String,
    pub user_id: UserId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectMessageEvent {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberJoinedEvent {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    /// True when the joining member is the bot itself.
    pub is_self: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("block action handler failure: {0}")]
    BlockAction(String),
    #[error("intent handler failure: {0}")]
    Intent(String),
    #[error("inquiry handler failure: {0}")]
    Inquiry(String),
    #[error("channel join handler failure: {0}")]
    ChannelJoin(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(NoopEventCommandService));
    dispatcher.register(BlockActionHandler::new(NoopBlockActionService));
    dispatcher.register(ViewSubmissionHandler::new(NoopIntentService));
    dispatcher.register(MentionHandler::new(NoopInquiryService));
    dispatcher.register(DirectMessageHandler::new(NoopInquiryService));
    dispatcher.register(ChannelJoinHandler::new(NoopChannelJoinService));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: EventCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: EventCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_event_command(payload.clone())?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(message))
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_block_action(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

pub struct NoopBlockActionService;

#[async_trait]
impl BlockActionService for NoopBlockActionService {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let request_id = event.request_id.as_deref().unwrap_or(&ctx.correlation_id);
        let detail = match &event.value {
            Some(value) => format!("interactive action `{}` with payload `{value}`", event.action_id),
            None => format!("interactive action `{}` with no payload", event.action_id),
        };
        Ok(Some(crate::blocks::error_message(&detail, request_id)))
    }
}

#[async_trait]
pub trait IntentService: Send + Sync {
    async fn handle_intent(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct ViewSubmissionHandler<S> {
    service: S,
}

impl<S> ViewSubmissionHandler<S>
where
    S: IntentService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: IntentService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_intent(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

pub struct NoopIntentService;

#[async_trait]
impl IntentService for NoopIntentService {
    async fn handle_intent(
        &self,
        _event: &ViewSubmissionEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(None)
    }
}

/// Keyword inquiries arriving through mentions or direct messages.
#[async_trait]
pub trait InquiryService: Send + Sync {
    async fn answer(
        &self,
        text: &str,
        user: &UserId,
        ctx: &EventContext,
    ) -> Result<String, EventHandlerError>;
}

pub struct MentionHandler<S> {
    service: S,
}

impl<S> MentionHandler<S>
where
    S: InquiryService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MentionHandler<S>
where
    S: InquiryService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.answer(&event.text, &event.user_id, ctx).await?;
        Ok(HandlerResult::Responded(
            crate::blocks::MessageBuilder::new(reply.clone())
                .section("event.inquiry.reply.v1", |section| {
                    section.mrkdwn(reply);
                })
                .build(),
        ))
    }
}

pub struct DirectMessageHandler<S> {
    service: S,
}

impl<S> DirectMessageHandler<S>
where
    S: InquiryService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for DirectMessageHandler<S>
where
    S: InquiryService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DirectMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DirectMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.answer(&event.text, &event.user_id, ctx).await?;
        Ok(HandlerResult::Responded(
            crate::blocks::MessageBuilder::new(reply.clone())
                .section("event.inquiry.reply.v1", |section| {
                    section.mrkdwn(reply);
                })
                .build(),
        ))
    }
}

/// Answers from classification alone; has no store to consult.
pub struct NoopInquiryService;

#[async_trait]
impl InquiryService for NoopInquiryService {
    async fn answer(
        &self,
        text: &str,
        _user: &UserId,
        _ctx: &EventContext,
    ) -> Result<String, EventHandlerError> {
        Ok(match inquiry::classify(text) {
            inquiry::Inquiry::Help => inquiry::help_reply(),
            _ => inquiry::no_event_reply(),
        })
    }
}

#[async_trait]
pub trait ChannelJoinService: Send + Sync {
    /// Returns the greeting to post when the bot lands in a new channel.
    async fn channel_greeting(
        &self,
        event: &MemberJoinedEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct ChannelJoinHandler<S> {
    service: S,
}

impl<S> ChannelJoinHandler<S>
where
    S: ChannelJoinService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ChannelJoinHandler<S>
where
    S: ChannelJoinService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MemberJoinedChannel
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::MemberJoinedChannel(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.channel_greeting(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

pub struct NoopChannelJoinService;

#[async_trait]
impl ChannelJoinService for NoopChannelJoinService {
    async fn channel_greeting(
        &self,
        event: &MemberJoinedEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        if !event.is_self {
            return Ok(None);
        }

        Ok(Some(announce::config_prompt_message(
            "Greetings! I am Convoke, at your service. To tailor my duties to this channel, an \
             administrator may configure me using the button below.",
        )))
    }
}

#[cfg(test)]
mod tests {
    use convoke_core::domain::event::{ChannelId, UserId};

    use crate::commands::SlashCommandPayload;

    use super::{
        default_dispatcher, BlockActionEvent, DirectMessageEvent, EventContext, EventDispatcher,
        HandlerResult, MemberJoinedEvent, MentionEvent, SlackEnvelope, SlackEvent,
    };

    fn dispatcher_envelope(event: SlackEvent) -> SlackEnvelope {
        SlackEnvelope { envelope_id: "env-1".to_owned(), event }
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands() {
        let dispatcher = default_dispatcher();
        let envelope = dispatcher_envelope(SlackEvent::SlashCommand(SlashCommandPayload {
            command: "/convoke".to_owned(),
            text: "help".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1".to_owned(),
            request_id: "req-1".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert!(matches!(result, HandlerResult::Responded(_)));
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = dispatcher_envelope(SlackEvent::DirectMessage(DirectMessageEvent {
            channel_id: ChannelId("D1".to_owned()),
            user_id: UserId("U2".to_owned()),
            text: "hello".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        let dispatcher = default_dispatcher();
        assert_eq!(dispatcher.handler_count(), 6);
    }

    #[tokio::test]
    async fn dispatcher_routes_block_actions() {
        let dispatcher = default_dispatcher();
        let envelope = dispatcher_envelope(SlackEvent::BlockAction(BlockActionEvent {
            channel_id: ChannelId("C1".to_owned()),
            message_ts: "1730000000.6000".to_owned(),
            user_id: UserId("U6".to_owned()),
            action_id: "event.join.v1".to_owned(),
            value: Some("EVT-00C0FFEE".to_owned()),
            trigger_id: None,
            request_id: Some("req-block-1".to_owned()),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert!(matches!(result, HandlerResult::Responded(_)));
    }

    #[tokio::test]
    async fn mention_inquiries_get_a_threaded_reply_body() {
        let dispatcher = default_dispatcher();
        let envelope = dispatcher_envelope(SlackEvent::AppMention(MentionEvent {
            channel_id: ChannelId("C1".to_owned()),
            message_ts: "1730000000.1000".to_owned(),
            user_id: UserId("U3".to_owned()),
            text: "when is the next event?".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected an inquiry reply");
        };
        assert!(!message.fallback_text.is_empty());
    }

    #[tokio::test]
    async fn bot_joining_a_channel_prompts_for_configuration() {
        let dispatcher = default_dispatcher();
        let envelope = dispatcher_envelope(SlackEvent::MemberJoinedChannel(MemberJoinedEvent {
            channel_id: ChannelId("C9".to_owned()),
            user_id: UserId("U-BOT".to_owned()),
            is_self: true,
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a configuration prompt");
        };
        assert!(message.fallback_text.contains("configuration"));
    }

    #[tokio::test]
    async fn other_members_joining_are_processed_silently() {
        let dispatcher = default_dispatcher();
        let envelope = dispatcher_envelope(SlackEvent::MemberJoinedChannel(MemberJoinedEvent {
            channel_id: ChannelId("C9".to_owned()),
            user_id: UserId("U-HUMAN".to_owned()),
            is_self: false,
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
    }
}
