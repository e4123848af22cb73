//! Bridges the Slack-facing service traits onto the event service.
//! Validation failures render their plain-language notices and are never
//! logged as system failures; collaborator failures are logged with the
//! event id and surfaced as a generic apology.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use convoke_core::domain::event::{ChannelId, EventId, UserId};
use convoke_core::transitions::JoinOutcome;
use convoke_db::repositories::ChannelConfigStore;
use convoke_slack::announce;
use convoke_slack::blocks::{MessageBuilder, MessageTemplate};
use convoke_slack::commands::{CommandEnvelope, CommandRouteError, EventCommandService, RosterSpec};
use convoke_slack::events::{
    BlockActionEvent, BlockActionService, ChannelJoinService, EventContext, EventHandlerError,
    InquiryService, IntentService, MemberJoinedEvent, ViewIntent, ViewSubmissionEvent,
};

use crate::calendar::{CalendarError, CalendarService};
use crate::service::{EventService, ServiceError};

#[derive(Clone)]
pub struct ServiceHandlers {
    service: Arc<EventService>,
    calendar: Arc<dyn CalendarService>,
}

fn notice(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section("event.notice.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

impl ServiceHandlers {
    pub fn new(service: Arc<EventService>, calendar: Arc<dyn CalendarService>) -> Self {
        Self { service, calendar }
    }

    /// Render a failure for the triggering user. Store and gateway failures
    /// get logged here; validation failures already carry their notice.
    fn failure_notice(&self, operation: &str, error: &ServiceError) -> MessageTemplate {
        if matches!(error, ServiceError::Store(_) | ServiceError::Gateway(_)) {
            error!(
                event_name = "handler.collaborator_failure",
                operation,
                error = %error,
                "collaborator failure surfaced to user as apology"
            );
        }
        notice(error.user_notice())
    }

    async fn join_and_describe(
        &self,
        event_id: &EventId,
        user: &UserId,
        roster_id: Option<&convoke_core::domain::event::RosterId>,
        guest_count: u32,
    ) -> MessageTemplate {
        match self.service.join(event_id, user, roster_id, guest_count).await {
            Ok(JoinOutcome::Admitted { roster_name, guest_count, .. }) => {
                let suffix = match guest_count {
                    0 => ".".to_string(),
                    1 => " with one guest.".to_string(),
                    n => format!(" with {n} guests."),
                };
                notice(format!(
                    "Excellent. I have added you to the roster for *{roster_name}*{suffix}"
                ))
            }
            Ok(JoinOutcome::Standby) => notice(
                "All positions for this event are currently filled. I have added you to the \
                 standby list.",
            ),
            Err(ServiceError::Domain(convoke_core::errors::DomainError::NoRosterSelected)) => {
                match self.service.get_event(event_id).await {
                    Ok(event) => announce::roster_selection_message(&event),
                    Err(error) => self.failure_notice("join", &error),
                }
            }
            Err(error) => self.failure_notice("join", &error),
        }
    }
}

#[async_trait]
impl EventCommandService for ServiceHandlers {
    async fn create_event(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let channel = ChannelId(envelope.channel_id.clone());
        match self.service.channel_store().get(&channel).await {
            Ok(Some(_)) => Ok(notice(
                "I have opened the event creation form. Submit it to proclaim the engagement.",
            )),
            Ok(None) => Ok(announce::config_prompt_message(
                "Before I can arrange engagements here, I require a brief moment of your time \
                 to set my duties in order.",
            )),
            Err(error) => Ok(self.failure_notice("create", &ServiceError::Store(error))),
        }
    }

    async fn leave_event(
        &self,
        event_id: Option<EventId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let user = UserId(envelope.user_id.clone());

        let Some(event_id) = event_id else {
            return Ok(match self.service.my_events(&user).await {
                Ok(events) if events.is_empty() => notice(
                    "It appears you are not currently signed up for any upcoming events.",
                ),
                Ok(events) => {
                    let mut message = announce::my_events_message(&events, &user);
                    message.fallback_text =
                        "Specify which engagement to withdraw from.".to_string();
                    message
                }
                Err(error) => self.failure_notice("leave", &error),
            });
        };

        Ok(match self.service.leave(&event_id, &user).await {
            Ok((event, _outcome)) => {
                notice(format!("Very good. I have removed you from the event: *{}*.", event.title))
            }
            Err(error) => self.failure_notice("leave", &error),
        })
    }

    async fn list_events(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.service.list_upcoming().await {
            Ok(events) if events.is_empty() => {
                notice("My ledger is presently clear of any future engagements.")
            }
            Ok(events) => announce::upcoming_events_message(&events),
            Err(error) => self.failure_notice("list", &error),
        })
    }

    async fn next_event(
        &self,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.service.next_event().await {
            Ok(Some(event)) => announce::next_event_message(&event),
            Ok(None) => notice("It appears my ledger shows no upcoming engagements."),
            Err(error) => self.failure_notice("next", &error),
        })
    }

    async fn my_events(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let user = UserId(envelope.user_id.clone());
        Ok(match self.service.my_events(&user).await {
            Ok(events) if events.is_empty() => notice(
                "Your schedule is presently clear. You have not signed up for any upcoming \
                 events.",
            ),
            Ok(events) => announce::my_events_message(&events, &user),
            Err(error) => self.failure_notice("mine", &error),
        })
    }

    async fn share_event(
        &self,
        event_id: Option<EventId>,
        channel: Option<ChannelId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let (Some(event_id), Some(channel)) = (event_id, channel) else {
            return Ok(notice("Usage: `/convoke share EVT-ID #channel`"));
        };

        let actor = UserId(envelope.user_id.clone());
        Ok(match self.service.share(&event_id, &actor, &channel).await {
            Ok(_) => notice(format!(
                "Very good. The proclamation has been duly shared in <#{channel}>."
            )),
            Err(error) => self.failure_notice("share", &error),
        })
    }

    async fn add_roster(
        &self,
        event_id: Option<EventId>,
        spec: Option<RosterSpec>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let (Some(event_id), Some(spec)) = (event_id, spec) else {
            return Ok(notice("Usage: `/convoke add-roster EVT-ID <capacity> [+guests] <name>`"));
        };

        let actor = UserId(envelope.user_id.clone());
        Ok(match self
            .service
            .add_roster(&event_id, &actor, &spec.name, spec.capacity, spec.allow_guests)
            .await
        {
            Ok(event) => notice(format!(
                "As you wish. I have added the roster *{}* to the event *{}*.",
                spec.name, event.title
            )),
            Err(error) => self.failure_notice("add-roster", &error),
        })
    }

    async fn remove_roster(
        &self,
        event_id: Option<EventId>,
        roster_name: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let Some(event_id) = event_id else {
            return Ok(notice("Usage: `/convoke remove-roster EVT-ID <full roster name>`"));
        };
        if roster_name.trim().is_empty() {
            return Ok(notice("Usage: `/convoke remove-roster EVT-ID <full roster name>`"));
        }

        let actor = UserId(envelope.user_id.clone());
        Ok(match self.service.remove_roster(&event_id, &actor, &roster_name).await {
            Ok(removed) => {
                notice(format!("As you wish. I have removed the roster *{}*.", removed.name))
            }
            Err(error) => self.failure_notice("remove-roster", &error),
        })
    }

    async fn delete_event(
        &self,
        event_id: Option<EventId>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let Some(event_id) = event_id else {
            return Ok(notice("Usage: `/convoke delete EVT-ID`"));
        };

        let actor = UserId(envelope.user_id.clone());
        Ok(match self.service.delete(&event_id, &actor).await {
            Ok(event) => notice(format!(
                "The event *{}* and its announcements have been expunged from the record.",
                event.title
            )),
            Err(error) => self.failure_notice("delete", &error),
        })
    }

    async fn calendar_login(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let user = UserId(envelope.user_id.clone());
        let auth_url = self.calendar.auth_url(&user);
        if auth_url.is_empty() {
            return Ok(notice("Calendar integration is not enabled on this installation."));
        }
        Ok(announce::calendar_connect_message(&auth_url))
    }
}

#[async_trait]
impl BlockActionService for ServiceHandlers {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let event_id = event
            .value
            .as_deref()
            .and_then(convoke_slack::commands::parse_event_id_token);

        match event.action_id.as_str() {
            announce::JOIN_ACTION_ID => {
                let Some(event_id) = event_id else {
                    return Ok(Some(notice(
                        "I could not determine which event this button belongs to.",
                    )));
                };
                Ok(Some(self.join_and_describe(&event_id, &event.user_id, None, 0).await))
            }
            announce::ADD_TO_CALENDAR_ACTION_ID => {
                let Some(event_id) = event_id else {
                    return Ok(Some(notice(
                        "I could not determine which event this button belongs to.",
                    )));
                };

                let record = match self.service.get_event(&event_id).await {
                    Ok(record) => record,
                    Err(error) => return Ok(Some(self.failure_notice("calendar", &error))),
                };
                if !record.contains_user(&event.user_id) {
                    return Ok(Some(notice(
                        "You must first join the event using the 'Join Event' button before \
                         adding it to your calendar.",
                    )));
                }

                Ok(Some(match self.calendar.create_event(&event.user_id, &record).await {
                    Ok(reference) => match reference.html_link {
                        Some(link) => notice(format!(
                            "Very good. I have added *<{link}|{}>* to your calendar.",
                            record.title
                        )),
                        None => {
                            notice(format!("Very good. I have added *{}* to your calendar.", record.title))
                        }
                    },
                    Err(CalendarError::NotAuthorized) => {
                        announce::calendar_connect_message(&self.calendar.auth_url(&event.user_id))
                    }
                    Err(CalendarError::Disabled) => {
                        notice("Calendar integration is not enabled on this installation.")
                    }
                    Err(CalendarError::Api(detail)) => {
                        error!(
                            event_name = "handler.calendar_failure",
                            event_id = %event_id,
                            error = %detail,
                            "calendar event creation failed"
                        );
                        notice("My apologies, I encountered an error creating the calendar event.")
                    }
                }))
            }
            announce::CONFIGURE_CHANNEL_ACTION_ID => Ok(Some(notice(
                "I have opened the channel configuration form. Submit it to set my duties.",
            ))),
            other => Ok(Some(convoke_slack::blocks::error_message(
                &format!("Unknown interactive action `{other}`."),
                event.request_id.as_deref().unwrap_or(&ctx.correlation_id),
            ))),
        }
    }
}

#[async_trait]
impl IntentService for ServiceHandlers {
    async fn handle_intent(
        &self,
        event: &ViewSubmissionEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        match &event.intent {
            ViewIntent::JoinRoster { event_id, roster_id, guest_count } => Ok(Some(
                self.join_and_describe(event_id, &event.user_id, roster_id.as_ref(), *guest_count)
                    .await,
            )),
            ViewIntent::CreateEvent(request) => {
                Ok(Some(match self.service.create_event(request.clone(), &event.user_id).await {
                    Ok(outcome) if outcome.scheduled => {
                        let post_at = outcome
                            .event
                            .post_at
                            .map(|instant| instant.to_rfc3339())
                            .unwrap_or_else(|| "soon".to_string());
                        notice(format!(
                            "Very good. I have scheduled the announcement for *{}* to be posted \
                             at {post_at}.",
                            outcome.event.title
                        ))
                    }
                    Ok(outcome) => notice(format!(
                        "The event *{}* has been proclaimed. Its ID is `{}`.",
                        outcome.event.title, outcome.event.id
                    )),
                    Err(error) => self.failure_notice("create", &error),
                }))
            }
            ViewIntent::ConfigureChannel(request) => {
                Ok(Some(match self.service.configure_channel(request.clone(), &event.user_id).await
                {
                    Ok(config) => notice(format!(
                        "My duties for <#{}> have been set. I am now at your service.",
                        config.channel_id
                    )),
                    Err(error) => self.failure_notice("configure", &error),
                }))
            }
        }
    }
}

#[async_trait]
impl InquiryService for ServiceHandlers {
    async fn answer(
        &self,
        text: &str,
        user: &UserId,
        _ctx: &EventContext,
    ) -> Result<String, EventHandlerError> {
        match self.service.inquiry_answer(text, user).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                error!(
                    event_name = "handler.inquiry_failure",
                    error = %error,
                    "inquiry lookup failed"
                );
                Ok("My apologies, a complication arose while consulting my archives.".to_string())
            }
        }
    }
}

#[async_trait]
impl ChannelJoinService for ServiceHandlers {
    async fn channel_greeting(
        &self,
        event: &MemberJoinedEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        if !event.is_self {
            return Ok(None);
        }

        Ok(Some(announce::config_prompt_message(
            "Greetings! I am Convoke, at your service. To tailor my duties to this channel's \
             specific needs, an administrator may configure me using the button below.",
        )))
    }
}
