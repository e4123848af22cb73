//! Slack Web API implementation of the chat gateway. The typed block model
//! stays internal to the bot; this module maps it to Slack's wire shapes at
//! the boundary and funnels every call through one `ok`-checked POST.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use convoke_core::domain::event::{ChannelId, PostedMessage, UserId};
use convoke_slack::blocks::{Block, ButtonElement, MessageTemplate, TextObject};
use convoke_slack::gateway::{ChatGateway, GatewayError};

const API_BASE: &str = "https://slack.com/api";

pub struct SlackWebGateway {
    http: reqwest::Client,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<Value>,
    #[serde(default)]
    user: Option<Value>,
}

impl SlackWebGateway {
    pub fn new(bot_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), bot_token }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<ApiResponse, String> {
        let response = self
            .http
            .post(format!("{API_BASE}/{method}"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| error.to_string())?
            .json::<ApiResponse>()
            .await
            .map_err(|error| error.to_string())?;

        if response.ok {
            Ok(response)
        } else {
            Err(response.error.unwrap_or_else(|| "unknown_error".to_string()))
        }
    }

    async fn open_conversation(&self, users: &[UserId]) -> Result<String, String> {
        let joined = users.iter().map(|user| user.0.as_str()).collect::<Vec<_>>().join(",");
        let response = self.call("conversations.open", json!({ "users": joined })).await?;
        response
            .channel
            .as_ref()
            .and_then(|channel| channel.get("id"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| "conversations.open returned no channel id".to_string())
    }
}

fn text_json(text: &TextObject) -> Value {
    match text {
        TextObject::Plain { text } => json!({ "type": "plain_text", "text": text }),
        TextObject::Mrkdwn { text } => json!({ "type": "mrkdwn", "text": text }),
    }
}

fn button_json(button: &ButtonElement) -> Value {
    let mut value = json!({
        "type": "button",
        "action_id": button.action_id,
        "text": { "type": "plain_text", "text": plain_label(&button.text), "emoji": true },
    });
    if let Some(style) = &button.style {
        value["style"] = json!(match style {
            convoke_slack::blocks::ButtonStyle::Primary => "primary",
            convoke_slack::blocks::ButtonStyle::Danger => "danger",
        });
    }
    if let Some(payload) = &button.value {
        value["value"] = json!(payload);
    }
    if let Some(url) = &button.url {
        value["url"] = json!(url);
    }
    value
}

fn plain_label(text: &TextObject) -> &str {
    match text {
        TextObject::Plain { text } | TextObject::Mrkdwn { text } => text,
    }
}

pub fn block_json(block: &Block) -> Value {
    match block {
        Block::Header { block_id, text } => json!({
            "type": "header",
            "block_id": block_id,
            "text": { "type": "plain_text", "text": plain_label(text), "emoji": true },
        }),
        Block::Section { block_id, text } => json!({
            "type": "section",
            "block_id": block_id,
            "text": text_json(text),
        }),
        Block::Divider { block_id } => json!({ "type": "divider", "block_id": block_id }),
        Block::Actions { block_id, elements } => json!({
            "type": "actions",
            "block_id": block_id,
            "elements": elements.iter().map(button_json).collect::<Vec<_>>(),
        }),
        Block::Context { block_id, elements } => json!({
            "type": "context",
            "block_id": block_id,
            "elements": elements.iter().map(text_json).collect::<Vec<_>>(),
        }),
    }
}

fn blocks_json(message: &MessageTemplate) -> Vec<Value> {
    message.blocks.iter().map(block_json).collect()
}

#[async_trait]
impl ChatGateway for SlackWebGateway {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError> {
        let response = self
            .call(
                "chat.postMessage",
                json!({
                    "channel": channel.0,
                    "text": message.fallback_text,
                    "blocks": blocks_json(message),
                }),
            )
            .await
            .map_err(GatewayError::Post)?;

        let message_ts = response
            .ts
            .ok_or_else(|| GatewayError::Post("chat.postMessage returned no ts".to_string()))?;
        let channel_id = response
            .channel
            .as_ref()
            .and_then(Value::as_str)
            .map(|id| ChannelId(id.to_string()))
            .unwrap_or_else(|| channel.clone());

        Ok(PostedMessage { channel_id, message_ts })
    }

    async fn update_message(
        &self,
        location: &PostedMessage,
        message: &MessageTemplate,
    ) -> Result<(), GatewayError> {
        self.call(
            "chat.update",
            json!({
                "channel": location.channel_id.0,
                "ts": location.message_ts,
                "text": message.fallback_text,
                "blocks": blocks_json(message),
            }),
        )
        .await
        .map(|_| ())
        .map_err(GatewayError::Update)
    }

    async fn delete_message(&self, location: &PostedMessage) -> Result<(), GatewayError> {
        self.call(
            "chat.delete",
            json!({ "channel": location.channel_id.0, "ts": location.message_ts }),
        )
        .await
        .map(|_| ())
        .map_err(GatewayError::Delete)
    }

    async fn post_ephemeral(
        &self,
        channel: &ChannelId,
        user: &UserId,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.call(
            "chat.postEphemeral",
            json!({ "channel": channel.0, "user": user.0, "text": text }),
        )
        .await
        .map(|_| ())
        .map_err(GatewayError::Ephemeral)
    }

    async fn send_direct_message(&self, user: &UserId, text: &str) -> Result<(), GatewayError> {
        let channel = self
            .open_conversation(std::slice::from_ref(user))
            .await
            .map_err(GatewayError::DirectMessage)?;
        self.call("chat.postMessage", json!({ "channel": channel, "text": text }))
            .await
            .map(|_| ())
            .map_err(GatewayError::DirectMessage)
    }

    async fn send_group_message(&self, users: &[UserId], text: &str) -> Result<(), GatewayError> {
        let channel =
            self.open_conversation(users).await.map_err(GatewayError::DirectMessage)?;
        self.call("chat.postMessage", json!({ "channel": channel, "text": text }))
            .await
            .map(|_| ())
            .map_err(GatewayError::DirectMessage)
    }

    async fn user_email(&self, user: &UserId) -> Result<Option<String>, GatewayError> {
        let response = self
            .call("users.info", json!({ "user": user.0 }))
            .await
            .map_err(GatewayError::DirectMessage)?;

        Ok(response
            .user
            .as_ref()
            .and_then(|user| user.pointer("/profile/email"))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use convoke_slack::blocks::{Block, ButtonElement, ButtonStyle, TextObject};

    use super::block_json;

    #[test]
    fn section_blocks_serialize_with_slack_text_objects() {
        let value = block_json(&Block::Section {
            block_id: "event.announce.intro.v1".to_string(),
            text: TextObject::mrkdwn("*hello*"),
        });

        assert_eq!(value["type"], "section");
        assert_eq!(value["text"]["type"], "mrkdwn");
        assert_eq!(value["text"]["text"], "*hello*");
    }

    #[test]
    fn header_text_is_forced_to_plain_text() {
        let value = block_json(&Block::Header {
            block_id: "event.list.header.v1".to_string(),
            text: TextObject::plain("Forthcoming engagements"),
        });

        assert_eq!(value["type"], "header");
        assert_eq!(value["text"]["type"], "plain_text");
    }

    #[test]
    fn action_buttons_carry_type_style_and_value() {
        let value = block_json(&Block::Actions {
            block_id: "event.announce.actions.v1".to_string(),
            elements: vec![ButtonElement::new("event.join.v1", "Join Event")
                .style(ButtonStyle::Primary)
                .value("EVT-00C0FFEE")],
        });

        let button = &value["elements"][0];
        assert_eq!(button["type"], "button");
        assert_eq!(button["style"], "primary");
        assert_eq!(button["value"], "EVT-00C0FFEE");
        assert_eq!(button["text"]["type"], "plain_text");
    }

    #[test]
    fn marker_divider_keeps_its_block_id() {
        let value =
            block_json(&Block::Divider { block_id: "event-id::EVT-00C0FFEE".to_string() });
        assert_eq!(value["type"], "divider");
        assert_eq!(value["block_id"], "event-id::EVT-00C0FFEE");
    }
}
