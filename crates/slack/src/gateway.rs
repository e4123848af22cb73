use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use convoke_core::domain::event::{ChannelId, PostedMessage, UserId};

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("message post failed: {0}")]
    Post(String),
    #[error("message update failed: {0}")]
    Update(String),
    #[error("message delete failed: {0}")]
    Delete(String),
    #[error("ephemeral notice failed: {0}")]
    Ephemeral(String),
    #[error("direct message failed: {0}")]
    DirectMessage(String),
}

/// The chat platform as the engine sees it: post, update, and delete
/// announcement copies plus sender-only notices and direct messages. Each
/// call is an independent short operation.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError>;

    async fn update_message(
        &self,
        location: &PostedMessage,
        message: &MessageTemplate,
    ) -> Result<(), GatewayError>;

    async fn delete_message(&self, location: &PostedMessage) -> Result<(), GatewayError>;

    async fn post_ephemeral(
        &self,
        channel: &ChannelId,
        user: &UserId,
        text: &str,
    ) -> Result<(), GatewayError>;

    async fn send_direct_message(&self, user: &UserId, text: &str) -> Result<(), GatewayError>;

    /// One group conversation to every listed user; used by reminders.
    async fn send_group_message(
        &self,
        users: &[UserId],
        text: &str,
    ) -> Result<(), GatewayError>;

    /// Profile lookup for the contact address stored on participants.
    /// Best-effort; `None` when the platform exposes no address.
    async fn user_email(&self, user: &UserId) -> Result<Option<String>, GatewayError>;
}

/// Discards everything and fabricates monotonically increasing timestamps,
/// keeping full flows runnable without a Slack connection.
#[derive(Default)]
pub struct NoopChatGateway {
    next_ts: AtomicU64,
}

#[async_trait]
impl ChatGateway for NoopChatGateway {
    async fn post_message(
        &self,
        channel: &ChannelId,
        _message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError> {
        let sequence = self.next_ts.fetch_add(1, Ordering::Relaxed);
        Ok(PostedMessage {
            channel_id: channel.clone(),
            message_ts: format!("0.{sequence:06}"),
        })
    }

    async fn update_message(
        &self,
        _location: &PostedMessage,
        _message: &MessageTemplate,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_message(&self, _location: &PostedMessage) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        _channel: &ChannelId,
        _user: &UserId,
        _text: &str,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn send_direct_message(&self, _user: &UserId, _text: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn send_group_message(
        &self,
        _users: &[UserId],
        _text: &str,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn user_email(&self, _user: &UserId) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
}
