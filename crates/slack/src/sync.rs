//! Multi-message synchronizer: re-renders an event once and pushes the
//! result to every ledger location independently. A failed location is
//! logged and skipped; there is no rollback. The ledger itself is never
//! modified here, and the triggering transition is already persisted by the
//! time a resync runs.

use tracing::warn;

use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::{EventRecord, PostedMessage};

use crate::announce;
use crate::gateway::{ChatGateway, GatewayError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResyncFailure {
    pub location: PostedMessage,
    pub error: GatewayError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub attempted: usize,
    pub updated: usize,
    pub failures: Vec<ResyncFailure>,
}

pub async fn resync(
    event: &EventRecord,
    channel_config: Option<&ChannelConfig>,
    gateway: &dyn ChatGateway,
) -> ResyncReport {
    let message = announce::announcement_message(event, channel_config, None);
    let mut report = ResyncReport::default();

    for location in &event.posted_messages {
        report.attempted += 1;
        match gateway.update_message(location, &message).await {
            Ok(()) => report.updated += 1,
            Err(error) => {
                warn!(
                    event_name = "egress.slack.resync_location_failed",
                    event_id = %event.id,
                    channel_id = %location.channel_id,
                    message_ts = %location.message_ts,
                    error = %error,
                    "announcement update failed for one location; continuing"
                );
                report.failures.push(ResyncFailure { location: location.clone(), error });
            }
        }
    }

    report
}
