//! Scheduling gate and reminder task. Both run off an external timer (the
//! bearer-guarded task endpoints) and walk due records independently: one
//! record's failure is logged and skipped, never blocking its siblings.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::{info, warn};

use convoke_core::domain::event::EventRecord;
use convoke_db::repositories::{ChannelConfigStore, EventStore};
use convoke_slack::announce;
use convoke_slack::gateway::ChatGateway;

use crate::forecast::ForecastService;
use crate::service::{roster_player_ids, EventService, ServiceError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DueScanReport {
    pub published: usize,
    pub skipped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub considered: usize,
    pub sent: usize,
}

impl EventService {
    /// Publish every due scheduled announcement. At-most-once: selection is
    /// keyed on `status = SCHEDULED`, and the record is re-checked under its
    /// lock before posting, so an already-activated record is never
    /// reprocessed.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<DueScanReport, ServiceError> {
        let due = self.events_store().find_due(now).await?;
        if due.is_empty() {
            info!(event_name = "scheduler.scan.empty", "no announcements are due");
            return Ok(DueScanReport::default());
        }

        let mut report = DueScanReport::default();
        for candidate in due {
            match self.publish_one(&candidate, now).await {
                Ok(true) => report.published += 1,
                Ok(false) => report.skipped += 1,
                Err(error) => {
                    warn!(
                        event_name = "scheduler.publish.failed",
                        event_id = %candidate.id,
                        error = %error,
                        "skipping due event after publish failure"
                    );
                    report.skipped += 1;
                }
            }
        }

        info!(
            event_name = "scheduler.scan.complete",
            published = report.published,
            skipped = report.skipped,
            "due-event scan finished"
        );
        Ok(report)
    }

    async fn publish_one(
        &self,
        candidate: &EventRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let Some(channel) = candidate.scheduled_channel_id.clone() else {
            warn!(
                event_name = "scheduler.publish.no_channel",
                event_id = %candidate.id,
                "scheduled event has no designated channel"
            );
            return Ok(false);
        };

        let Some(config) = self.channel_store().get(&channel).await? else {
            warn!(
                event_name = "scheduler.publish.no_channel_config",
                event_id = %candidate.id,
                channel_id = %channel,
                "channel configuration missing; skipping this record"
            );
            return Ok(false);
        };

        // Freshness check under the event's lock: a concurrent scan or a
        // deletion may have raced the selection query.
        let _guard = self.lock_event(&candidate.id).await;
        let mut event = match self.events_store().find_by_id(&candidate.id).await? {
            Some(event) if event.is_due(now) => event,
            _ => return Ok(false),
        };

        let message = announce::announcement_message(&event, Some(&config), None);
        let posted = self.gateway().post_message(&channel, &message).await?;
        event.activate(posted)?;
        self.persist(&event).await?;

        info!(
            event_name = "scheduler.publish.posted",
            event_id = %event.id,
            channel_id = %channel,
            "scheduled announcement published"
        );
        Ok(true)
    }

    /// Remind every enrolled player the day before their engagement. The
    /// reminder template comes from the channel configuration; the forecast
    /// is best-effort decoration.
    pub async fn send_reminders(
        &self,
        forecast: &dyn ForecastService,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<ReminderReport, ServiceError> {
        let today = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now);
        let tomorrow_start = today + Duration::days(1);
        let tomorrow_end = tomorrow_start + Duration::days(1);

        let upcoming = self.events_store().find_upcoming(today).await?;
        let tomorrow: Vec<EventRecord> = upcoming
            .into_iter()
            .filter(|event| {
                event.booking_full_date >= tomorrow_start && event.booking_full_date < tomorrow_end
            })
            .collect();

        let mut report = ReminderReport::default();
        for event in tomorrow {
            report.considered += 1;

            let Some(channel) = event.home_channel().cloned() else {
                warn!(
                    event_name = "scheduler.reminder.no_channel",
                    event_id = %event.id,
                    "event has no channel associated; skipping reminder"
                );
                continue;
            };

            let players = roster_player_ids(&event);
            if players.is_empty() {
                info!(
                    event_name = "scheduler.reminder.no_players",
                    event_id = %event.id,
                    "event for tomorrow has no players; skipping reminder"
                );
                continue;
            }

            let config = self.channel_store().get(&channel).await?;
            let template = config
                .as_ref()
                .map(|config| config.reminder_template().to_string())
                .unwrap_or_else(|| {
                    convoke_core::domain::channel::DEFAULT_REMINDER_TEMPLATE.to_string()
                });

            let weather = forecast.forecast(event.booking_full_date).await;
            let text = template
                .replace("{event_title}", &format!("*{}*", event.title))
                .replace("{event_time}", &format!("*{}*", event.booking_time))
                .replace("{weather}", &weather);

            if dry_run {
                info!(
                    event_name = "scheduler.reminder.dry_run",
                    event_id = %event.id,
                    recipients = players.len(),
                    reminder = %text,
                    "dry run; reminder not sent"
                );
                continue;
            }

            let delivery = if players.len() > 1 {
                self.gateway().send_group_message(&players, &text).await
            } else {
                self.gateway().send_direct_message(&players[0], &text).await
            };

            match delivery {
                Ok(()) => {
                    report.sent += 1;
                    info!(
                        event_name = "scheduler.reminder.sent",
                        event_id = %event.id,
                        recipients = players.len(),
                        "reminder delivered"
                    );
                }
                Err(error) => warn!(
                    event_name = "scheduler.reminder.failed",
                    event_id = %event.id,
                    error = %error,
                    "reminder delivery failed; continuing with remaining events"
                ),
            }
        }

        Ok(report)
    }
}
