use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use convoke_core::config::{AppConfig, ConfigError, LoadOptions};
use convoke_db::repositories::{
    CalendarTokenStore, SqlCalendarTokenStore, SqlChannelConfigStore, SqlEventStore,
    SqlProfileStore,
};
use convoke_db::{connect_with_settings, migrations, DbPool};
use convoke_slack::events::{
    BlockActionHandler, ChannelJoinHandler, DirectMessageHandler, EventDispatcher, MentionHandler,
    SlashCommandHandler, ViewSubmissionHandler,
};
use convoke_slack::socket::SocketModeRunner;

use crate::calendar::{CalendarService, DisabledCalendarService, GoogleCalendar};
use crate::forecast::{ForecastService, OpenMeteoForecast};
use crate::handlers::ServiceHandlers;
use crate::routes::AppState;
use crate::service::EventService;
use crate::slack_api::SlackWebGateway;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<EventService>,
    pub state: AppState,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let events = Arc::new(SqlEventStore::new(db_pool.clone()));
    let channels = Arc::new(SqlChannelConfigStore::new(db_pool.clone()));
    let profiles = Arc::new(SqlProfileStore::new(db_pool.clone()));
    let tokens: Arc<dyn CalendarTokenStore> =
        Arc::new(SqlCalendarTokenStore::new(db_pool.clone()));

    let gateway = Arc::new(SlackWebGateway::new(config.slack.bot_token.clone()));
    let service = Arc::new(EventService::new(events, channels, profiles, gateway));

    let calendar: Arc<dyn CalendarService> = if config.calendar.enabled {
        Arc::new(GoogleCalendar::new(
            config.calendar.client_id.clone().unwrap_or_default(),
            config
                .calendar
                .client_secret
                .clone()
                .unwrap_or_else(|| String::new().into()),
            config.calendar.redirect_uri.clone().unwrap_or_default(),
            tokens.clone(),
        ))
    } else {
        Arc::new(DisabledCalendarService)
    };
    let forecast: Arc<dyn ForecastService> =
        Arc::new(OpenMeteoForecast::new(config.forecast.clone()));

    let handlers = ServiceHandlers::new(service.clone(), calendar.clone());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(handlers.clone()));
    dispatcher.register(BlockActionHandler::new(handlers.clone()));
    dispatcher.register(ViewSubmissionHandler::new(handlers.clone()));
    dispatcher.register(MentionHandler::new(handlers.clone()));
    dispatcher.register(DirectMessageHandler::new(handlers.clone()));
    dispatcher.register(ChannelJoinHandler::new(handlers));

    let state = AppState {
        service: service.clone(),
        forecast,
        calendar,
        tokens,
        admin_token: config.server.admin_token.clone(),
    };

    Ok(Application {
        config,
        db_pool,
        service,
        state,
        slack_runner: SocketModeRunner::with_dispatcher(dispatcher),
    })
}

#[cfg(test)]
mod tests {
    use convoke_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_app_token: Some("xapp-test".to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                admin_token: Some("cron-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                admin_token: Some("cron-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_service() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('events', 'channel_configs', 'event_profiles', 'calendar_tokens')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables to be available after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose the document tables");

        assert!(app.slack_runner.is_noop_transport());
        assert!(
            app.service.next_event().await.expect("query works").is_none(),
            "fresh database has no events"
        );

        app.db_pool.close().await;
    }
}
