//! HTTP surface for the external timer and the calendar authorization
//! callback. The task endpoints are bearer-token guarded; the token comes
//! from `server.admin_token`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, info};

use convoke_core::domain::calendar::CalendarTokens;
use convoke_core::domain::event::UserId;
use convoke_db::repositories::CalendarTokenStore;

use crate::calendar::CalendarService;
use crate::forecast::ForecastService;
use crate::service::EventService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EventService>,
    pub forecast: Arc<dyn ForecastService>,
    pub calendar: Arc<dyn CalendarService>,
    pub tokens: Arc<dyn CalendarTokenStore>,
    pub admin_token: SecretString,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tasks/post-scheduled", post(post_scheduled))
        .route("/tasks/send-reminders", post(send_reminders))
        .route("/oauth/google/callback", get(oauth_callback))
        .with_state(state)
}

fn authorized(headers: &HeaderMap, admin_token: &SecretString) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == admin_token.expose_secret())
        .unwrap_or(false)
}

async fn post_scheduled(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    if !authorized(&headers, &state.admin_token) {
        return (StatusCode::FORBIDDEN, "Forbidden".to_string());
    }

    info!(event_name = "tasks.post_scheduled.requested", "due-event scan requested");
    match state.service.publish_due(Utc::now()).await {
        Ok(report) if report.published == 0 && report.skipped == 0 => {
            (StatusCode::OK, "No events to post.".to_string())
        }
        Ok(report) => (StatusCode::OK, format!("Posted {} event(s).", report.published)),
        Err(service_error) => {
            error!(
                event_name = "tasks.post_scheduled.failed",
                error = %service_error,
                "due-event scan failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "An error occurred.".to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReminderParams {
    #[serde(default)]
    dry_run: bool,
}

async fn send_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReminderParams>,
) -> (StatusCode, String) {
    if !authorized(&headers, &state.admin_token) {
        return (StatusCode::FORBIDDEN, "Forbidden".to_string());
    }

    info!(
        event_name = "tasks.send_reminders.requested",
        dry_run = params.dry_run,
        "reminder sweep requested"
    );
    match state.service.send_reminders(state.forecast.as_ref(), Utc::now(), params.dry_run).await {
        Ok(_) if params.dry_run => (StatusCode::OK, "Dry run completed.".to_string()),
        Ok(report) => (StatusCode::OK, format!("Sent {} reminder(s).", report.sent)),
        Err(service_error) => {
            error!(
                event_name = "tasks.send_reminders.failed",
                error = %service_error,
                "reminder sweep failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing reminders.".to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthCallbackParams {
    code: String,
    /// The platform user id, threaded through the authorization flow.
    state: String,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> (StatusCode, String) {
    let user = UserId(params.state.clone());

    let exchanged = match state.calendar.exchange_code(&params.code).await {
        Ok(exchanged) => exchanged,
        Err(calendar_error) => {
            error!(
                event_name = "oauth.exchange_failed",
                user_id = %user,
                error = %calendar_error,
                "authorization code exchange failed"
            );
            return (
                StatusCode::BAD_GATEWAY,
                "Authorization failed. Please try connecting again.".to_string(),
            );
        }
    };

    let tokens = CalendarTokens {
        user_id: user.clone(),
        access_token: exchanged.access_token,
        refresh_token: exchanged.refresh_token,
        updated_at: Utc::now(),
    };
    if let Err(store_error) = state.tokens.set(tokens).await {
        error!(
            event_name = "oauth.token_store_failed",
            user_id = %user,
            error = %store_error,
            "authorized tokens could not be persisted"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authorization succeeded but could not be saved. Please try again.".to_string(),
        );
    }

    info!(event_name = "oauth.authorized", user_id = %user, "calendar access granted");
    (
        StatusCode::OK,
        "Success! Your calendar is connected. You may close this window and return to Slack."
            .to_string(),
    )
}
