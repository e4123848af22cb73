//! Calendar collaborator (Google Calendar). The engine only needs three
//! things from it: an authorization URL to send unauthorized users to, a
//! code-exchange step for the OAuth callback, and event insertion for
//! authorized users. Lack of authorization is a distinct error so callers
//! can route the user into the authorization flow instead of apologizing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use convoke_core::domain::calendar::CalendarTokens;
use convoke_core::domain::event::{EventRecord, UserId};
use convoke_db::repositories::CalendarTokenStore;

use crate::service::all_participants;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const EVENTS_ENDPOINT: &str =
    "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("user has not authorized calendar access")]
    NotAuthorized,
    #[error("calendar integration is disabled")]
    Disabled,
    #[error("calendar api failure: {0}")]
    Api(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEventRef {
    pub id: String,
    pub html_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExchangedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    fn auth_url(&self, user: &UserId) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ExchangedTokens, CalendarError>;

    async fn create_event(
        &self,
        user: &UserId,
        event: &EventRecord,
    ) -> Result<CalendarEventRef, CalendarError>;
}

/// Stand-in used when `calendar.enabled` is false.
pub struct DisabledCalendarService;

#[async_trait]
impl CalendarService for DisabledCalendarService {
    fn auth_url(&self, _user: &UserId) -> String {
        String::new()
    }

    async fn exchange_code(&self, _code: &str) -> Result<ExchangedTokens, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn create_event(
        &self,
        _user: &UserId,
        _event: &EventRecord,
    ) -> Result<CalendarEventRef, CalendarError> {
        Err(CalendarError::Disabled)
    }
}

pub struct GoogleCalendar {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    tokens: Arc<dyn CalendarTokenStore>,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshedTokens {
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
        tokens: Arc<dyn CalendarTokenStore>,
    ) -> Self {
        Self { http: reqwest::Client::new(), client_id, client_secret, redirect_uri, tokens }
    }

    async fn refresh_access_token(
        &self,
        stored: &CalendarTokens,
    ) -> Result<CalendarTokens, CalendarError> {
        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            return Err(CalendarError::NotAuthorized);
        };

        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .error_for_status()
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .json::<RefreshedTokens>()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))?;

        let refreshed = CalendarTokens {
            user_id: stored.user_id.clone(),
            access_token: response.access_token,
            refresh_token: stored.refresh_token.clone(),
            updated_at: Utc::now(),
        };
        if let Err(error) = self.tokens.set(refreshed.clone()).await {
            warn!(
                event_name = "calendar.token_refresh.store_failed",
                user_id = %refreshed.user_id,
                error = %error,
                "refreshed token could not be persisted; continuing with it in memory"
            );
        }
        Ok(refreshed)
    }

    async fn insert_event(
        &self,
        access_token: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::Response, CalendarError> {
        self.http
            .post(EVENTS_ENDPOINT)
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    fn auth_url(&self, user: &UserId) -> String {
        let url = reqwest::Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                // The platform user id rides through the flow as state.
                ("state", user.0.as_str()),
            ],
        );
        match url {
            Ok(url) => url.to_string(),
            Err(_) => AUTH_ENDPOINT.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<ExchangedTokens, CalendarError> {
        self.http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .error_for_status()
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .json::<ExchangedTokens>()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))
    }

    async fn create_event(
        &self,
        user: &UserId,
        event: &EventRecord,
    ) -> Result<CalendarEventRef, CalendarError> {
        let stored = self
            .tokens
            .get(user)
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .ok_or(CalendarError::NotAuthorized)?;

        let payload = event_payload(event);

        let response = self.insert_event(&stored.access_token, &payload).await?;
        let response = if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let refreshed = self.refresh_access_token(&stored).await?;
            self.insert_event(&refreshed.access_token, &payload).await?
        } else {
            response
        };

        let inserted = response
            .error_for_status()
            .map_err(|error| CalendarError::Api(error.to_string()))?
            .json::<InsertedEvent>()
            .await
            .map_err(|error| CalendarError::Api(error.to_string()))?;

        Ok(CalendarEventRef { id: inserted.id, html_link: inserted.html_link })
    }
}

/// The insert body for a calendar event: a fixed 90-minute engagement with
/// every participant (rosters and standby) that has a stored address.
fn event_payload(event: &EventRecord) -> serde_json::Value {
    let start = event.booking_full_date;
    let end = start + Duration::minutes(90);

    let attendees: Vec<serde_json::Value> = all_participants(event)
        .into_iter()
        .filter_map(|participant| participant.email)
        .map(|email| json!({ "email": email }))
        .collect();

    json!({
        "summary": event.title,
        "location": event.location,
        "description": event
            .description
            .clone()
            .unwrap_or_else(|| "An engagement arranged by Convoke.".to_string()),
        "start": { "dateTime": start.to_rfc3339(), "timeZone": "UTC" },
        "end": { "dateTime": end.to_rfc3339(), "timeZone": "UTC" },
        "attendees": attendees,
        "reminders": {
            "useDefault": false,
            "overrides": [
                { "method": "email", "minutes": 24 * 60 },
                { "method": "popup", "minutes": 60 },
            ],
        },
    })
}
