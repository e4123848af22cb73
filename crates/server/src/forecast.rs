//! Weather forecast collaborator (Open-Meteo). Strictly best-effort: any
//! failure, malformed payload, or out-of-range date resolves to a fallback
//! phrase so reminder composition never fails on weather.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use convoke_core::config::ForecastConfig;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub const FALLBACK_TOO_DISTANT: &str =
    "The date is too distant for a reliable meteorological report.";
pub const FALLBACK_UNAVAILABLE: &str =
    "My sincerest apologies, I am unable to consult the almanac at this present time.";

#[async_trait]
pub trait ForecastService: Send + Sync {
    /// A human-readable forecast sentence for the given date. Never fails.
    async fn forecast(&self, date: DateTime<Utc>) -> String;
}

/// Fixed-answer forecast for tests and dry runs.
pub struct StaticForecast {
    answer: String,
}

impl StaticForecast {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into() }
    }
}

#[async_trait]
impl ForecastService for StaticForecast {
    async fn forecast(&self, _date: DateTime<Utc>) -> String {
        self.answer.clone()
    }
}

pub struct OpenMeteoForecast {
    http: reqwest::Client,
    config: ForecastConfig,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailySeries,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    weathercode: Vec<i64>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

impl OpenMeteoForecast {
    pub fn new(config: ForecastConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }

    async fn fetch(&self, date: DateTime<Utc>) -> Result<DailyResponse, reqwest::Error> {
        let formatted = date.format("%Y-%m-%d").to_string();
        self.http
            .get(OPEN_METEO_URL)
            .query(&[
                ("latitude", self.config.latitude.to_string()),
                ("longitude", self.config.longitude.to_string()),
                ("daily", "weathercode,temperature_2m_max,temperature_2m_min".to_string()),
                ("timezone", self.config.timezone.clone()),
                ("start_date", formatted.clone()),
                ("end_date", formatted),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<DailyResponse>()
            .await
    }
}

#[async_trait]
impl ForecastService for OpenMeteoForecast {
    async fn forecast(&self, date: DateTime<Utc>) -> String {
        if days_out(Utc::now(), date).filter(|days| *days <= self.config.max_days_ahead).is_none()
        {
            return FALLBACK_TOO_DISTANT.to_string();
        }

        match self.fetch(date).await {
            Ok(response) => compose_forecast(&response.daily)
                .unwrap_or_else(|| FALLBACK_UNAVAILABLE.to_string()),
            Err(error) => {
                warn!(
                    event_name = "forecast.fetch_failed",
                    error = %error,
                    "weather lookup failed; using fallback phrase"
                );
                FALLBACK_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Whole days between now and the requested date; `None` for dates in the
/// past.
fn days_out(now: DateTime<Utc>, date: DateTime<Utc>) -> Option<i64> {
    let days = date.date_naive().signed_duration_since(now.date_naive()).num_days();
    (days >= 0).then_some(days)
}

fn compose_forecast(daily: &DailySeries) -> Option<String> {
    let code = *daily.weathercode.first()?;
    let max_temp = daily.temperature_2m_max.first()?.round();
    let min_temp = daily.temperature_2m_min.first()?.round();

    Some(format!(
        "The forecast anticipates {}, with temperatures ranging from a low of {min_temp}°C to a \
         high of {max_temp}°C.",
        describe_weather_code(code)
    ))
}

fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "perfectly clear skies",
        1 => "mainly clear skies",
        2 => "a pleasant smattering of clouds",
        3 => "a mostly clouded canopy",
        45 => "the possibility of fog",
        48 => "depositing rime fog",
        51 => "a light drizzle",
        53 => "a moderate drizzle",
        55 => "a dense drizzle",
        56 => "light, freezing drizzle",
        57 => "dense, freezing drizzle",
        61 => "a slight prospect of rain",
        63 => "a moderate prospect of rain",
        65 => "a heavy prospect of rain",
        66 => "light, freezing rain",
        67 => "heavy, freezing rain",
        71 => "a light flurry of snow",
        73 => "a moderate flurry of snow",
        75 => "a heavy flurry of snow",
        77 => "snow grains",
        80 => "slight rain showers",
        81 => "moderate rain showers",
        82 => "violent rain showers",
        85 => "slight snow showers",
        86 => "heavy snow showers",
        95 => "the dramatic possibility of a thunderstorm",
        96 => "a thunderstorm with slight hail",
        99 => "a thunderstorm with heavy hail",
        _ => "somewhat uncertain conditions",
    }
}
