//! OpenWeatherMap current-weather client.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Weather client errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("unsupported unit system `{0}` (expected C, F or K)")]
    UnsupportedUnit(String),

    #[error("unsupported language code `{0}`")]
    UnsupportedLanguage(String),

    #[error("missing API key")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Unit system as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    /// Celsius, m/s
    Metric,
    /// Fahrenheit, miles/hour
    Imperial,
    /// Kelvin, m/s
    Standard,
}

impl UnitSystem {
    /// Value of the `units` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
            UnitSystem::Standard => "standard",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(UnitSystem::Metric),
            "F" => Ok(UnitSystem::Imperial),
            "K" => Ok(UnitSystem::Standard),
            _ => Err(WeatherError::UnsupportedUnit(s.to_string())),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

/// Accepts `xx` or `xx_YY` language codes, as the provider does.
fn validate_lang(lang: &str) -> Result<String, WeatherError> {
    let lang = lang.trim();
    let mut parts = lang.split('_');
    let base_ok = parts
        .next()
        .is_some_and(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_alphabetic()));
    let region_ok = match (parts.next(), parts.next()) {
        (None, None) => true,
        (Some(r), None) => r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic()),
        _ => false,
    };
    if base_ok && region_ok {
        Ok(lang.to_ascii_lowercase())
    } else {
        Err(WeatherError::UnsupportedLanguage(lang.to_string()))
    }
}

/// Current conditions for one place, as fetched in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// Provider wind speed (m/s for metric and standard units)
    pub wind_speed: f64,
    pub wind_deg: f64,
}

/// Source of current weather data.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_by_name(&self, place: &str) -> Result<WeatherSnapshot, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: MainSection,
    #[serde(default)]
    wind: WindSection,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WindSection {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl From<CurrentResponse> for WeatherSnapshot {
    fn from(r: CurrentResponse) -> Self {
        Self {
            temperature: r.main.temp,
            humidity: r.main.humidity,
            pressure: r.main.pressure,
            wind_speed: r.wind.speed,
            wind_deg: r.wind.deg,
        }
    }
}

/// Client for `GET /data/2.5/weather`.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    http: reqwest::Client,
    base_url: String,
    unit: UnitSystem,
    lang: String,
    api_key: String,
}

impl OpenWeatherMapClient {
    pub fn new(unit: &str, lang: &str, api_key: &str) -> Result<Self, WeatherError> {
        let unit = unit.parse()?;
        let lang = validate_lang(lang)?;
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(WeatherError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            unit,
            lang,
            api_key: api_key.to_string(),
        })
    }

    /// Point the client at another server (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn unit(&self) -> UnitSystem {
        self.unit
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    async fn current_by_name(&self, place: &str) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        log::debug!("Fetching current weather for '{}'", place);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", place),
                ("units", self.unit.as_query()),
                ("lang", self.lang.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let current: CurrentResponse = response.json().await?;
        Ok(current.into())
    }
}
