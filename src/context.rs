//! Live traffic and weather signals.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use serde::Serialize;
use tracing::warn;

use crate::distance::Coordinate;
use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TrafficLevel {
    Free,
    Moderate,
    Congested,
}

impl TrafficLevel {
    pub fn penalty(self) -> f64 {
        match self {
            TrafficLevel::Free => 0.0,
            TrafficLevel::Moderate => 0.10,
            TrafficLevel::Congested => 0.35,
        }
    }

    /// Classifies by current speed as a share of free-flow speed.
    pub fn from_speed_ratio(ratio: f64) -> Self {
        if ratio < 0.5 {
            TrafficLevel::Congested
        } else if ratio < 0.8 {
            TrafficLevel::Moderate
        } else {
            TrafficLevel::Free
        }
    }
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrafficLevel::Free => "Free Flow",
            TrafficLevel::Moderate => "Moderate",
            TrafficLevel::Congested => "Congested",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Fog,
    Rain,
    Storm,
    Snow,
}

impl WeatherCondition {
    pub fn penalty(self) -> f64 {
        match self {
            WeatherCondition::Rain | WeatherCondition::Storm => 0.20,
            WeatherCondition::Clear
            | WeatherCondition::Cloudy
            | WeatherCondition::Fog
            | WeatherCondition::Snow => 0.0,
        }
    }

    /// Maps an OpenWeatherMap `weather[].main` group.
    pub fn from_owm_group(group: &str) -> Option<Self> {
        Some(match group {
            "Clear" => WeatherCondition::Clear,
            "Clouds" => WeatherCondition::Cloudy,
            "Rain" | "Drizzle" => WeatherCondition::Rain,
            "Thunderstorm" | "Squall" | "Tornado" => WeatherCondition::Storm,
            "Snow" => WeatherCondition::Snow,
            "Mist" | "Fog" | "Haze" | "Smoke" | "Dust" | "Sand" | "Ash" => WeatherCondition::Fog,
            _ => return None,
        })
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficReading {
    pub level: TrafficLevel,
    pub current_speed_kmh: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    pub condition: WeatherCondition,
    pub temperature_c: Option<f64>,
}

/// Conditions at a point for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveContext {
    pub traffic: TrafficReading,
    pub weather: WeatherReading,
}

impl LiveContext {
    pub const FALLBACK_TRAFFIC: TrafficReading = TrafficReading {
        level: TrafficLevel::Free,
        current_speed_kmh: None,
    };

    pub const FALLBACK_WEATHER: WeatherReading = WeatherReading {
        condition: WeatherCondition::Clear,
        temperature_c: None,
    };

    pub fn new(level: TrafficLevel, condition: WeatherCondition) -> Self {
        Self {
            traffic: TrafficReading {
                level,
                current_speed_kmh: None,
            },
            weather: WeatherReading {
                condition,
                temperature_c: None,
            },
        }
    }

    /// Used when the provider fails: free traffic, clear sky.
    pub fn fallback() -> Self {
        Self {
            traffic: Self::FALLBACK_TRAFFIC,
            weather: Self::FALLBACK_WEATHER,
        }
    }

    pub fn modifier(&self) -> f64 {
        self.traffic.level.penalty() + self.weather.condition.penalty()
    }
}

#[async_trait]
pub trait LiveContextProvider: Send + Sync {
    async fn traffic(&self, point: Coordinate) -> Result<TrafficReading, ProviderError>;
    async fn weather(&self, point: Coordinate) -> Result<WeatherReading, ProviderError>;
}

/// Fetches both signals concurrently. A signal that errors or outlives
/// `timeout` is replaced by its fallback; this never fails.
pub async fn fetch_live_context(
    provider: &dyn LiveContextProvider,
    point: Coordinate,
    timeout: Duration,
) -> LiveContext {
    let (traffic, weather) = tokio::join!(
        bounded(timeout, provider.traffic(point)),
        bounded(timeout, provider.weather(point)),
    );

    let traffic = traffic.unwrap_or_else(|e| {
        warn!(lat = point.lat, lon = point.lon, error = %e, "traffic unavailable, assuming free flow");
        LiveContext::FALLBACK_TRAFFIC
    });
    let weather = weather.unwrap_or_else(|e| {
        warn!(lat = point.lat, lon = point.lon, error = %e, "weather unavailable, assuming clear");
        LiveContext::FALLBACK_WEATHER
    });

    LiveContext { traffic, weather }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(ProviderError::Timeout))
}

/// Bengaluru local time, UTC+05:30.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Time-of-day traffic model with fixed clear weather. Stands in for the live
/// APIs when no keys are configured. Hours are read on the city's clock, not
/// the host's.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    fixed_hour: Option<u32>,
    utc_offset: FixedOffset,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self {
            fixed_hour: None,
            utc_offset: default_utc_offset(),
        }
    }
}

impl SimulatedProvider {
    pub const TEMPERATURE_C: f64 = 27.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_hour(hour: u32) -> Self {
        Self {
            fixed_hour: Some(hour % 24),
            ..Self::default()
        }
    }

    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    pub fn traffic_for_hour(hour: u32) -> TrafficLevel {
        match hour {
            8..=10 | 17..=20 => TrafficLevel::Congested,
            11..=16 => TrafficLevel::Moderate,
            _ => TrafficLevel::Free,
        }
    }

    fn hour_at(&self, now: DateTime<Utc>) -> u32 {
        self.fixed_hour
            .unwrap_or_else(|| now.with_timezone(&self.utc_offset).hour())
    }

    fn hour(&self) -> u32 {
        self.hour_at(Utc::now())
    }
}

#[async_trait]
impl LiveContextProvider for SimulatedProvider {
    async fn traffic(&self, _point: Coordinate) -> Result<TrafficReading, ProviderError> {
        Ok(TrafficReading {
            level: Self::traffic_for_hour(self.hour()),
            current_speed_kmh: None,
        })
    }

    async fn weather(&self, _point: Coordinate) -> Result<WeatherReading, ProviderError> {
        Ok(WeatherReading {
            condition: WeatherCondition::Clear,
            temperature_c: Some(Self::TEMPERATURE_C),
        })
    }
}
