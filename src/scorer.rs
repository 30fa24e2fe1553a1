//! Risk scoring: historical model probability plus live penalties.
//!
//! `final = clamp(base + traffic_penalty + weather_penalty, 0, 0.99)`, where
//! `base` is the classifier's probability for the distance to the nearest
//! blackspot. Levels: above 0.65 is High, above 0.30 is Medium.
//!
//! Junction complexity cannot be observed for an arbitrary query point, so the
//! classifier is fed a fixed placeholder ([`ScorerSettings::junction_complexity`]).
//! Scores therefore reflect proximity only, as if every point were an ordinary
//! junction.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::blackspots::BlackspotIndex;
use crate::classifier::Classifier;
use crate::context::{
    LiveContext, LiveContextProvider, TrafficLevel, WeatherCondition, fetch_live_context,
};
use crate::distance::Coordinate;
use crate::error::ScoreError;

pub const MAX_SCORE: f64 = 0.99;
pub const HIGH_THRESHOLD: f64 = 0.65;
pub const MEDIUM_THRESHOLD: f64 = 0.30;
/// Base probability above which proximity is reported as a factor.
pub const NOTABLE_PROBABILITY: f64 = 0.4;

pub const DEFAULT_JUNCTION_COMPLEXITY: u32 = 3;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_THRESHOLD {
            RiskLevel::High
        } else if score > MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveData {
    pub weather: WeatherCondition,
    pub traffic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    pub nearest_blackspot: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
    pub live_data: LiveData,
}

#[derive(Debug, Clone, Copy)]
pub struct ScorerSettings {
    pub junction_complexity: u32,
    pub provider_timeout: Duration,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            junction_complexity: DEFAULT_JUNCTION_COMPLEXITY,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

pub struct RiskScorer {
    index: BlackspotIndex,
    classifier: Option<Box<dyn Classifier>>,
    provider: Box<dyn LiveContextProvider>,
    settings: ScorerSettings,
}

impl RiskScorer {
    /// `classifier` is `None` when the model failed to load; every score
    /// request then fails with [`ScoreError::ModelUnavailable`].
    pub fn new(
        index: BlackspotIndex,
        classifier: Option<Box<dyn Classifier>>,
        provider: Box<dyn LiveContextProvider>,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            index,
            classifier,
            provider,
            settings,
        }
    }

    pub fn model_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn index(&self) -> &BlackspotIndex {
        &self.index
    }

    pub async fn score(&self, lat: f64, lon: f64) -> Result<RiskAssessment, ScoreError> {
        let point = Coordinate::checked(lat, lon)?;
        if !self.model_available() {
            return Err(ScoreError::ModelUnavailable);
        }
        let context =
            fetch_live_context(self.provider.as_ref(), point, self.settings.provider_timeout).await;
        self.assess(point, &context)
    }

    /// Scores `point` under an already known live context.
    pub fn assess(
        &self,
        point: Coordinate,
        context: &LiveContext,
    ) -> Result<RiskAssessment, ScoreError> {
        if !point.is_valid() {
            return Err(ScoreError::InvalidCoordinate {
                lat: point.lat,
                lon: point.lon,
            });
        }
        let classifier = self
            .classifier
            .as_deref()
            .ok_or(ScoreError::ModelUnavailable)?;

        let nearest = self.index.nearest(point);
        let base = classifier
            .predict_probability(nearest.distance_km, self.settings.junction_complexity)
            .clamp(0.0, 1.0);

        let score = blend(base, context);
        let mut factors = Vec::new();
        if base > NOTABLE_PROBABILITY {
            factors.push(format!(
                "Proximity to {} ({:.2}km)",
                nearest.name, nearest.distance_km
            ));
        }
        factors.extend(live_factors(context));
        if factors.is_empty() {
            factors.push("Safe Conditions".to_string());
        }

        Ok(RiskAssessment {
            risk_score: round2(score),
            risk_level: RiskLevel::from_score(score),
            factors,
            live_data: LiveData {
                weather: context.weather.condition,
                traffic: context.traffic.level.to_string(),
                temperature_c: context.weather.temperature_c,
                nearest_blackspot: nearest.name.to_string(),
                distance_km: round2(nearest.distance_km),
            },
        })
    }
}

/// Additive blend, clamped into `[0, MAX_SCORE]`.
pub fn blend(base_probability: f64, context: &LiveContext) -> f64 {
    (base_probability + context.modifier()).clamp(0.0, MAX_SCORE)
}

fn live_factors(context: &LiveContext) -> impl Iterator<Item = String> {
    let traffic = match context.traffic.level {
        TrafficLevel::Congested => Some("High Traffic Congestion"),
        TrafficLevel::Moderate => Some("Moderate Traffic"),
        TrafficLevel::Free => None,
    };
    let weather = match context.weather.condition {
        WeatherCondition::Rain => Some("Wet Road Surfaces"),
        WeatherCondition::Storm => Some("Storm Conditions"),
        WeatherCondition::Clear
        | WeatherCondition::Cloudy
        | WeatherCondition::Fog
        | WeatherCondition::Snow => None,
    };
    traffic.into_iter().chain(weather).map(str::to_string)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
