//! HTTP-backed live context: TomTom Traffic Flow and OpenWeatherMap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::context::{
    LiveContextProvider, SimulatedProvider, TrafficLevel, TrafficReading, WeatherCondition,
    WeatherReading,
};
use crate::distance::Coordinate;
use crate::error::ProviderError;

const TOMTOM_FLOW_URL: &str =
    "https://api.tomtom.com/traffic/services/4/flowSegmentData/absolute/10/json";
const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    flow_segment_data: FlowSegment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegment {
    current_speed: f64,
    free_flow_speed: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    weather: Vec<WeatherGroup>,
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherGroup {
    main: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

fn traffic_reading(flow: FlowResponse) -> Result<TrafficReading, ProviderError> {
    let seg = flow.flow_segment_data;
    if seg.free_flow_speed.is_nan() || seg.free_flow_speed <= 0.0 || seg.current_speed < 0.0 {
        return Err(ProviderError::Malformed(format!(
            "speeds current={} free_flow={}",
            seg.current_speed, seg.free_flow_speed
        )));
    }
    Ok(TrafficReading {
        level: TrafficLevel::from_speed_ratio(seg.current_speed / seg.free_flow_speed),
        current_speed_kmh: Some(seg.current_speed),
    })
}

fn weather_reading(resp: WeatherResponse) -> Result<WeatherReading, ProviderError> {
    let group = resp
        .weather
        .first()
        .ok_or_else(|| ProviderError::Malformed("empty weather list".into()))?;
    let condition = WeatherCondition::from_owm_group(&group.main)
        .ok_or_else(|| ProviderError::Malformed(format!("unknown weather group {:?}", group.main)))?;
    Ok(WeatherReading {
        condition,
        temperature_c: Some(resp.main.temp),
    })
}

/// Queries the live APIs. A signal without an API key is simulated instead.
pub struct HttpProvider {
    client: Client,
    tomtom_key: Option<String>,
    openweather_key: Option<String>,
    simulated: SimulatedProvider,
}

impl HttpProvider {
    pub fn new(
        tomtom_key: Option<String>,
        openweather_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            tomtom_key,
            openweather_key,
            simulated: SimulatedProvider::new(),
        })
    }

    /// Replaces the simulation used for signals without a key.
    pub fn with_simulation(mut self, simulated: SimulatedProvider) -> Self {
        self.simulated = simulated;
        self
    }
}

#[async_trait]
impl LiveContextProvider for HttpProvider {
    async fn traffic(&self, point: Coordinate) -> Result<TrafficReading, ProviderError> {
        let Some(key) = &self.tomtom_key else {
            return self.simulated.traffic(point).await;
        };
        let flow: FlowResponse = self
            .client
            .get(TOMTOM_FLOW_URL)
            .query(&[
                ("point", format!("{},{}", point.lat, point.lon)),
                ("unit", "KMPH".to_string()),
                ("key", key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        traffic_reading(flow)
    }

    async fn weather(&self, point: Coordinate) -> Result<WeatherReading, ProviderError> {
        let Some(key) = &self.openweather_key else {
            return self.simulated.weather(point).await;
        };
        let resp: WeatherResponse = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", point.lat.to_string()),
                ("lon", point.lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        weather_reading(resp)
    }
}
