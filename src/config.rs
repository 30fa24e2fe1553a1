//! Service configuration: compiled-in defaults overridden from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use h3o::Resolution;

use crate::classifier::DEFAULT_MODEL_PATH;
use crate::context::default_utc_offset;
use crate::dataset::DEFAULT_TRAINING_TABLE_PATH;
use crate::error::ConfigError;
use crate::scorer::{DEFAULT_JUNCTION_COMPLEXITY, DEFAULT_PROVIDER_TIMEOUT, ScorerSettings};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server listens on
    pub bind: String,

    /// Name reported by the status endpoint
    pub city: String,

    /// XGBoost JSON model. Missing or invalid puts scoring in degraded mode.
    pub model_path: PathBuf,

    /// Labelled training table, source of the heatmap
    pub training_table_path: PathBuf,

    /// Optional `name,lat,lon` table replacing the built-in blackspots
    pub blackspots_path: Option<PathBuf>,

    /// Budget for each live signal before the fallback is used
    pub provider_timeout: Duration,

    /// Placeholder complexity fed to the model at serving time
    pub junction_complexity: u32,

    /// Default resolution of `/heatmap/hex`
    pub hex_resolution: Resolution,

    /// City clock used by the traffic simulation
    pub utc_offset: FixedOffset,

    pub tomtom_key: Option<String>,
    pub openweather_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            city: "Bengaluru".into(),
            model_path: DEFAULT_MODEL_PATH.into(),
            training_table_path: DEFAULT_TRAINING_TABLE_PATH.into(),
            blackspots_path: None,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            junction_complexity: DEFAULT_JUNCTION_COMPLEXITY,
            hex_resolution: Resolution::Nine,
            utc_offset: default_utc_offset(),
            tomtom_key: None,
            openweather_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get("RISK_BIND") {
            cfg.bind = v;
        }
        if let Some(v) = get("RISK_CITY") {
            cfg.city = v;
        }
        if let Some(v) = get("RISK_MODEL_PATH") {
            cfg.model_path = v.into();
        }
        if let Some(v) = get("RISK_TRAINING_TABLE") {
            cfg.training_table_path = v.into();
        }
        cfg.blackspots_path = get("RISK_BLACKSPOTS").map(PathBuf::from);
        if let Some(v) = get("RISK_PROVIDER_TIMEOUT_MS") {
            cfg.provider_timeout = Duration::from_millis(parse("RISK_PROVIDER_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("RISK_JUNCTION_COMPLEXITY") {
            cfg.junction_complexity = parse("RISK_JUNCTION_COMPLEXITY", &v)?;
        }
        if let Some(v) = get("RISK_HEX_RESOLUTION") {
            let raw: u8 = parse("RISK_HEX_RESOLUTION", &v)?;
            cfg.hex_resolution = Resolution::try_from(raw).map_err(|_| ConfigError::InvalidValue {
                key: "RISK_HEX_RESOLUTION",
                value: v,
            })?;
        }
        if let Some(v) = get("RISK_UTC_OFFSET_MINUTES") {
            let minutes: i32 = parse("RISK_UTC_OFFSET_MINUTES", &v)?;
            cfg.utc_offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or(ConfigError::InvalidValue {
                    key: "RISK_UTC_OFFSET_MINUTES",
                    value: v,
                })?;
        }
        cfg.tomtom_key = get("TOMTOM_API_KEY");
        cfg.openweather_key = get("OPENWEATHER_API_KEY");

        Ok(cfg)
    }

    pub fn scorer_settings(&self) -> ScorerSettings {
        ScorerSettings {
            junction_complexity: self.junction_complexity,
            provider_timeout: self.provider_timeout,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:8000");
        assert_eq!(cfg.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(cfg.provider_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.junction_complexity, 3);
        assert_eq!(cfg.utc_offset.local_minus_utc(), 19_800);
        assert!(cfg.tomtom_key.is_none());
    }

    #[test]
    fn overrides_from_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("RISK_BIND", "127.0.0.1:9000"),
            ("RISK_PROVIDER_TIMEOUT_MS", "1500"),
            ("RISK_JUNCTION_COMPLEXITY", "4"),
            ("RISK_HEX_RESOLUTION", "8"),
            ("RISK_UTC_OFFSET_MINUTES", "-300"),
            ("TOMTOM_API_KEY", "abc"),
            ("OPENWEATHER_API_KEY", "  "),
        ]))
        .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9000");
        assert_eq!(cfg.provider_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.junction_complexity, 4);
        assert_eq!(cfg.hex_resolution, Resolution::Eight);
        assert_eq!(cfg.utc_offset.local_minus_utc(), -18_000);
        assert_eq!(cfg.tomtom_key.as_deref(), Some("abc"));
        assert!(cfg.openweather_key.is_none());
    }

    #[test]
    fn rejects_unparsable_values() {
        let err = AppConfig::from_lookup(lookup(&[("RISK_PROVIDER_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "RISK_PROVIDER_TIMEOUT_MS",
                ..
            }
        ));
        assert!(AppConfig::from_lookup(lookup(&[("RISK_HEX_RESOLUTION", "16")])).is_err());
        // 25 hours
        let offset = lookup(&[("RISK_UTC_OFFSET_MINUTES", "1500")]);
        assert!(AppConfig::from_lookup(offset).is_err());
    }
}
