// =============================================================================
// Runtime Configuration
// =============================================================================
//
// Every field carries `#[serde(default)]` so a partial (or empty) JSON file
// still loads.  Environment overrides are applied by `main`, never here.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::{self, DEFAULT_BAND_STD, DEFAULT_WINDOW};
use crate::refresh::CycleSettings;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_title() -> String {
    "ShadowPips - USD/JPY".to_string()
}

fn default_series_url() -> String {
    "http://127.0.0.1:8080/data/usdjpy_1h.json".to_string()
}

fn default_orders_url() -> String {
    "http://127.0.0.1:8080/data/orders.json".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_window() -> i64 {
    DEFAULT_WINDOW
}

fn default_band_std_multiplier() -> f64 {
    DEFAULT_BAND_STD
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Chart title carried in every bundle.
    #[serde(default = "default_title")]
    pub title: String,

    /// JSON document with the OHLC series.
    #[serde(default = "default_series_url")]
    pub series_url: String,

    /// JSON document with order annotations.
    #[serde(default = "default_orders_url")]
    pub orders_url: String,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Deadline for both fetches of one pass. Defaults to the refresh interval.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    /// Look-back window for the moving average and the bands.
    #[serde(default = "default_window")]
    pub window: i64,

    /// Band half-width in population standard deviations.
    #[serde(default = "default_band_std_multiplier")]
    pub band_std_multiplier: f64,

    /// Address the chart API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            series_url: default_series_url(),
            orders_url: default_orders_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
            fetch_timeout_secs: None,
            window: default_window(),
            band_std_multiplier: default_band_std_multiplier(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            series_url = %config.series_url,
            window = config.window,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Reject settings the refresh cycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be greater than zero");
        }
        if self.fetch_timeout_secs == Some(0) {
            anyhow::bail!("fetch_timeout_secs must be greater than zero");
        }
        indicators::bollinger_bands_with(&[], self.window, self.band_std_multiplier)
            .context("invalid indicator settings")?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.unwrap_or(self.refresh_interval_secs))
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            title: self.title.clone(),
            window: self.window,
            band_std: self.band_std_multiplier,
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.title, "ShadowPips - USD/JPY");
        assert_eq!(cfg.refresh_interval_secs, 10);
        assert_eq!(cfg.window, 25);
        assert!((cfg.band_std_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.window, 25);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert!(cfg.fetch_timeout_secs.is_none());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "window": 20, "fetch_timeout_secs": 3, "series_url": "http://feed/x.json" }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.window, 20);
        assert_eq!(cfg.series_url, "http://feed/x.json");
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(10));

        let settings = cfg.cycle_settings();
        assert_eq!(settings.window, 20);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(3));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut cfg = RuntimeConfig::default();
        cfg.window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.window = -5;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.refresh_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.band_std_multiplier = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }
}
