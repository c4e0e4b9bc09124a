use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::Position;
use crate::{error::ConfigError, util::is_hex_color};

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    pub general: GeneralConfig,
    pub probes: Vec<ProbeConfig>,
}

/// Global settings, shared by all probes unless a probe overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize, smart_default::SmartDefault)]
#[serde(default)]
pub struct GeneralConfig {
    /// Longest time the scheduler sleeps between two wake-ups.
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(1))]
    pub interval: Duration,
    /// Cadence of probes that do not set their own `interval`.
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(60))]
    pub cache_timeout: Duration,
    #[default = "#00FF00"]
    pub color_good: String,
    #[default = "#FFFF00"]
    pub color_degraded: String,
    #[default = "#FF0000"]
    pub color_bad: String,
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(1))]
    pub backoff_base: Duration,
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(60))]
    pub backoff_cap: Duration,
    /// Deadline of a single pooled probe run.
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(10))]
    pub probe_timeout: Duration,
    #[serde(deserialize_with = "seconds")]
    #[default(Duration::from_secs(2))]
    pub shutdown_grace: Duration,
    /// Soft runtime budget of inline probes, in milliseconds.
    #[default = 50]
    pub inline_budget_ms: u64,
    pub pool_size: Option<usize>,
}

impl GeneralConfig {
    pub fn palette(&self) -> Palette {
        Palette { good: self.color_good.clone(), degraded: self.color_degraded.clone(), bad: self.color_bad.clone() }
    }

    pub fn inline_budget(&self) -> Duration {
        Duration::from_millis(self.inline_budget_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for color in [&self.color_good, &self.color_degraded, &self.color_bad] {
            if !is_hex_color(color) {
                return Err(ConfigError::InvalidColor(color.clone()));
            }
        }
        for (setting, value) in [("interval", self.interval), ("probe_timeout", self.probe_timeout)] {
            if value.is_zero() {
                return Err(ConfigError::InvalidSetting { setting, message: "must be greater than zero".to_string() });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub good: String,
    pub degraded: String,
    pub bad: String,
}

impl Palette {
    /// Resolve a symbolic color name (`good`, `degraded`, `bad`) or pass through a hex color.
    /// Returns `None` for anything the bar would not understand.
    pub fn resolve(&self, color: &str) -> Option<String> {
        match color.to_lowercase().as_str() {
            "good" => Some(self.good.clone()),
            "degraded" => Some(self.degraded.clone()),
            "bad" => Some(self.bad.clone()),
            _ if is_hex_color(color) => Some(color.to_string()),
            _ => None,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        GeneralConfig::default().palette()
    }
}

/// How a probe is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecMode {
    /// Runs on the scheduler thread. Must be fast.
    Inline,
    /// Runs on the worker pool. May block.
    Pooled,
}

/// One entry of the `probes` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeConfig {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_seconds")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub mode: Option<ExecMode>,
    #[serde(default)]
    pub position: Position,
    /// Everything else is interpreted by the probe kind.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ProbeConfig {
    /// The probe kind, defaulting to the first word of the id, so that `"time utc"` is a `time` probe.
    pub fn kind(&self) -> &str {
        match &self.kind {
            Some(kind) => kind,
            None => self.id.split_whitespace().next().unwrap_or(&self.id),
        }
    }
}

pub fn read_from_file(path: impl AsRef<Path>) -> Result<BarConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse(&content).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.to_path_buf(), source },
        other => other,
    })
}

pub fn parse(content: &str) -> Result<BarConfig, ConfigError> {
    let config: BarConfig =
        serde_json::from_str(content).map_err(|source| ConfigError::Parse { path: Default::default(), source })?;
    config.general.validate()?;
    Ok(config)
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

fn optional_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    seconds(deserializer).map(Some)
}
