// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Simulation mode selected by the operator.
///
/// Daily and weekly runs end at a fixed horizon; a collapse run keeps going
/// until the first missed delivery deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    Daily,
    Weekly,
    Collapse,
}

impl SimulationMode {
    /// Horizon in virtual minutes past the start, `None` for unbounded.
    pub fn horizon_minutes(&self) -> Option<i64> {
        match self {
            SimulationMode::Daily => Some(24 * 60),
            SimulationMode::Weekly => Some(7 * 24 * 60),
            SimulationMode::Collapse => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::Daily => "daily",
            SimulationMode::Weekly => "weekly",
            SimulationMode::Collapse => "collapse",
        }
    }
}

/// Main configuration struct for the simulation host.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub web: WebConfig,
}

/// Scenario selection: mode, start instant, and resynchronization period.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_mode")]
    pub mode: SimulationMode,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_start_month")]
    pub start_month: u32,
    #[serde(default = "default_start_day")]
    pub start_day: u32,
    #[serde(default)]
    pub start_hour: u8,
    #[serde(default)]
    pub start_minute: u8,
    /// Virtual minutes between resynchronizations with the optimizer.
    /// One shared value for every mode.
    #[serde(default = "default_minutes_per_tick")]
    pub minutes_per_tick: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            start_year: default_start_year(),
            start_month: default_start_month(),
            start_day: default_start_day(),
            start_hour: 0,
            start_minute: 0,
            minutes_per_tick: default_minutes_per_tick(),
        }
    }
}

impl SimulationConfig {
    /// Virtual minute of the configured start within the simulation epoch
    /// (`1440*day + 60*hour + minute`, day-of-month based).
    pub fn start_virtual_minute(&self) -> i64 {
        self.start_day as i64 * 24 * 60 + self.start_hour as i64 * 60 + self.start_minute as i64
    }
}

/// Playback pacing: wall-clock cadence of the virtual clock and the
/// animation loop, plus the allowed speed range.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Wall-clock period of one virtual minute at speed 1.0.
    #[serde(default = "default_base_tick_ms")]
    pub base_tick_ms: u64,
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    /// Animation frame period.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Wall-clock time to traverse one route segment at speed 1.0.
    #[serde(default = "default_segment_base_ms")]
    pub segment_base_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_tick_ms: default_base_tick_ms(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            frame_interval_ms: default_frame_interval_ms(),
            segment_base_ms: default_segment_base_ms(),
        }
    }
}

/// Route optimizer endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_optimizer_addr")]
    pub addr: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            addr: default_optimizer_addr(),
        }
    }
}

/// HTTP surface exposed to the dashboard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_web_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_web_bind(),
        }
    }
}

impl Config {
    /// Validate ranges and the start date before a session is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if chrono::NaiveDate::from_ymd_opt(sim.start_year, sim.start_month, sim.start_day)
            .is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "start date {}-{:02}-{:02} is not a valid calendar date",
                sim.start_year, sim.start_month, sim.start_day
            )));
        }
        if sim.start_hour >= 24 {
            return Err(ConfigError::Invalid(format!(
                "start_hour must be < 24, got {}",
                sim.start_hour
            )));
        }
        if sim.start_minute >= 60 {
            return Err(ConfigError::Invalid(format!(
                "start_minute must be < 60, got {}",
                sim.start_minute
            )));
        }
        if sim.minutes_per_tick <= 0 {
            return Err(ConfigError::Invalid(format!(
                "minutes_per_tick must be > 0, got {}",
                sim.minutes_per_tick
            )));
        }
        let pb = &self.playback;
        if pb.base_tick_ms == 0 || pb.frame_interval_ms == 0 || pb.segment_base_ms == 0 {
            return Err(ConfigError::Invalid(
                "playback periods must be > 0".to_string(),
            ));
        }
        if pb.min_speed <= 0.0 || pb.min_speed > 1.0 || pb.max_speed < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "speed range [{}, {}] must bracket 1.0 with min > 0",
                pb.min_speed, pb.max_speed
            )));
        }
        if self.optimizer.addr.is_empty() {
            return Err(ConfigError::Invalid(
                "optimizer addr cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_mode() -> SimulationMode {
    SimulationMode::Daily
}
fn default_start_year() -> i32 {
    2025
}
fn default_start_month() -> u32 {
    1
}
fn default_start_day() -> u32 {
    1
}
fn default_minutes_per_tick() -> i64 {
    15
}
fn default_base_tick_ms() -> u64 {
    1000
}
fn default_min_speed() -> f64 {
    0.5
}
fn default_max_speed() -> f64 {
    2.0
}
fn default_frame_interval_ms() -> u64 {
    60
}
fn default_segment_base_ms() -> u64 {
    1500
}
fn default_optimizer_addr() -> String {
    "127.0.0.1:7878".to_string()
}
fn default_web_bind() -> String {
    "0.0.0.0:3000".to_string()
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
