//! User configuration loaded from `config.toml`.
//!
//! Every field is optional in the file; missing values take the defaults from
//! [`crate::constants`].

use crate::constants;
use crate::error::{Error, Result};
use crate::state::{default_catalogue, VpnClient};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tick_interval_secs: u64,
    pub advisory_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub notifications: NotificationConfig,
    pub estimation: EstimationConfig,
    pub corporate: CorporateConfig,
    pub clients: Vec<VpnClient>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_secs: constants::DEFAULT_TICK_SECS,
            advisory_interval_secs: constants::DEFAULT_ADVISORY_SECS,
            probe_timeout_ms: constants::DEFAULT_PROBE_TIMEOUT_MS,
            notifications: NotificationConfig::default(),
            estimation: EstimationConfig::default(),
            corporate: CorporateConfig::default(),
            clients: default_catalogue(),
        }
    }
}

/// Thresholds and cooldowns for notifications and advisories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub debounce_secs: u64,
    pub long_session_hours: u64,
    pub long_session_cooldown_secs: u64,
    pub high_data_bytes: u64,
    pub high_data_cooldown_secs: u64,
    pub max_connect_attempts: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            debounce_secs: constants::DEFAULT_DEBOUNCE_SECS,
            long_session_hours: constants::DEFAULT_LONG_SESSION_HOURS,
            long_session_cooldown_secs: constants::DEFAULT_LONG_SESSION_COOLDOWN_SECS,
            high_data_bytes: constants::DEFAULT_HIGH_DATA_BYTES,
            high_data_cooldown_secs: constants::DEFAULT_HIGH_DATA_COOLDOWN_SECS,
            max_connect_attempts: constants::DEFAULT_MAX_CONNECT_ATTEMPTS,
        }
    }
}

/// Parameters of the synthetic traffic model used when no interface
/// counters are readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub base_rate: u64,
    pub min_variation: f64,
    pub max_variation: f64,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    pub business_hours_multiplier: f64,
    pub min_download_ratio: u64,
    pub max_download_ratio: u64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            base_rate: constants::DEFAULT_BASE_RATE,
            min_variation: constants::DEFAULT_MIN_VARIATION,
            max_variation: constants::DEFAULT_MAX_VARIATION,
            business_hours_start: constants::DEFAULT_BUSINESS_START,
            business_hours_end: constants::DEFAULT_BUSINESS_END,
            business_hours_multiplier: constants::DEFAULT_BUSINESS_MULTIPLIER,
            min_download_ratio: constants::DEFAULT_MIN_DOWNLOAD_RATIO,
            max_download_ratio: constants::DEFAULT_MAX_DOWNLOAD_RATIO,
        }
    }
}

impl EstimationConfig {
    /// True when `hour` (0-23, local) falls in the busier window. Both ends
    /// are inclusive, so the default window runs 09:00 to 18:59.
    #[must_use]
    pub fn is_business_hour(&self, hour: u32) -> bool {
        (self.business_hours_start..=self.business_hours_end).contains(&hour)
    }

    /// Rejects variation and multiplier values the sampler cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first non-finite field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_variation", self.min_variation),
            ("max_variation", self.max_variation),
            ("business_hours_multiplier", self.business_hours_multiplier),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "estimation.{name} must be a finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Markers of a corporate tunnel that bypasses the system VPN registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorporateConfig {
    pub process: String,
    pub pid_file: PathBuf,
    pub argument_markers: Vec<String>,
    pub route_probe: String,
}

impl Default for CorporateConfig {
    fn default() -> Self {
        Self {
            process: constants::DEFAULT_CORPORATE_PROCESS.to_string(),
            pid_file: PathBuf::from(constants::DEFAULT_CORPORATE_PID_FILE),
            argument_markers: constants::DEFAULT_CORPORATE_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            route_probe: constants::DEFAULT_CORPORATE_ROUTE_PROBE.to_string(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TomlDe`] if the text is not a valid config, or
    /// [`Error::InvalidConfig`] if a value is out of range.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.estimation.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Writes this config as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| Error::io(path, e))
    }
}

/// `<config dir>/vpnwatch`.
///
/// # Errors
///
/// Returns [`Error::NoConfigDir`] if the platform has no config directory.
pub fn app_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(constants::CONFIG_DIR_NAME))
        .ok_or(Error::NoConfigDir)
}

/// Default location of `config.toml`.
///
/// # Errors
///
/// Returns [`Error::NoConfigDir`] if the platform has no config directory.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(app_config_dir()?.join(constants::CONFIG_FILE_NAME))
}
