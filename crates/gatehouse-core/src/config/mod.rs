use crate::error::{GateError, Result};
use crate::season::{SeasonCalendar, DEFAULT_WARM_END_MONTH, DEFAULT_WARM_START_MONTH};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Custom path for SQLite database. Defaults to `~/.config/gatehouse/gatehouse.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_download_path")]
    pub download_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Identifies this gate device in uploads. Falls back to the hostname.
    #[serde(default)]
    pub device_id: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            download_path: default_download_path(),
            upload_path: default_upload_path(),
            api_key: None,
            api_key_header: default_api_key_header(),
            device_id: None,
        }
    }
}

/// Business rules for check-ins and guests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_warm_start")]
    pub warm_season_start_month: u32,
    #[serde(default = "default_warm_end")]
    pub warm_season_end_month: u32,
    /// Visits per guest per member per season before the guest is flagged.
    #[serde(default = "default_max_visits")]
    pub max_visits_per_season: usize,
    /// Hard cap on guests one member may bring in a day.
    #[serde(default = "default_max_guests")]
    pub max_guests_per_day: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            warm_season_start_month: default_warm_start(),
            warm_season_end_month: default_warm_end(),
            max_visits_per_season: default_max_visits(),
            max_guests_per_day: default_max_guests(),
        }
    }
}

impl RulesConfig {
    pub fn calendar(&self) -> SeasonCalendar {
        SeasonCalendar::new(self.warm_season_start_month, self.warm_season_end_month)
            .unwrap_or_default()
    }
}

/// Valid storage backend names.
pub const VALID_STORAGE_BACKENDS: &[&str] = &["sqlite", "memory"];

fn default_storage_backend() -> String {
    "sqlite".to_string()
}
fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_download_path() -> String {
    "/download".to_string()
}
fn default_upload_path() -> String {
    "/upload".to_string()
}
fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}
fn default_warm_start() -> u32 {
    DEFAULT_WARM_START_MONTH
}
fn default_warm_end() -> u32 {
    DEFAULT_WARM_END_MONTH
}
fn default_max_visits() -> usize {
    3
}
fn default_max_guests() -> usize {
    5
}

impl GateConfig {
    /// Load configuration with three-layer TOML merge:
    /// 1. ~/.config/gatehouse/config.toml (global)
    /// 2. .gatehouse/config.toml (site)
    /// 3. .gatehouse/config.local.toml (local, gitignored; holds the API key)
    pub fn load(site_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(dir) = site_dir {
            let site_config = dir.join(".gatehouse").join("config.toml");
            if site_config.exists() {
                builder = builder.add_source(File::from(site_config).required(false));
            }

            let local_config = dir.join(".gatehouse").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| GateError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| GateError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate config values, clamping out-of-range values and logging warnings.
    /// This is lenient: it fixes values rather than rejecting the config.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !VALID_STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            warnings.push(format!(
                "unknown storage backend '{}', valid: {}",
                self.storage.backend,
                VALID_STORAGE_BACKENDS.join(", ")
            ));
        }

        let rules = &mut self.rules;
        for (name, month) in [
            ("rules.warm_season_start_month", &mut rules.warm_season_start_month),
            ("rules.warm_season_end_month", &mut rules.warm_season_end_month),
        ] {
            if !(1..=12).contains(&*month) {
                warnings.push(format!("{name} = {month} out of range [1, 12], clamping"));
                *month = (*month).clamp(1, 12);
            }
        }
        if rules.warm_season_start_month > rules.warm_season_end_month {
            warnings.push(format!(
                "warm_season_start_month ({}) > warm_season_end_month ({}), swapping",
                rules.warm_season_start_month, rules.warm_season_end_month
            ));
            std::mem::swap(
                &mut rules.warm_season_start_month,
                &mut rules.warm_season_end_month,
            );
        }

        if rules.max_visits_per_season == 0 {
            warnings.push("rules.max_visits_per_season = 0, setting to 1".to_string());
            rules.max_visits_per_season = 1;
        }
        if rules.max_guests_per_day == 0 {
            warnings.push("rules.max_guests_per_day = 0, setting to 1".to_string());
            rules.max_guests_per_day = 1;
        }

        if self.sync.base_url.trim().is_empty() {
            warnings.push(format!(
                "sync.base_url is empty, using {}",
                default_base_url()
            ));
            self.sync.base_url = default_base_url();
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("gatehouse").join("config.toml"))
}

/// Resolve the device id sent with uploads.
///
/// Priority: config `device_id` → `$HOSTNAME` → `/etc/hostname` → `"gate-device"`
pub fn resolve_device_id(config: &SyncConfig) -> String {
    if let Some(ref id) = config.device_id {
        if !id.trim().is_empty() {
            return id.trim().to_string();
        }
    }

    if let Ok(hostname) = std::env::var("HOSTNAME") {
        if !hostname.is_empty() {
            return hostname;
        }
    }

    if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
        let hostname = hostname.trim().to_string();
        if !hostname.is_empty() {
            return hostname;
        }
    }

    "gate-device".to_string()
}
