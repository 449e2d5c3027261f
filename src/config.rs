//! Application and pipeline configuration.
//!
//! Everything has a default, so a missing config file is not an error. The
//! file is JSON and may set any subset of fields.
use crate::credentials::CredentialSource;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "EVENT_REPORT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "event_report.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
    pub pipeline: PipelineConfig,
    pub credentials: CredentialSource,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            pipeline: PipelineConfig::default(),
            credentials: CredentialSource::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a file that does not exist yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from the path in `EVENT_REPORT_CONFIG`, or `event_report.json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }
}

/// Header names the pipeline recognises.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnNames {
    pub date: String,
    pub applications: String,
    pub attendees: String,
    pub reactions: String,
    pub promotions: String,
    pub satisfied: String,
    pub team: String,
    pub weekday: String,
    pub event_name: String,
    pub time_slot_raw: String,
    pub time_slot: String,
    pub participation_rate: String,
    pub satisfaction_rate: String,
    pub reaction_rate: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date: "実施日".to_string(),
            applications: "申込数".to_string(),
            attendees: "参加者数".to_string(),
            reactions: "リアクション数".to_string(),
            promotions: "告知回数".to_string(),
            satisfied: "満足回答数".to_string(),
            team: "チーム".to_string(),
            weekday: "曜日".to_string(),
            event_name: "イベント名".to_string(),
            time_slot_raw: "時間帯".to_string(),
            time_slot: "時間帯スロット".to_string(),
            participation_rate: "参加率".to_string(),
            satisfaction_rate: "満足度".to_string(),
            reaction_rate: "リアクション率".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns coerced to numbers during normalization.
    pub fn numeric(&self) -> [&str; 5] {
        [
            self.applications.as_str(),
            self.attendees.as_str(),
            self.reactions.as_str(),
            self.promotions.as_str(),
            self.satisfied.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnNames,
    /// Strings that join several time slots inside one cell.
    pub slot_separators: Vec<String>,
    /// Warn when more than this share of attempted dates fail to parse.
    pub date_failure_warn_ratio: f64,
    /// Warn when more than this share of a numeric column is missing.
    pub numeric_missing_warn_ratio: f64,
    /// Rows with `|z|` at or above this are outliers.
    pub outlier_z: f64,
    /// Drop attendee outliers before the grouped report sections.
    pub exclude_outliers: bool,
    pub report_top_n: usize,
    pub report_bottom_n: usize,
    pub min_correlation_points: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            slot_separators: vec!["・".to_string()],
            date_failure_warn_ratio: 0.10,
            numeric_missing_warn_ratio: 0.50,
            outlier_z: 3.0,
            exclude_outliers: false,
            report_top_n: 5,
            report_bottom_n: 3,
            min_correlation_points: 3,
        }
    }
}
