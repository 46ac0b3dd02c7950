//! Configuration management for the dispatch pipeline

use crate::error::{DispatchError, Result};
use crate::reports::ReportFormat;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted dedup window, one year
pub const MAX_DEDUP_WINDOW_MINUTES: i64 = 60 * 24 * 366;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub transfer: TransferConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub sla: SlaConfig,

    #[serde(default)]
    pub holidays: HolidaysConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory the vendor collects archives from
    #[serde(alias = "upload_path")]
    pub upload_dir: PathBuf,

    /// Directory the vendor drops confirmation reports into
    #[serde(alias = "report_path")]
    pub report_dir: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default = "default_max_letters_per_cycle")]
    pub max_letters_per_cycle: usize,

    /// Daily window in which the vendor does not accept uploads (UTC)
    #[serde(default)]
    pub downtime: Option<DowntimeWindow>,
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_strategy")]
    pub strategy: BackoffStrategy,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: default_backoff_strategy(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeWindow {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl DowntimeWindow {
    /// Whether `time` falls inside the window. Windows may wrap midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.from <= self.to {
            time >= self.from && time < self.to
        } else {
            time >= self.from || time < self.to
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default)]
    pub format: ReportFormat,

    #[serde(default = "default_report_extension")]
    pub extension: String,

    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_time_column")]
    pub time_column: String,

    #[serde(default = "default_filename_column")]
    pub filename_column: String,

    /// Remove a report from the channel once every row was applied
    #[serde(default = "default_true")]
    pub delete_processed: bool,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            extension: default_report_extension(),
            date_column: default_date_column(),
            time_column: default_time_column(),
            filename_column: default_filename_column(),
            delete_processed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_window_minutes")]
    pub window_minutes: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_dedup_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaConfig {
    #[serde(default = "default_sla_business_days")]
    pub business_days: u32,

    /// Time of day on the cutoff date, UTC
    #[serde(default = "default_cutoff_time")]
    pub cutoff_time: NaiveTime,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            business_days: default_sla_business_days(),
            cutoff_time: default_cutoff_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidaysConfig {
    #[serde(alias = "base_url", default = "default_holidays_url")]
    pub url: String,

    #[serde(default = "default_holidays_division")]
    pub division: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HolidaysConfig {
    fn default() -> Self {
        Self {
            url: default_holidays_url(),
            division: default_holidays_division(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_upload_interval_secs")]
    pub upload_interval_secs: u64,

    #[serde(default = "default_reconciliation_interval_secs")]
    pub reconciliation_interval_secs: u64,

    #[serde(default = "default_escalation_interval_secs")]
    pub escalation_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            upload_interval_secs: default_upload_interval_secs(),
            reconciliation_interval_secs: default_reconciliation_interval_secs(),
            escalation_interval_secs: default_escalation_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// Default functions
fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_letters_per_cycle() -> usize {
    500
}

fn default_report_extension() -> String {
    "csv".to_string()
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_time_column() -> String {
    "Time".to_string()
}

fn default_filename_column() -> String {
    "Filename".to_string()
}

fn default_dedup_window_minutes() -> i64 {
    60
}

fn default_sla_business_days() -> u32 {
    2
}

fn default_cutoff_time() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default()
}

fn default_holidays_url() -> String {
    "https://www.gov.uk/bank-holidays.json".to_string()
}

fn default_holidays_division() -> String {
    "england-and-wales".to_string()
}

fn default_upload_interval_secs() -> u64 {
    600
}

fn default_reconciliation_interval_secs() -> u64 {
    3_600
}

fn default_escalation_interval_secs() -> u64 {
    86_400
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data/letters")
}

impl DispatchConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DispatchError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DispatchError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.transfer.upload_dir.as_os_str().is_empty() || self.transfer.report_dir.as_os_str().is_empty() {
            return Err(DispatchError::Config(
                "Transfer upload_dir and report_dir are required".to_string(),
            ));
        }

        if self.transfer.upload_dir == self.transfer.report_dir {
            return Err(DispatchError::Config(
                "Transfer upload_dir and report_dir must differ".to_string(),
            ));
        }

        if self.transfer.max_attempts == 0 {
            return Err(DispatchError::Config("transfer.max_attempts must be at least 1".to_string()));
        }

        if self.transfer.timeout_secs == 0 {
            return Err(DispatchError::Config("transfer.timeout_secs must be positive".to_string()));
        }

        if self.transfer.max_letters_per_cycle == 0 {
            return Err(DispatchError::Config(
                "transfer.max_letters_per_cycle must be at least 1".to_string(),
            ));
        }

        if !(0..=MAX_DEDUP_WINDOW_MINUTES).contains(&self.dedup.window_minutes) {
            return Err(DispatchError::Config(format!(
                "dedup.window_minutes must be between 0 and {}",
                MAX_DEDUP_WINDOW_MINUTES
            )));
        }

        let intervals = [
            ("schedule.upload_interval_secs", self.schedule.upload_interval_secs),
            ("schedule.reconciliation_interval_secs", self.schedule.reconciliation_interval_secs),
            ("schedule.escalation_interval_secs", self.schedule.escalation_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(DispatchError::Config(format!("{} must be positive", name)));
            }
        }

        if self.reports.extension.is_empty() {
            return Err(DispatchError::Config("reports.extension is required".to_string()));
        }

        Ok(())
    }
}
