use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `id` attribute of the holder-distribution table.
    #[serde(default = "default_table_id")]
    pub table_id: String,

    /// Rows with fewer `<td>` cells than this are layout rows, not data.
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    #[serde(default = "default_master_dir")]
    pub master_dir: PathBuf,
}

/// Which row survives when the master and a snapshot share a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Existing master row wins (historical behaviour).
    #[default]
    KeepExisting,
    /// Freshly scraped row replaces the stored one.
    PreferSnapshot,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

/// Dashboard configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_charts")]
    pub max_charts: usize,

    /// Column used as the shared x axis.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_left_column")]
    pub default_left_column: usize,

    #[serde(default = "default_right_column")]
    pub default_right_column: usize,

    #[serde(default = "default_true")]
    pub open_browser: bool,

    /// Program launched by the "run" action. Defaults to this executable.
    #[serde(default)]
    pub crawler_program: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://norway.twsthr.info/StockHolders.aspx".to_string()
}
fn default_table_id() -> String {
    "Details".to_string()
}
fn default_min_cells() -> usize {
    16
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) shareholder-tracker/0.1"
        .to_string()
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("log_file")
}
fn default_master_dir() -> PathBuf {
    PathBuf::from("master")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8050
}
fn default_max_charts() -> usize {
    5
}
fn default_date_column() -> String {
    "資料日期".to_string()
}
fn default_left_column() -> usize {
    2
}
fn default_right_column() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_log_file() -> PathBuf {
    PathBuf::from("crawler.log")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            table_id: default_table_id(),
            min_cells: default_min_cells(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            master_dir: default_master_dir(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_charts: default_max_charts(),
            date_column: default_date_column(),
            default_left_column: default_left_column(),
            default_right_column: default_right_column(),
            open_browser: true,
            crawler_program: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TWSTHR").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
