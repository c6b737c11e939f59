use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::module::member::SchemaVersion;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub card: CardConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Member list, read once at startup
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    #[serde(default)]
    pub schema: SchemaVersion,

    /// Rows with fewer tokens are dropped
    #[serde(default = "default_min_columns")]
    pub min_columns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    /// Directory photo file names are resolved against
    #[serde(default = "default_photo_base")]
    pub photo_base: PathBuf,

    /// URL prefix photos are served under in interactive mode
    #[serde(default = "default_photo_url_prefix")]
    pub photo_url_prefix: String,

    /// Replaces the built-in SVG template when set
    #[serde(default)]
    pub template_path: Option<PathBuf>,

    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_brand_color")]
    pub brand_color: String,

    #[serde(default = "default_institution_name")]
    pub institution_name: String,

    #[serde(default = "default_card_title")]
    pub card_title: String,

    /// Fixed issuance date; today's date when absent
    #[serde(default)]
    pub issue_date: Option<String>,

    #[serde(default)]
    pub labels: CardLabels,

    #[serde(default = "default_certification")]
    pub certification: String,

    #[serde(default = "default_principal")]
    pub principal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardLabels {
    #[serde(default = "default_label_name")]
    pub name: String,
    #[serde(default = "default_label_cohort")]
    pub cohort: String,
    #[serde(default = "default_label_region")]
    pub region: String,
    #[serde(default = "default_label_issued")]
    pub issued: String,
    #[serde(default = "default_label_ability")]
    pub ability: String,
    #[serde(default = "default_label_team")]
    pub team: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,

    /// Cards snapshotted at the same time during a bulk export
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause before each snapshot, in milliseconds
    #[serde(default)]
    pub settle_delay_ms: u64,

    #[serde(default = "default_single_file_prefix")]
    pub single_file_prefix: String,

    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// Deflate archive entries instead of storing them
    #[serde(default)]
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("members.csv")
}

fn default_min_columns() -> usize {
    6
}

fn default_photo_base() -> PathBuf {
    PathBuf::from("public/member")
}

fn default_photo_url_prefix() -> String {
    "/member".to_string()
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

fn default_font_family() -> String {
    "Noto Serif JP".to_string()
}

fn default_brand_color() -> String {
    "#EBC700".to_string()
}

fn default_institution_name() -> String {
    "Flashami学園".to_string()
}

fn default_card_title() -> String {
    "学生証".to_string()
}

fn default_label_name() -> String {
    "ニックネーム".to_string()
}

fn default_label_cohort() -> String {
    "leaders期".to_string()
}

fn default_label_region() -> String {
    "地域".to_string()
}

fn default_label_issued() -> String {
    "発行日".to_string()
}

fn default_label_ability() -> String {
    "特殊能力".to_string()
}

fn default_label_team() -> String {
    "TEAM".to_string()
}

fn default_certification() -> String {
    "上記のものは、本学の学生であることを証明する".to_string()
}

fn default_principal() -> String {
    "Flashami学園  校長".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_pixel_ratio() -> f32 {
    2.0
}

fn default_concurrency() -> usize {
    1
}

fn default_single_file_prefix() -> String {
    "student-id-".to_string()
}

fn default_archive_name() -> String {
    "student_ids.zip".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            directory: DirectoryConfig::default(),
            card: CardConfig::default(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            schema: SchemaVersion::default(),
            min_columns: default_min_columns(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            photo_base: default_photo_base(),
            photo_url_prefix: default_photo_url_prefix(),
            template_path: None,
            fonts_dir: default_fonts_dir(),
            font_family: default_font_family(),
            brand_color: default_brand_color(),
            institution_name: default_institution_name(),
            card_title: default_card_title(),
            issue_date: None,
            labels: CardLabels::default(),
            certification: default_certification(),
            principal: default_principal(),
        }
    }
}

impl Default for CardLabels {
    fn default() -> Self {
        Self {
            name: default_label_name(),
            cohort: default_label_cohort(),
            region: default_label_region(),
            issued: default_label_issued(),
            ability: default_label_ability(),
            team: default_label_team(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pixel_ratio: default_pixel_ratio(),
            concurrency: default_concurrency(),
            settle_delay_ms: 0,
            single_file_prefix: default_single_file_prefix(),
            archive_name: default_archive_name(),
            compress: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path, e))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file '{}' not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
