//! Pipeline configuration - YAML file with environment overrides

use crate::db::DatabaseSettings;
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sections: BTreeMap<String, SectionConfig>,

    #[serde(default)]
    pub export: ExportSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub http: HttpSettings,

    /// Directory relative paths are resolved against (the config file's directory)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub enabled: bool,
    pub description: Option<String>,
    /// Local workbook for file-backed sources
    pub path: Option<PathBuf>,
    /// National total used for the provincial reference-year estimate
    pub reference_year_total: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub files: ExportFiles,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public/data"),
            files: ExportFiles::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportFiles {
    pub data_csv: String,
    pub metadata_csv: String,
    pub major_projects_csv: String,
}

impl Default for ExportFiles {
    fn default() -> Self {
        Self {
            data_csv: "data.csv".to_string(),
            metadata_csv: "metadata.csv".to_string(),
            major_projects_csv: "major_projects_map.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file and apply `DB_*` environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml_str(&text)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override database settings from the environment; empty values are ignored
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(server) = get("DB_SERVER") {
            self.database.server = server;
        }
        if let Some(database) = get("DB_DATABASE") {
            self.database.database = database;
        }
        if let Some(username) = get("DB_USERNAME") {
            self.database.username = Some(username);
        }
        if let Some(password) = get("DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(driver) = get("DB_DRIVER") {
            self.database.driver = driver;
        }
    }

    pub fn is_section_enabled(&self, section_key: &str) -> bool {
        self.sections
            .get(section_key)
            .map(|s| s.enabled)
            .unwrap_or(false)
    }

    /// A source runs only when both it and its section are enabled
    pub fn is_source_enabled(&self, section_key: &str, source_key: &str) -> bool {
        self.is_section_enabled(section_key)
            && self
                .source_config(section_key, source_key)
                .map(|s| s.enabled)
                .unwrap_or(false)
    }

    pub fn source_config(&self, section_key: &str, source_key: &str) -> Option<&SourceConfig> {
        self.sections.get(section_key)?.sources.get(source_key)
    }

    /// Keys of all enabled sources in an enabled section
    pub fn enabled_sources(&self, section_key: &str) -> Vec<&str> {
        if !self.is_section_enabled(section_key) {
            return Vec::new();
        }
        self.sections
            .get(section_key)
            .map(|s| {
                s.sources
                    .iter()
                    .filter(|(_, src)| src.enabled)
                    .map(|(key, _)| key.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn export_path(&self, file_name: &str) -> PathBuf {
        self.resolve_path(&self.export.output_dir).join(file_name)
    }
}
