//! Configuration system for Carebridge
//!
//! One TOML file with four sections (`routing`, `triage`, `categories`,
//! `logging`). Every field has a default, so an empty file is a valid
//! configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    category::{CategoryTable, Handoff, RequestCategory},
    error::{ConfigError, CoreError},
    pairing::DEFAULT_CAPACITY,
    triage::TriageSettings,
};

/// Environment variables overriding staff room identifiers
pub const MEDICAL_ROOM_ENV: &str = "CAREBRIDGE_MEDICAL_ROOM";
pub const SOCIAL_ROOM_ENV: &str = "CAREBRIDGE_SOCIAL_ROOM";
pub const NEW_MEMBERS_ROOM_ENV: &str = "CAREBRIDGE_NEW_MEMBERS_ROOM";

/// Resolve a path relative to a base directory
/// If the path is absolute, return it as-is
/// If the path is relative, resolve it relative to the base directory
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarebridgeConfig {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub triage: TriageConfig,

    #[serde(default)]
    pub categories: CategoryTable,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue, capacity and staleness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Maximum number of concurrent conversations
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// A request waiting this long is reported to its staff room
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: u32,

    /// How often the stale sweep runs
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_stale_after_minutes() -> u32 {
    15
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            stale_after_minutes: default_stale_after_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl RoutingConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::minutes(i64::from(self.stale_after_minutes))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

/// Where the question graph and string catalogs live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageConfig {
    #[serde(default = "default_graph_path")]
    pub graph_path: PathBuf,

    /// Directory of `<language>.json` catalogs
    #[serde(default = "default_strings_dir")]
    pub strings_dir: PathBuf,

    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_finish_answer_id")]
    pub finish_answer_id: String,
}

fn default_graph_path() -> PathBuf {
    PathBuf::from("data/questions.json")
}

fn default_strings_dir() -> PathBuf {
    PathBuf::from("data/strings")
}

fn default_language() -> String {
    TriageSettings::default().default_language
}

fn default_finish_answer_id() -> String {
    TriageSettings::default().finish_answer_id
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            graph_path: default_graph_path(),
            strings_dir: default_strings_dir(),
            default_language: default_language(),
            finish_answer_id: default_finish_answer_id(),
        }
    }
}

impl TriageConfig {
    pub fn settings(&self) -> TriageSettings {
        TriageSettings {
            default_language: self.default_language.clone(),
            finish_answer_id: self.finish_answer_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `<directory>/<file_name>` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

fn default_log_file_name() -> String {
    "bot.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_log_file_name(),
        }
    }
}

// Utility functions

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<CarebridgeConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "readable TOML file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    let mut config: CarebridgeConfig =
        toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "content".to_string(),
            expected: "valid TOML configuration".to_string(),
            cause: ConfigError::TomlParse(e.to_string()),
        })?;

    // Resolve paths relative to the config file's directory
    let base_dir = path.parent().unwrap_or(Path::new("."));
    config.resolve_paths(base_dir);

    Ok(config)
}

/// Save configuration to a TOML file
pub async fn save_config(config: &CarebridgeConfig, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: parent.display().to_string(),
                field: "directory".to_string(),
                expected: "writable directory".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "serialization".to_string(),
        expected: "serializable config structure".to_string(),
        cause: ConfigError::TomlSerialize(e.to_string()),
    })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "writable file location".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    Ok(())
}

/// Standard config file locations
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Project-specific config
    paths.push(PathBuf::from("carebridge.toml"));

    // User config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("carebridge").join("config.toml"));
    }

    // Home directory fallback
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".carebridge").join("config.toml"));
    }

    paths
}

/// First standard location that holds a config file
pub fn find_config_file() -> Option<PathBuf> {
    config_paths().into_iter().find(|path| path.exists())
}

/// Load configuration from standard locations
pub async fn load_config_from_standard_locations() -> Result<CarebridgeConfig> {
    match find_config_file() {
        Some(path) => load_config(&path).await,
        None => Ok(CarebridgeConfig::default()),
    }
}

/// Room override variables currently set to a non-blank value
pub fn env_overrides_in_effect() -> Vec<&'static str> {
    overrides_in_effect(|key| std::env::var(key).ok())
}

fn overrides_in_effect(lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    [MEDICAL_ROOM_ENV, SOCIAL_ROOM_ENV, NEW_MEMBERS_ROOM_ENV]
        .into_iter()
        .filter(|key| lookup(*key).is_some_and(|room| !room.trim().is_empty()))
        .collect()
}

impl CarebridgeConfig {
    /// Load configuration from standard locations
    pub async fn load() -> Result<Self> {
        load_config_from_standard_locations().await
    }

    /// Load configuration from a specific file
    pub async fn load_from(path: &Path) -> Result<Self> {
        load_config(path).await
    }

    /// Save configuration to a specific file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        save_config(self, path).await
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        self.triage.graph_path = resolve_path(base_dir, &self.triage.graph_path);
        self.triage.strings_dir = resolve_path(base_dir, &self.triage.strings_dir);
        if let Some(directory) = &self.logging.directory {
            self.logging.directory = Some(resolve_path(base_dir, directory));
        }
    }

    /// Apply staff room overrides from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let room = |key: &str| lookup(key).filter(|room| !room.trim().is_empty());
        for (category, key) in [
            (RequestCategory::Medical, MEDICAL_ROOM_ENV),
            (RequestCategory::Social, SOCIAL_ROOM_ENV),
        ] {
            if let Some(room) = room(key) {
                self.categories.route_mut(category).room = room;
            }
        }
        if let Some(room) = room(NEW_MEMBERS_ROOM_ENV) {
            self.categories.handoff_mut(Handoff::NewMembers).room = room;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = CarebridgeConfig::default();
        assert_eq!(config.routing.capacity, 100);
        assert_eq!(config.routing.stale_after(), Duration::minutes(15));
        assert_eq!(config.triage.default_language, "en");
        assert_eq!(config.categories.medical.token_prefix, "doctor");
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config: CarebridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.routing, RoutingConfig::default());
        assert_eq!(config.triage, TriageConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = CarebridgeConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[routing]"));
        assert!(toml.contains("[triage]"));
        assert!(toml.contains("[categories.medical]"));
        assert!(toml.contains("[categories.new_members]"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CarebridgeConfig::default();
        config.apply_overrides(|key| match key {
            MEDICAL_ROOM_ENV => Some("-1001".to_string()),
            SOCIAL_ROOM_ENV => Some("  ".to_string()),
            NEW_MEMBERS_ROOM_ENV => Some("-1003".to_string()),
            _ => None,
        });
        assert_eq!(config.categories.medical.room, "-1001");
        assert_eq!(config.categories.social.room, "psychologists");
        assert_eq!(config.categories.new_members.room, "-1003");

        let in_effect = overrides_in_effect(|key| match key {
            MEDICAL_ROOM_ENV => Some("-1001".to_string()),
            SOCIAL_ROOM_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(in_effect, vec![MEDICAL_ROOM_ENV]);
    }

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carebridge.toml");
        std::fs::write(
            &path,
            r#"
            [routing]
            capacity = 3

            [triage]
            graph_path = "graph/questions.json"
            strings_dir = "/srv/strings"
            "#,
        )
        .unwrap();

        let config = CarebridgeConfig::load_from(&path).await.unwrap();
        assert_eq!(config.routing.capacity, 3);
        assert_eq!(config.routing.stale_after_minutes, 15);
        assert_eq!(
            config.triage.graph_path,
            dir.path().join("graph/questions.json")
        );
        assert_eq!(config.triage.strings_dir, PathBuf::from("/srv/strings"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CarebridgeConfig::default();
        config.routing.capacity = 7;
        config.save_to(&path).await.unwrap();

        let loaded = CarebridgeConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.routing.capacity, 7);
        assert_eq!(loaded.categories, config.categories);
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[routing\ncapacity = ").unwrap();

        let err = CarebridgeConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError { .. }));
    }
}
