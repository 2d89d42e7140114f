//! Configuration at ~/.config/davdedup/config.toml
//!
//! Every field has a default, so a missing file (or a missing section) is
//! equivalent to the defaults. Command line flags are applied on top by
//! `main` before [`Settings::validate`] runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use davdedup_core::{
    BirthdayRules, ClusterPolicy, DedupError, DedupOptions, MatchRules, MatchStrategy,
    SelectionWeights, Threshold,
};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when no password is configured.
pub const PASSWORD_ENV: &str = "DAVDEDUP_PASSWORD";

fn default_timeout_secs() -> u64 {
    30
}

fn default_birthday_calendar() -> String {
    "Anniversaire".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retry_attempts() -> u32 {
    davdedup_core::plan::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_level() -> String {
    "INFO".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub detection: DetectionSettings,
    pub selection: SelectionWeights,
    pub birthdays: BirthdaySettings,
    pub safety: SafetySettings,
    pub advanced: AdvancedSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the Nextcloud instance, e.g. https://cloud.example.org
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: String::new(),
            username: String::new(),
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Kept as a raw integer so out-of-range values are reported by
    /// `validate` rather than as a TOML error.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: i64,
    #[serde(default = "default_true")]
    pub by_email: bool,
    #[serde(default = "default_true")]
    pub by_phone: bool,
    #[serde(default = "default_true")]
    pub by_name_similarity: bool,
    #[serde(default)]
    pub strategy: MatchStrategy,
    #[serde(default)]
    pub clustering: ClusterPolicy,
}

fn default_threshold() -> i64 {
    Threshold::default().value().into()
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings {
            similarity_threshold: default_threshold(),
            by_email: true,
            by_phone: true,
            by_name_similarity: true,
            strategy: MatchStrategy::default(),
            clustering: ClusterPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthdaySettings {
    /// Display name of the birthday calendar
    #[serde(default = "default_birthday_calendar")]
    pub calendar: String,
    #[serde(flatten)]
    pub rules: BirthdayRules,
}

impl Default for BirthdaySettings {
    fn default() -> Self {
        BirthdaySettings {
            calendar: default_birthday_calendar(),
            rules: BirthdayRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySettings {
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
    /// Save every record before deleting it
    #[serde(default = "default_true")]
    pub auto_backup: bool,
    /// Default: <data dir>/davdedup/backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_directory: Option<PathBuf>,
}

impl Default for SafetySettings {
    fn default() -> Self {
        SafetySettings {
            require_confirmation: true,
            auto_backup: true,
            backup_directory: None,
        }
    }
}

impl SafetySettings {
    /// Where backups go, `None` when they are disabled.
    pub fn backup_root(&self) -> Result<Option<PathBuf>> {
        if !self.auto_backup {
            return Ok(None);
        }
        if let Some(ref dir) = self.backup_directory {
            return Ok(Some(dir.clone()));
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(Some(data_dir.join("davdedup").join("backups")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Pause between two attempts of the same call
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        AdvancedSettings {
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// DEBUG, INFO, WARNING or ERROR
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: default_level(),
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<LevelFilter, DedupError> {
        match self.level.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LevelFilter::Debug),
            "INFO" => Ok(LevelFilter::Info),
            "WARNING" | "WARN" => Ok(LevelFilter::Warn),
            "ERROR" => Ok(LevelFilter::Error),
            other => Err(DedupError::Config(format!(
                "logging level must be one of DEBUG, INFO, WARNING, ERROR, got '{}'",
                other
            ))),
        }
    }
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("davdedup");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or from the default location. A missing default
    /// file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Settings> {
        toml::from_str(content).map_err(|e| DedupError::Config(e.to_string()).into())
    }

    /// Reject out-of-range values before anything is fetched.
    pub fn validate(&self) -> Result<(), DedupError> {
        Threshold::new(self.detection.similarity_threshold)?;

        if self.advanced.max_retry_attempts < 1 {
            return Err(DedupError::Config(
                "max_retry_attempts must be at least 1".into(),
            ));
        }

        if self.server.timeout_secs == 0 {
            return Err(DedupError::Config("timeout_secs must be positive".into()));
        }

        self.birthdays.rules.validate()?;
        self.logging.level_filter()?;

        Ok(())
    }

    /// Server settings needed for remote commands.
    pub fn validate_server(&self) -> Result<(), DedupError> {
        let url = self.server.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DedupError::Config(format!(
                "server url must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.server.username.trim().is_empty() {
            return Err(DedupError::Config("server username is required".into()));
        }
        Ok(())
    }

    pub fn dedup_options(&self) -> Result<DedupOptions, DedupError> {
        Ok(DedupOptions {
            strategy: self.detection.strategy,
            threshold: Threshold::new(self.detection.similarity_threshold)?,
            rules: MatchRules {
                by_email: self.detection.by_email,
                by_phone: self.detection.by_phone,
                by_name_similarity: self.detection.by_name_similarity,
            },
            policy: self.detection.clustering,
            weights: self.selection,
        })
    }

    /// Password from the config, the environment, or an interactive prompt.
    pub fn password(&self) -> Result<String> {
        if let Some(ref password) = self.server.password {
            return Ok(password.clone());
        }
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            return Ok(password);
        }
        let prompt = format!("Password for {}: ", self.server.username);
        rpassword::prompt_password(&prompt).context("Failed to read password")
    }
}
