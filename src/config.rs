//! Configuration for cardboard, read from `.cardboard/cardboard.toml`.
//!
//! Values are layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [board]
//! title = "Roadmap"
//!
//! [gateway]
//! data_file = "board.json"   # relative to .cardboard/
//!
//! [log]
//! format = "json"            # "text" (default) or "json"
//! level = "cardboard=debug"  # EnvFilter directive
//! ```
//!
//! Environment overrides: `CARDBOARD_DATA` (data file) and
//! `CARDBOARD_LOG_FORMAT` (log format). `CARDBOARD_LOG` is read by the
//! log filter directly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".cardboard";
pub const CONFIG_FILE: &str = "cardboard.toml";
pub const DATA_ENV: &str = "CARDBOARD_DATA";
pub const LOG_FORMAT_ENV: &str = "CARDBOARD_LOG_FORMAT";
pub const LOG_FILTER_ENV: &str = "CARDBOARD_LOG";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: text, json", s),
        }
    }
}

/// `[board]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSection {
    /// Title given to a board created on first use
    #[serde(default = "default_board_title")]
    pub title: String,
}

fn default_board_title() -> String {
    "Board".to_string()
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            title: default_board_title(),
        }
    }
}

/// `[gateway]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// JSON snapshot backing the file gateway; relative paths resolve
    /// against the config directory
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("board.json")
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive when `CARDBOARD_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// The complete cardboard.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CardboardToml {
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub log: LogSection,
}

impl CardboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse cardboard.toml")
    }

    /// Load `cardboard.toml` from `config_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize cardboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Data file, with fallback to the environment variable.
    pub fn data_file(&self) -> PathBuf {
        match std::env::var(DATA_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.gateway.data_file.clone(),
        }
    }

    /// Log format; a valid `CARDBOARD_LOG_FORMAT` overrides the file.
    pub fn log_format(&self) -> LogFormat {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.log.format)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.board.title.trim().is_empty() {
            warnings.push("board.title is empty; new boards will be untitled".to_string());
        }

        if self.gateway.data_file.as_os_str().is_empty() {
            warnings.push("gateway.data_file is empty".to_string());
        } else if self.gateway.data_file.extension().and_then(|e| e.to_str()) != Some("json") {
            warnings.push(format!(
                "gateway.data_file '{}' does not end in .json",
                self.gateway.data_file.display()
            ));
        }

        if let Some(level) = &self.log.level
            && tracing_subscriber::EnvFilter::try_new(level).is_err()
        {
            warnings.push(format!("Invalid log.level '{}': not a filter directive", level));
        }

        if let Ok(format) = std::env::var(LOG_FORMAT_ENV)
            && format.parse::<LogFormat>().is_err()
        {
            warnings.push(format!(
                "{} '{}' is not a log format and is ignored",
                LOG_FORMAT_ENV, format
            ));
        }

        warnings
    }
}

/// Resolved configuration for one invocation.
///
/// It merges settings from:
/// 1. cardboard.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct CardboardConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .cardboard directory
    pub config_dir: PathBuf,
    /// Parsed cardboard.toml configuration
    pub toml: CardboardToml,
    /// CLI override: verbose logging
    pub verbose: bool,
    /// CLI override for the data file
    pub cli_data_file: Option<PathBuf>,
}

impl CardboardConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = CardboardToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
            cli_data_file: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        data_file: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_data_file = data_file;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Data file (CLI → env → file), resolved against the config directory.
    pub fn data_file(&self) -> PathBuf {
        let path = self
            .cli_data_file
            .clone()
            .unwrap_or_else(|| self.toml.data_file());
        if path.is_absolute() {
            path
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn board_title(&self) -> &str {
        &self.toml.board.title
    }

    pub fn log_format(&self) -> LogFormat {
        self.toml.log_format()
    }

    /// Default filter directive: `--verbose` → `debug`, else file, else `warn`.
    pub fn log_level(&self) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        self.toml
            .log
            .level
            .clone()
            .unwrap_or_else(|| "warn".to_string())
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
