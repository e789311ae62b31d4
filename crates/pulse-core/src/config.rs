//! Configuration loading and typed config structures for the Pulse client.
//!
//! The configuration lives in a YAML file (`pulse-config.yaml` by default).
//! Every section and field has a default, so an absent file or an empty
//! document yields a working client pointed at `http://localhost:8000/`.
//! A handful of environment variables override the file after parsing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but makes no sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Where the client "is" in the survey site.
    #[serde(default)]
    pub page: PageConfig,

    /// Duplex connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Emoji reaction settings.
    #[serde(default)]
    pub reactions: ReactionsConfig,

    /// Presenter controls.
    #[serde(default)]
    pub presenter: PresenterConfig,

    /// Load generator settings.
    #[serde(default)]
    pub loadtest: LoadTestConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file, then apply
    /// [environment overrides](Self::apply_env_overrides).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields the
    /// defaults (still subject to environment overrides).
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file), minus the missing-file case.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Read the file at `path` without consulting the environment. A
    /// missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read,
    /// plus everything [`parse`](Self::parse) returns.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::parse(&std::fs::read_to_string(path)?)
        } else {
            Self::parse("{}")
        }
    }

    /// Parse and validate configuration from a YAML string. The
    /// environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// Environment variables:
    /// - `PULSE_PAGE_URL` overrides `page.url`
    /// - `PULSE_ENABLE_EMOJIS` overrides `reactions.enabled`
    /// - `PULSE_PRESENTER_SECRET` overrides `presenter.secret`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PULSE_ENABLE_EMOJIS` is not a
    /// boolean.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, using the same variable names
    /// as [`apply_env_overrides`](Self::apply_env_overrides).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PULSE_ENABLE_EMOJIS` is not a
    /// boolean.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("PULSE_PAGE_URL") {
            self.page.url = url;
        }
        if let Some(enabled) = lookup("PULSE_ENABLE_EMOJIS") {
            self.reactions.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("invalid PULSE_ENABLE_EMOJIS: {e}")))?;
        }
        if let Some(secret) = lookup("PULSE_PRESENTER_SECRET") {
            self.presenter.secret = Some(secret);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.reconnect_delay_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "connection.reconnect_delay_ms must be positive",
            )));
        }
        if self.connection.outbound_buffer == 0 {
            return Err(ConfigError::Invalid(String::from(
                "connection.outbound_buffer must be positive",
            )));
        }
        if self.reactions.glyphs.is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "reactions.glyphs must not be empty",
            )));
        }
        if self.loadtest.max_connections == 0 {
            return Err(ConfigError::Invalid(String::from(
                "loadtest.max_connections must be positive",
            )));
        }
        Ok(())
    }
}

/// Page location settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageConfig {
    /// Full URL of the page the client is on, e.g.
    /// `http://localhost:8000/survey/abc123`.
    #[serde(default = "default_page_url")]
    pub url: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            url: default_page_url(),
        }
    }
}

/// Duplex connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Fixed delay between a close and the next connection attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Capacity of the outbound message queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl ConnectionConfig {
    /// Reconnect delay as a [`Duration`].
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Emoji reaction settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionsConfig {
    /// Whether remote reactions are rendered.
    #[serde(default)]
    pub enabled: bool,

    /// Width of the area reactions float in, in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Palette the emoji button picks from.
    #[serde(default = "default_glyphs")]
    pub glyphs: Vec<String>,
}

impl Default for ReactionsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            viewport_width: default_viewport_width(),
            glyphs: default_glyphs(),
        }
    }
}

/// Presenter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PresenterConfig {
    /// Secret posted with the next-slide action.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Load generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadTestConfig {
    /// Connections to open in total.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Time over which connections are opened evenly.
    #[serde(default = "default_ramp_up_secs")]
    pub ramp_up_secs: u64,

    /// Total test duration.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Interval between status lines.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            ramp_up_secs: default_ramp_up_secs(),
            duration_secs: default_duration_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

fn default_page_url() -> String {
    String::from("http://localhost:8000/")
}

const fn default_reconnect_delay_ms() -> u64 {
    1000
}

const fn default_outbound_buffer() -> usize {
    64
}

const fn default_viewport_width() -> u32 {
    1280
}

fn default_glyphs() -> Vec<String> {
    ["😀", "😍", "🎉", "👍", "🚀"]
        .iter()
        .map(|glyph| (*glyph).to_owned())
        .collect()
}

const fn default_max_connections() -> u32 {
    1000
}

const fn default_ramp_up_secs() -> u64 {
    60
}

const fn default_duration_secs() -> u64 {
    300
}

const fn default_report_interval_secs() -> u64 {
    5
}
