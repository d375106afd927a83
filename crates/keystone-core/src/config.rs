use crate::entry::Severity;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Rule line written before and after each flat-file entry.
pub const DEFAULT_RULE: &str = "----------------------------------------";

/// Main configuration for the logging pipeline.
///
/// Missing sections parse as empty; the `Default` impl is the populated
/// example configuration that `--print-config` emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Writer-level settings (special source designation)
    #[serde(default)]
    pub writer: WriterConfig,

    /// Global filter chain, applied in order
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    /// Sink definitions, referenced by name from sources
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    /// Log source definitions
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            writer: WriterConfig {
                unprocessed_source: Some("Unprocessed".to_string()),
                error_source: None,
            },
            filters: vec![
                FilterConfig::Priority { min: 2, max: 99 },
                FilterConfig::Enabled { enabled: true },
                FilterConfig::Category {
                    categories: vec!["BlockedByFilter".to_string()],
                    mode: CategoryFilterMode::AllowAllExceptDenied,
                },
            ],
            sinks: vec![
                SinkConfig::Console {
                    name: "console".to_string(),
                    format: "pretty".to_string(),
                    use_stderr: false,
                },
                SinkConfig::FlatFile {
                    name: "disk".to_string(),
                    path: "logs/keystone.log".to_string(),
                    format: "brief".to_string(),
                    header: DEFAULT_RULE.to_string(),
                    footer: DEFAULT_RULE.to_string(),
                },
                SinkConfig::RollingFlatFile {
                    name: "rolling".to_string(),
                    path: "logs/rolling.log".to_string(),
                    format: "extended".to_string(),
                    header: DEFAULT_RULE.to_string(),
                    footer: DEFAULT_RULE.to_string(),
                    roll_size_kb: 20,
                    roll_interval: RollInterval::None,
                    max_archives: 3,
                    compress: false,
                },
                SinkConfig::FlatFile {
                    name: "unprocessed-file".to_string(),
                    path: "logs/unprocessed.log".to_string(),
                    format: "extended".to_string(),
                    header: DEFAULT_RULE.to_string(),
                    footer: DEFAULT_RULE.to_string(),
                },
            ],
            sources: vec![
                SourceConfig {
                    name: "General".to_string(),
                    min_severity: Severity::Verbose,
                    enabled: true,
                    sinks: vec!["console".to_string()],
                },
                SourceConfig {
                    name: "DiskFiles".to_string(),
                    min_severity: Severity::Verbose,
                    enabled: true,
                    sinks: vec!["disk".to_string()],
                },
                SourceConfig {
                    name: "Important".to_string(),
                    min_severity: Severity::Verbose,
                    enabled: true,
                    sinks: vec!["console".to_string(), "rolling".to_string()],
                },
                SourceConfig {
                    name: "Unprocessed".to_string(),
                    min_severity: Severity::Verbose,
                    enabled: true,
                    sinks: vec!["unprocessed-file".to_string()],
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("failed to read config file: {}", e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("failed to serialize config: {}", e)))
    }

    /// Check referential integrity: unique names, and every sink a source
    /// names must be defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut sink_names = HashSet::new();
        for sink in &self.sinks {
            if !sink_names.insert(sink.name()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate sink name '{}'",
                    sink.name()
                )));
            }
        }

        let mut source_names = HashSet::new();
        for source in &self.sources {
            if !source_names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
            for sink in &source.sinks {
                if !sink_names.contains(sink.as_str()) {
                    return Err(ConfigError::UnknownSink(sink.clone()));
                }
            }
        }

        for special in [&self.writer.unprocessed_source, &self.writer.error_source]
            .into_iter()
            .flatten()
        {
            if !source_names.contains(special.as_str()) {
                return Err(ConfigError::UnknownSource(special.clone()));
            }
        }

        Ok(())
    }
}

/// Writer-level settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Source that receives entries whose categories match nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unprocessed_source: Option<String>,

    /// Source that receives reports of sink dispatch failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_source: Option<String>,
}

/// Category filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryFilterMode {
    /// Log everything except entries carrying a listed category
    #[default]
    AllowAllExceptDenied,
    /// Log only entries carrying a listed category
    DenyAllExceptAllowed,
}

/// Global filter definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Accept entries whose priority lies in `min..=max`; unset priorities
    /// always pass
    Priority {
        #[serde(default)]
        min: i32,
        #[serde(default = "default_max_priority")]
        max: i32,
    },
    /// Global logging kill switch
    Enabled {
        #[serde(default = "default_true")]
        enabled: bool,
    },
    /// Category allow/deny list
    Category {
        #[serde(default)]
        categories: Vec<String>,
        #[serde(default)]
        mode: CategoryFilterMode,
    },
}

/// Roll trigger interval for the rolling flat-file sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollInterval {
    #[default]
    None,
    Hourly,
    Daily,
}

/// Overflow policy for the asynchronous sink wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicyConfig {
    /// Block the caller until space frees up (bounded by `block_timeout_ms`)
    #[default]
    Block,
    /// Evict the oldest queued entry to make room
    DropOldest,
}

/// Sink definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    Console {
        name: String,
        /// "pretty" for one-line output, "brief"/"extended" or a custom
        /// template for field-per-line output
        #[serde(default = "default_console_format")]
        format: String,
        #[serde(default)]
        use_stderr: bool,
    },
    FlatFile {
        name: String,
        path: String,
        #[serde(default = "default_format")]
        format: String,
        #[serde(default = "default_rule")]
        header: String,
        #[serde(default = "default_rule")]
        footer: String,
    },
    RollingFlatFile {
        name: String,
        path: String,
        #[serde(default = "default_format")]
        format: String,
        #[serde(default = "default_rule")]
        header: String,
        #[serde(default = "default_rule")]
        footer: String,
        #[serde(default = "default_roll_size_kb")]
        roll_size_kb: u64,
        #[serde(default)]
        roll_interval: RollInterval,
        #[serde(default = "default_max_archives")]
        max_archives: usize,
        #[serde(default)]
        compress: bool,
    },
    Async {
        name: String,
        /// The sink this wrapper decouples from the caller
        wraps: Box<SinkConfig>,
        #[serde(default = "default_buffer_capacity")]
        buffer_capacity: usize,
        #[serde(default)]
        overflow: OverflowPolicyConfig,
        /// Bound on blocking enqueues; absent means wait indefinitely
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_timeout_ms: Option<u64>,
        /// Bound on the shutdown drain; absent means wait indefinitely
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flush_timeout_ms: Option<u64>,
    },
}

impl SinkConfig {
    pub fn name(&self) -> &str {
        match self {
            SinkConfig::Console { name, .. }
            | SinkConfig::FlatFile { name, .. }
            | SinkConfig::RollingFlatFile { name, .. }
            | SinkConfig::Async { name, .. } => name,
        }
    }
}

/// Log source definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sink names in attach order; attach order is dispatch order
    #[serde(default)]
    pub sinks: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_priority() -> i32 {
    i32::MAX
}

fn default_console_format() -> String {
    "pretty".to_string()
}

fn default_format() -> String {
    "brief".to_string()
}

fn default_rule() -> String {
    DEFAULT_RULE.to_string()
}

fn default_roll_size_kb() -> u64 {
    1024
}

fn default_max_archives() -> usize {
    3
}

fn default_buffer_capacity() -> usize {
    30_000
}

fn default_min_severity() -> Severity {
    Severity::Verbose
}
