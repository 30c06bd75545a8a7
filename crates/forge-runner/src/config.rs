use forge_bot::{OrchestratorConfig, WaitConfig};
use forge_core::model::table::ProbabilityTable;
use forge_core::planner::Planner;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

const DEFAULT_CONFIDENCE: f64 = 0.90;
const DEFAULT_FLUSH_EVERY_N: usize = 25;
const DEFAULT_FLUSH_EVERY_SECS: u64 = 10;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root runner configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunnerConfig {
    pub run_id: String,
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    pub surface: SurfaceConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunnerConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: RunnerConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.planning.validate()?;
        self.timing.validate()?;
        self.commands.validate()?;
        self.surface.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.stats.validate()?;
        self.limits.validate()?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        let summary_json = resolve_template(&self.run_id, &self.outputs.summary_json);
        let summary_md = summary_json.with_extension("md");
        ResolvedOutputs {
            events_jsonl: resolve_template(&self.run_id, &self.outputs.events_jsonl),
            summary_json,
            summary_md,
        }
    }

    pub fn planner(&self) -> Result<Planner, ValidationError> {
        Ok(Planner::new(self.planning.table()?))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let timing = &self.timing;
        OrchestratorConfig {
            confidence: self.planning.confidence,
            enhance_command: self.commands.enhance.clone(),
            sell_command: self.commands.sell.clone(),
            after_command: Duration::from_millis(timing.after_command_ms),
            waiting_retry: Duration::from_millis(timing.waiting_retry_ms),
            loop_gap: Duration::from_millis(timing.loop_gap_ms),
            init_attempts: timing.init_attempts,
            init_retry: Duration::from_millis(timing.init_retry_ms),
            max_actions: self.limits.max_actions,
            wait: WaitConfig {
                poll_interval: Duration::from_millis(timing.poll_interval_ms),
                max_wait: Duration::from_millis(timing.max_wait_ms),
                sell_max_wait: Duration::from_millis(timing.sell_max_wait_ms),
                enhance_command: self.commands.enhance.clone(),
            },
        }
    }
}

/// Target selection settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlanningConfig {
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Replacement tables; the observed standard tables when absent.
    #[serde(default)]
    pub tables: Option<TablesConfig>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            tables: None,
        }
    }
}

impl PlanningConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.confidence.is_finite() || self.confidence <= 0.0 || self.confidence > 1.0 {
            return Err(ValidationError::InvalidField {
                field: "planning.confidence".to_string(),
                message: format!("{} is not in (0, 1]", self.confidence),
            });
        }
        self.table().map(|_| ())
    }

    pub fn table(&self) -> Result<ProbabilityTable, ValidationError> {
        match &self.tables {
            Some(tables) => tables.to_table(),
            None => Ok(ProbabilityTable::standard()),
        }
    }
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Raw table columns as written in YAML.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TablesConfig {
    pub success: Vec<f64>,
    pub destroy: Vec<f64>,
    pub cost: Vec<u64>,
    pub sell: Vec<f64>,
}

impl TablesConfig {
    pub fn to_table(&self) -> Result<ProbabilityTable, ValidationError> {
        let success = column("planning.tables.success", &self.success)?;
        let destroy = column("planning.tables.destroy", &self.destroy)?;
        let cost = column("planning.tables.cost", &self.cost)?;
        let sell = column("planning.tables.sell", &self.sell)?;
        ProbabilityTable::new(success, destroy, cost, sell).map_err(|err| {
            ValidationError::InvalidField {
                field: "planning.tables".to_string(),
                message: err.to_string(),
            }
        })
    }
}

fn column<T: Copy, const N: usize>(field: &str, values: &[T]) -> Result<[T; N], ValidationError> {
    values
        .try_into()
        .map_err(|_| ValidationError::InvalidField {
            field: field.to_string(),
            message: format!("expected {N} entries, found {}", values.len()),
        })
}

/// Polling cadence and deadlines, all in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
    pub sell_max_wait_ms: u64,
    pub after_command_ms: u64,
    pub waiting_retry_ms: u64,
    pub loop_gap_ms: u64,
    pub init_attempts: u32,
    pub init_retry_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 180,
            max_wait_ms: 15_000,
            sell_max_wait_ms: 8_000,
            after_command_ms: 30,
            waiting_retry_ms: 600,
            loop_gap_ms: 30,
            init_attempts: 12,
            init_retry_ms: 250,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("timing.poll_interval_ms", self.poll_interval_ms),
            ("timing.max_wait_ms", self.max_wait_ms),
            ("timing.sell_max_wait_ms", self.sell_max_wait_ms),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.init_attempts == 0 {
            return Err(ValidationError::InvalidField {
                field: "timing.init_attempts".to_string(),
                message: "at least one initial read is required".to_string(),
            });
        }

        Ok(())
    }
}

/// Chat command strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    pub enhance: String,
    pub sell: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enhance: forge_core::transcript::ENHANCE_COMMAND.to_string(),
            sell: forge_core::transcript::SELL_COMMAND.to_string(),
        }
    }
}

impl CommandsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [("commands.enhance", &self.enhance), ("commands.sell", &self.sell)] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "command must not be empty".to_string(),
                });
            }
        }

        if self.enhance.trim() == self.sell.trim() {
            return Err(ValidationError::InvalidField {
                field: "commands".to_string(),
                message: "enhance and sell commands must differ".to_string(),
            });
        }

        Ok(())
    }
}

/// Which chat surface to drive.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    pub kind: SurfaceKind,
    /// Seed for the simulated game; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl SurfaceConfig {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.params.is_null() {
            self.params = serde_yaml::Value::Mapping(Default::default());
        }
        if !self.params.is_mapping() {
            return Err(ValidationError::InvalidField {
                field: "surface.params".to_string(),
                message: "expected a mapping".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    External,
    Simulated,
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub events_jsonl: String,
    pub summary_json: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.events_jsonl", &self.events_jsonl),
            ("outputs.summary_json", &self.summary_json),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 || resolved.file_name().is_none() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }

        if self.events_jsonl == self.summary_json {
            return Err(ValidationError::InvalidField {
                field: "outputs".to_string(),
                message: "event log and summary must be different files".to_string(),
            });
        }

        Ok(())
    }
}

/// Event log flushing policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    pub flush_every_n: usize,
    pub flush_every_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            flush_every_n: DEFAULT_FLUSH_EVERY_N,
            flush_every_secs: DEFAULT_FLUSH_EVERY_SECS,
        }
    }
}

impl StatsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.flush_every_n == 0 {
            return Err(ValidationError::InvalidField {
                field: "stats.flush_every_n".to_string(),
                message: "must flush at least every record".to_string(),
            });
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_every_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_actions: Option<u64>,
}

impl LimitsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_actions == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "limits.max_actions".to_string(),
                message: "action limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration defaults to human-readable stderr output.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub events_jsonl: PathBuf,
    pub summary_json: PathBuf,
    /// Markdown highlights written next to the JSON summary.
    pub summary_md: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
