use crate::error::ConfigError;
use crate::sandbox::SandboxConfig;
use crate::scheduler::{Schedule, SchedulerConfig};
use crate::security::{AllowAllApproval, AllowListApproval, ApprovalGate, SecretProvider};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Prefix for environment variables that inject secrets, e.g. `SCRIPTCRON_SECRET_API_TOKEN`.
pub const SECRET_ENV_PREFIX: &str = "SCRIPTCRON_SECRET_";

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding `*.rhai` scripts. `~` is expanded.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,

    #[serde(default)]
    pub sandbox: SandboxSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Secret name to value. Values never leave the process unredacted.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

fn default_scripts_dir() -> String {
    "~/.scriptcron/scripts".into()
}

impl Default for Config {
    fn default() -> Self {
        let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        Self {
            config_path: home.join(".scriptcron").join("config.toml"),
            scripts_dir: default_scripts_dir(),
            sandbox: SandboxSection::default(),
            scheduler: SchedulerSection::default(),
            approval: ApprovalConfig::default(),
            logging: LoggingConfig::default(),
            secrets: BTreeMap::new(),
            schedules: Vec::new(),
        }
    }
}

// ── Sandbox ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSection {
    /// Wall-clock limit for one script execution (default: 30000)
    #[serde(default = "default_max_execution_ms")]
    pub max_execution_ms: u64,
    /// Timeout for a single `http::` request (default: 30)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
    #[serde(default = "default_max_collection_size")]
    pub max_array_size: usize,
    #[serde(default = "default_max_collection_size")]
    pub max_map_size: usize,
}

fn default_max_execution_ms() -> u64 {
    30_000
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    SandboxConfig::default().user_agent
}

fn default_max_call_depth() -> usize {
    64
}

fn default_max_string_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_collection_size() -> usize {
    100_000
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            max_execution_ms: default_max_execution_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            max_call_depth: default_max_call_depth(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_collection_size(),
            max_map_size: default_max_collection_size(),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
}

fn default_script_timeout_secs() -> u64 {
    5 * 60
}

fn default_agent_timeout_secs() -> u64 {
    10 * 60
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            script_timeout_secs: default_script_timeout_secs(),
            agent_timeout_secs: default_agent_timeout_secs(),
        }
    }
}

// ── Approval ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Skip the allow-list entirely. Development only.
    #[serde(default)]
    pub allow_all: bool,
    /// Approved script files, e.g. `"digest.rhai"`.
    #[serde(default)]
    pub approved: Vec<String>,
}

// ── Logging ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let scriptcron_dir = home.join(".scriptcron");
        let config_path = scriptcron_dir.join("config.toml");

        if !scriptcron_dir.exists() {
            fs::create_dir_all(&scriptcron_dir).context("Failed to create .scriptcron directory")?;
            fs::create_dir_all(scriptcron_dir.join("scripts"))
                .context("Failed to create scripts directory")?;
        }

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Read and validate a config file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        );
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "SCRIPTCRON_SCRIPTS_DIR" => self.scripts_dir = value,
                "SCRIPTCRON_LOG" => self.logging.level = value,
                "SCRIPTCRON_MAX_EXECUTION_MS" => match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => self.sandbox.max_execution_ms = ms,
                    _ => tracing::warn!(value = %value, "ignoring invalid SCRIPTCRON_MAX_EXECUTION_MS"),
                },
                _ => {
                    if let Some(name) = key.strip_prefix(SECRET_ENV_PREFIX)
                        && !name.is_empty()
                    {
                        self.secrets.insert(name.to_string(), value);
                    }
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("sandbox.max_execution_ms", self.sandbox.max_execution_ms),
            ("sandbox.http_timeout_secs", self.sandbox.http_timeout_secs),
            ("scheduler.script_timeout_secs", self.scheduler.script_timeout_secs),
            ("scheduler.agent_timeout_secs", self.scheduler.agent_timeout_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);
        if let Some((field, _)) = zero {
            return Err(ConfigError::Validation(format!("{field} must be > 0")));
        }
        if self.scripts_dir.trim().is_empty() {
            return Err(ConfigError::Validation("scripts_dir must not be empty".into()));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Validation(format!(
                "unknown log level `{}`",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    // ── Component settings ───────────────────────────────────────

    pub fn scripts_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.scripts_dir).into_owned())
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            max_execution: Duration::from_millis(self.sandbox.max_execution_ms),
            http_timeout: Duration::from_secs(self.sandbox.http_timeout_secs),
            user_agent: self.sandbox.user_agent.clone(),
            max_call_depth: self.sandbox.max_call_depth,
            max_string_size: self.sandbox.max_string_size,
            max_array_size: self.sandbox.max_array_size,
            max_map_size: self.sandbox.max_map_size,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            script_timeout: Duration::from_secs(self.scheduler.script_timeout_secs),
            agent_timeout: Duration::from_secs(self.scheduler.agent_timeout_secs),
        }
    }

    pub fn secret_provider(&self) -> SecretProvider {
        SecretProvider::from_map(self.secrets.clone().into_iter().collect())
    }

    pub fn approval_gate(&self) -> Arc<dyn ApprovalGate> {
        if self.approval.allow_all {
            tracing::warn!("approval.allow_all is set; every script may run");
            Arc::new(AllowAllApproval)
        } else {
            Arc::new(AllowListApproval::new(self.approval.approved.iter().cloned()))
        }
    }
}
