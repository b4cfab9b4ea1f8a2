use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level settings ────────────────────────────────────────

/// Process-wide settings, resolved once at startup and handed to
/// constructors. Nothing below `main` reads the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub delegate: DelegateSettings,
}

impl Settings {
    /// Return the default config file path: `<config_dir>/linewire/config.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linewire").join("config.toml"))
    }

    /// Load settings from `path`, or from the default path when it exists.
    ///
    /// An explicitly named file must exist; a missing default file just
    /// yields the built-in defaults. Environment overrides are applied on
    /// top of whatever the file provided.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `LINEWIRE_*` environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(env_opt)
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(name) = lookup("LINEWIRE_SERVER_NAME") {
            self.server.name = name;
        }
        if let Some(marker) = lookup("LINEWIRE_ECHO_MARKER") {
            self.server.echo_marker = marker;
        }
        if let Some(dir) = lookup("LINEWIRE_CONTEXT_DIR") {
            self.context.dir = PathBuf::from(dir);
        }
        if let Some(program) = lookup("LINEWIRE_DELEGATE_PROGRAM") {
            self.delegate.program = program;
        }
        if let Some(secs) = lookup("LINEWIRE_DELEGATE_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.delegate.timeout_secs = secs,
                Err(_) => tracing::warn!(
                    value = %secs,
                    "LINEWIRE_DELEGATE_TIMEOUT_SECS is not a number, keeping {}",
                    self.delegate.timeout_secs
                ),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delegate.program.trim().is_empty() {
            return Err(ConfigError::Invalid("delegate.program must not be empty".into()));
        }
        if self.delegate.timeout_secs == 0 {
            return Err(ConfigError::Invalid("delegate.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings loaded:");
        tracing::info!(
            "  server:    name={}, echo_marker={}",
            self.server.name,
            self.server.echo_marker
        );
        tracing::info!("  context:   dir={}", self.context.dir.display());
        tracing::info!(
            "  delegate:  program={}, timeout={}s",
            self.delegate.program,
            self.delegate.timeout_secs
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name reported in responses and `initialize`.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prefix written before echoed non-protocol lines.
    #[serde(default = "default_echo_marker")]
    pub echo_marker: String,
}

fn default_server_name() -> String {
    "linewire".to_string()
}

fn default_echo_marker() -> String {
    "[ECHO]".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            echo_marker: default_echo_marker(),
        }
    }
}

// ── Context store ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Namespace directory holding one record per key.
    #[serde(default = "default_context_dir")]
    pub dir: PathBuf,
}

fn default_context_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("linewire").join("context"))
        .unwrap_or_else(|| PathBuf::from(".linewire/context"))
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            dir: default_context_dir(),
        }
    }
}

// ── External delegate ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateSettings {
    /// Executable looked up on PATH.
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the context and prompt arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag preceding the prompt. `None` passes the prompt positionally.
    #[serde(default = "default_prompt_flag")]
    pub prompt_flag: Option<String>,
    /// Flag preceding the context file path. `None` never passes one.
    #[serde(default = "default_context_flag")]
    pub context_flag: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "gemini".to_string()
}

fn default_prompt_flag() -> Option<String> {
    Some("--prompt".to_string())
}

fn default_context_flag() -> Option<String> {
    Some("--context-file".to_string())
}

fn default_timeout_secs() -> u64 {
    120
}

impl DelegateSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The prompt flag, treating an empty string as "positional".
    pub fn prompt_flag(&self) -> Option<&str> {
        self.prompt_flag.as_deref().filter(|f| !f.is_empty())
    }

    /// The context-file flag, treating an empty string as "never pass one".
    pub fn context_flag(&self) -> Option<&str> {
        self.context_flag.as_deref().filter(|f| !f.is_empty())
    }
}

impl Default for DelegateSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            prompt_flag: default_prompt_flag(),
            context_flag: default_context_flag(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
