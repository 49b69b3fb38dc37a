//! Host configuration.
//!
//! ```toml
//! [scheduler]
//! kind = "queue"          # or "tokio"
//! drain_budget = 100000   # queue only
//! initial_capacity = 64
//! yield_every = 256       # tokio only
//!
//! [diagnostics]
//! unhandled_rejections = "warn"
//! log_filter = "aplus_core=debug"
//! ```

use std::env;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::de::Error as TomlError;

pub use aplus_core::UnhandledRejections;

/// Overrides the default config location.
pub const CONFIG_ENV: &str = "APLUS_CONFIG";

const DEFAULT_INITIAL_CAPACITY: usize = 64;
const DEFAULT_YIELD_EVERY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TomlError,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AplusConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Which host runs promise reactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// A [`JobQueue`](aplus_core::JobQueue) drained by the embedder.
    #[default]
    Queue,
    /// A driver task on the ambient tokio runtime.
    Tokio,
}

impl SchedulerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Tokio => "tokio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub kind: SchedulerKind,
    /// Most jobs one drain of the queue may run. Absent means unbounded.
    #[serde(default)]
    pub drain_budget: Option<NonZeroUsize>,
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Jobs the tokio driver runs before yielding back to the runtime.
    #[serde(default = "default_yield_every")]
    pub yield_every: NonZeroUsize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            drain_budget: None,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            yield_every: default_yield_every(),
        }
    }
}

const fn default_initial_capacity() -> usize {
    DEFAULT_INITIAL_CAPACITY
}

fn default_yield_every() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_YIELD_EVERY).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub unhandled_rejections: UnhandledRejections,
    /// Tracing filter directive used when `APLUS_LOG` is unset.
    pub log_filter: Option<String>,
}

impl AplusConfig {
    /// Load from `$APLUS_CONFIG`, falling back to `~/.aplus/config.toml`.
    ///
    /// Returns `Ok(None)` when no location can be determined or the file does
    /// not exist.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = Self::path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file");
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TomlError> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path(env::var_os(CONFIG_ENV).map(PathBuf::from))
    }
}

fn config_path(override_path: Option<PathBuf>) -> Option<PathBuf> {
    override_path
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| dirs::home_dir().map(|home| home.join(".aplus").join("config.toml")))
}
