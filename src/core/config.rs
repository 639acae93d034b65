//! Explicit configuration values for asset registration and runs.
//!
//! Nothing in here is process-global: callers build a value (by hand, from
//! the environment, or from CLI flags) and pass it into registry and runner
//! construction.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::utils::{ToolError, ToolResult};

pub const ENV_TIMEOUT_MS: &str = "MOZJPEG_TIMEOUT_MS";
pub const ENV_DEBUG: &str = "MOZJPEG_DEBUG";
pub const ENV_BIN_DIR: &str = "MOZJPEG_BIN_DIR";
pub const ENV_NO_EMBEDDED: &str = "MOZJPEG_NO_EMBEDDED";

/// Where binary sources come from when a registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Register the binaries compiled into this crate
    #[serde(default = "default_true")]
    pub use_embedded: bool,
    /// Extra directory laid out like the embedded table (`<os>/[<arch>/]<tool>`)
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            use_embedded: true,
            bin_dir: None,
        }
    }
}

impl AssetConfig {
    /// Reads `MOZJPEG_NO_EMBEDDED` and `MOZJPEG_BIN_DIR`.
    pub fn from_env() -> ToolResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ToolResult<Self> {
        let no_embedded = lookup(ENV_NO_EMBEDDED)
            .map(|v| parse_bool(ENV_NO_EMBEDDED, &v))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            use_embedded: !no_embedded,
            bin_dir: lookup(ENV_BIN_DIR).filter(|v| !v.is_empty()).map(PathBuf::from),
        })
    }
}

/// Defaults applied to every runner a facade creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock bound per run in milliseconds; `None` or 0 means unbounded
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Log every command line at info level
    #[serde(default)]
    pub debug: bool,
    /// Replaces the inherited environment when set
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
}

impl RunnerConfig {
    /// Reads `MOZJPEG_TIMEOUT_MS` and `MOZJPEG_DEBUG`.
    pub fn from_env() -> ToolResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ToolResult<Self> {
        let timeout_ms = lookup(ENV_TIMEOUT_MS)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|e| {
                    ToolError::config(format!("{ENV_TIMEOUT_MS}={v:?} is not a number of milliseconds: {e}"))
                })
            })
            .transpose()?;

        let debug = lookup(ENV_DEBUG)
            .map(|v| parse_bool(ENV_DEBUG, &v))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            timeout_ms,
            debug,
            env: None,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

fn default_true() -> bool {
    true
}

fn parse_bool(key: &str, value: &str) -> ToolResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ToolError::config(format!("{key}={other:?} is not a boolean"))),
    }
}
