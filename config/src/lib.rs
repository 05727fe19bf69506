//! Configuration for Isthmus.
//!
//! Loaded from `$ISTHMUS_CONFIG` when set, otherwise `~/.isthmus/config.toml`.
//! Every section and key is optional; accessors fall back to defaults. String
//! values may reference environment variables as `${NAME}`.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use isthmus_types::GatherPolicy;
use serde::Deserialize;
use thiserror::Error;
use toml::de::Error as TomlError;

pub const CONFIG_ENV_VAR: &str = "ISTHMUS_CONFIG";

pub const DEFAULT_STATUS_BASE_URL: &str = "https://testnet-api.4160.nodely.dev";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_FOREIGN_THREAD_NAME: &str = "isthmus-foreign";
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 250;
pub const DEFAULT_BENCH_ITERATIONS: i64 = 10_000;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsthmusConfig {
    pub fetch: Option<FetchConfig>,
    pub foreign: Option<ForeignConfig>,
    pub gather: Option<GatherConfig>,
    pub bench: Option<BenchConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: TomlError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Status node base URL.
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub https_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignConfig {
    pub thread_name: Option<String>,
    /// Default deadline for native-calls-foreign invocations. Unset means none.
    pub call_timeout_ms: Option<u64>,
    pub cancel_grace_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatherConfig {
    pub policy: Option<GatherPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// Signed so a non-positive value reaches the harness and gets flagged there.
    pub iterations: Option<i64>,
    /// Scenario names to run; all when unset.
    pub scenarios: Option<Vec<String>>,
}

/// Expand `${VAR}` references. Unset variables expand to the empty string and
/// an unclosed `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl IsthmusConfig {
    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
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

        match toml::from_str(&content) {
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

    #[must_use]
    pub fn status_base_url(&self) -> String {
        self.fetch
            .as_ref()
            .and_then(|f| f.base_url.as_deref())
            .map(expand_env_vars)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STATUS_BASE_URL.to_owned())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.fetch
                .as_ref()
                .and_then(|f| f.request_timeout_ms)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.fetch
                .as_ref()
                .and_then(|f| f.connect_timeout_ms)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.fetch
            .as_ref()
            .and_then(|f| f.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES)
    }

    #[must_use]
    pub fn https_only(&self) -> bool {
        self.fetch.as_ref().and_then(|f| f.https_only).unwrap_or(true)
    }

    #[must_use]
    pub fn foreign_thread_name(&self) -> String {
        self.foreign
            .as_ref()
            .and_then(|f| f.thread_name.as_deref())
            .map(expand_env_vars)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FOREIGN_THREAD_NAME.to_owned())
    }

    #[must_use]
    pub fn foreign_call_timeout(&self) -> Option<Duration> {
        self.foreign
            .as_ref()
            .and_then(|f| f.call_timeout_ms)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(
            self.foreign
                .as_ref()
                .and_then(|f| f.cancel_grace_ms)
                .unwrap_or(DEFAULT_CANCEL_GRACE_MS),
        )
    }

    #[must_use]
    pub fn gather_policy(&self) -> GatherPolicy {
        self.gather
            .as_ref()
            .and_then(|g| g.policy)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn bench_iterations(&self) -> i64 {
        self.bench
            .as_ref()
            .and_then(|b| b.iterations)
            .unwrap_or(DEFAULT_BENCH_ITERATIONS)
    }

    #[must_use]
    pub fn bench_scenarios(&self) -> Option<&[String]> {
        self.bench.as_ref().and_then(|b| b.scenarios.as_deref())
    }
}

/// `$ISTHMUS_CONFIG`, or `~/.isthmus/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".isthmus").join("config.toml"))
}
