//! # Configuration Module
//!
//! Resolves named settings for the toolkit using a fixed precedence, so a
//! suite behaves the same whether it is pointed at an environment through
//! code, the process environment, or a checked-in file.
//!
//! ## Resolution order (first match wins)
//!
//! ```text
//! +--------------------+     +--------------------+     +--------------------+
//! | explicit override  | --> | environment var    | --> | config/{env}.toml  |
//! | ConfigBuilder::set |     | API_BASE_URL=...   |     | (test.toml default)|
//! +--------------------+     +--------------------+     +--------------------+
//!                                                                 |
//!                                                                 v
//!                                                       +--------------------+
//!                                                       | built-in default   |
//!                                                       +--------------------+
//! ```
//!
//! Environment variable names are derived from the setting key by
//! uppercasing and replacing `.` with `_`, so `api.base.url` is overridden
//! by `API_BASE_URL`.
//!
//! ## Configuration file
//!
//! The file tier is `config/{env}.toml`, where the environment name comes
//! from [`ConfigBuilder::env`], else the `BOOKTEST_ENV` variable, else
//! `test`. When the named file is absent the loader falls back to
//! `config/test.toml`. Nested tables are flattened to dotted keys, so both
//! of these resolve as `api.auth.username`:
//!
//! ```toml
//! "api.auth.username" = "admin"
//!
//! [api.auth]
//! username = "admin"
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booktest_core::Config;
//!
//! // Shared instance, resolved once per process. `Config::reset()` clears
//! // it so the next access re-resolves (test isolation).
//! let config = Config::shared();
//! let base_url = config.base_url();
//!
//! // Or an explicitly constructed context object:
//! let config = Config::builder()
//!     .set(booktest_core::config::BASE_URL, "http://localhost:3001")
//!     .load()?;
//! ```

use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};
use tracing::*;

use crate::error::{Error, Result};

/// Environment variable naming the active environment.
const BOOKTEST_ENV: &str = "BOOKTEST_ENV";
/// Environment assumed when none is named.
const DEFAULT_ENV: &str = "test";
/// Directory searched for environment files when none is given.
const DEFAULT_CONFIG_DIR: &str = "config";

/// Base URL of the API under test.
pub const BASE_URL: &str = "api.base.url";
/// Request timeout in seconds.
pub const TIMEOUT: &str = "api.timeout";
/// Username submitted to the authentication endpoint.
pub const AUTH_USERNAME: &str = "api.auth.username";
/// Password submitted to the authentication endpoint.
pub const AUTH_PASSWORD: &str = "api.auth.password";
/// Whether request narration is forwarded to the reporter.
pub const LOG_REQUESTS: &str = "api.log.requests";
/// Whether response narration is forwarded to the reporter.
pub const LOG_RESPONSES: &str = "api.log.responses";

static SHARED: Lazy<RwLock<Option<Arc<Config>>>> = Lazy::new(|| RwLock::new(None));

/// Resolved configuration context. The file tier is snapshotted at load
/// time; override and environment lookups are live, so the precedence a
/// key resolves through never changes within a process run.
#[derive(Debug, Clone)]
pub struct Config {
    env: String,
    overrides: HashMap<String, String>,
    file: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            env: DEFAULT_ENV.to_string(),
            overrides: HashMap::new(),
            file: HashMap::new(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration with no overrides, resolving the environment
    /// name and file location from the process environment.
    pub fn load() -> Result<Config> {
        Config::builder().load()
    }

    /// Shared process-wide instance, resolved lazily on first access.
    ///
    /// A load failure falls back to built-in defaults so a missing file
    /// never takes the whole suite down; the failure is logged.
    pub fn shared() -> Arc<Config> {
        if let Ok(guard) = SHARED.read() {
            if let Some(config) = guard.as_ref() {
                return Arc::clone(config);
            }
        }

        let mut guard = SHARED.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = guard.as_ref() {
            return Arc::clone(config);
        }
        let config = Arc::new(Config::load().unwrap_or_else(|e| {
            error!("configuration load failed, using defaults: {e}");
            Config::default()
        }));
        *guard = Some(Arc::clone(&config));
        config
    }

    /// Clear the shared instance so the next [`Config::shared`] call
    /// re-resolves. Intended for test isolation.
    pub fn reset() {
        let mut guard = SHARED.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Name of the environment this configuration was resolved for.
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Resolve a setting: explicit override, then environment variable,
    /// then the environment file. `None` when no tier has the key.
    pub fn resolve(&self, key: impl AsRef<str>) -> Option<String> {
        let key = key.as_ref();
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        if let Ok(value) = std::env::var(env_key(key)) {
            return Some(value);
        }
        self.file.get(key).cloned()
    }

    pub fn get_str(&self, key: impl AsRef<str>, default: &str) -> String {
        self.resolve(key).unwrap_or_else(|| default.to_string())
    }

    /// Integer variant. A value that fails to parse is logged and replaced
    /// by the default rather than failing resolution.
    pub fn get_int(&self, key: impl AsRef<str>, default: i64) -> i64 {
        let key = key.as_ref();
        let Some(value) = self.resolve(key) else {
            return default;
        };
        value.trim().parse().unwrap_or_else(|_| {
            warn!("invalid integer for {key}: {value:?}, using default: {default}");
            default
        })
    }

    /// Boolean variant with the same warn-and-default fallback.
    pub fn get_bool(&self, key: impl AsRef<str>, default: bool) -> bool {
        let key = key.as_ref();
        let Some(value) = self.resolve(key) else {
            return default;
        };
        value.trim().parse().unwrap_or_else(|_| {
            warn!("invalid boolean for {key}: {value:?}, using default: {default}");
            default
        })
    }

    /// Base URL of the API under test.
    pub fn base_url(&self) -> String {
        self.get_str(BASE_URL, "https://restful-booker.herokuapp.com")
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.get_int(TIMEOUT, 30).max(0) as u64)
    }

    pub fn auth_username(&self) -> String {
        self.get_str(AUTH_USERNAME, "admin")
    }

    pub fn auth_password(&self) -> String {
        self.get_str(AUTH_PASSWORD, "password123")
    }

    pub fn log_requests(&self) -> bool {
        self.get_bool(LOG_REQUESTS, true)
    }

    pub fn log_responses(&self) -> bool {
        self.get_bool(LOG_RESPONSES, true)
    }

    fn log_summary(&self) {
        info!("=== API configuration ===");
        info!("environment: {}", self.env);
        info!("base url: {}", self.base_url());
        info!("timeout: {}s", self.timeout().as_secs());
        info!("request logging: {}", self.log_requests());
        info!("response logging: {}", self.log_responses());
        info!("=========================");
    }
}

/// Builder for an explicitly constructed [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    env: Option<String>,
    config_dir: Option<PathBuf>,
    overrides: HashMap<String, String>,
}

impl ConfigBuilder {
    /// Name the environment, bypassing `BOOKTEST_ENV`.
    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env = Some(name.into());
        self
    }

    /// Directory holding `{env}.toml` files. Defaults to `config/` under
    /// the current working directory.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Explicit process-level override for a key. Wins over every other
    /// tier.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn load(self) -> Result<Config> {
        let _ = dotenv::dotenv();

        let env = self
            .env
            .or_else(|| std::env::var(BOOKTEST_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let dir = self
            .config_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

        let file = load_file_tier(&dir, &env)?;

        let config = Config {
            env,
            overrides: self.overrides,
            file,
        };
        config.log_summary();
        Ok(config)
    }
}

/// Derive the environment variable name for a setting key.
fn env_key(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

/// Load and flatten the environment file, falling back to the default
/// environment's file when the named one is absent.
fn load_file_tier(dir: &Path, env: &str) -> Result<HashMap<String, String>> {
    let named = dir.join(format!("{env}.toml"));
    let path = if named.exists() {
        named
    } else {
        let fallback = dir.join(format!("{DEFAULT_ENV}.toml"));
        if !fallback.exists() {
            warn!("no configuration file found under {}, using defaults", dir.display());
            return Ok(HashMap::new());
        }
        if env != DEFAULT_ENV {
            warn!(
                "{} not found, falling back to {}",
                named.display(),
                fallback.display()
            );
        }
        fallback
    };

    let buf = std::fs::read_to_string(&path)
        .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
    let value: toml::Value = toml::from_str(&buf)
        .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
    let toml::Value::Table(table) = value else {
        return Err(Error::ConfigLoad(format!(
            "{}: expected a table at the top level",
            path.display()
        )));
    };

    let mut flat = HashMap::new();
    flatten(&table, "", &mut flat);
    debug!("loaded {} settings from {}", flat.len(), path.display());
    Ok(flat)
}

/// Flatten nested tables into dotted keys; scalars are stored in their
/// string form so the typed getters parse every tier the same way.
fn flatten(table: &toml::Table, prefix: &str, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(nested, &key, out),
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}
