//! Luminous Nix configuration
//!
//! Configuration lives in `$XDG_CONFIG_HOME/luminous-nix/config.toml`
//! (override with `--config` or `LUMINOUS_NIX_CONFIG`). A missing file means
//! defaults; a file that does not parse is an error, never silently ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::personality::Personality;

const APP_DIR: &str = "luminous-nix";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "LUMINOUS_NIX_CONFIG";

/// Default NixOS system profile
pub const SYSTEM_PROFILE: &str = "/nix/var/nix/profiles/system";

/// Default NixOS system configuration file
pub const CONFIGURATION_NIX: &str = "/etc/nixos/configuration.nix";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot write config: {0}")]
    Write(#[from] std::io::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// How user packages are installed and removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// `nix profile install nixpkgs#<pkg>`
    #[default]
    Profile,
    /// `nix-env -iA nixpkgs.<pkg>`
    Env,
}

impl InstallMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMethod::Profile => "profile",
            InstallMethod::Env => "env",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub personality: Personality,

    /// Report what would run instead of running it
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            personality: Personality::default(),
            dry_run: default_dry_run(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NixConfig {
    #[serde(default)]
    pub install_method: InstallMethod,

    /// Flake reference passed to `nixos-rebuild --flake`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flake: Option<String>,

    /// Passed to `nixos-rebuild --profile-name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,

    #[serde(default)]
    pub show_trace: bool,

    /// Prefix system-level commands with `sudo`
    #[serde(default)]
    pub use_sudo: bool,

    #[serde(default = "default_system_profile")]
    pub system_profile: PathBuf,

    /// File printed by "show my configuration"
    #[serde(default = "default_configuration_path")]
    pub configuration_path: PathBuf,
}

fn default_system_profile() -> PathBuf {
    PathBuf::from(SYSTEM_PROFILE)
}

fn default_configuration_path() -> PathBuf {
    PathBuf::from(CONFIGURATION_NIX)
}

impl Default for NixConfig {
    fn default() -> Self {
        Self {
            install_method: InstallMethod::default(),
            flake: None,
            profile_name: None,
            show_trace: false,
            use_sudo: false,
            system_profile: default_system_profile(),
            configuration_path: default_configuration_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Look for the in-process API at startup
    #[serde(default = "default_prefer_native")]
    pub prefer_native: bool,
}

fn default_prefer_native() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            prefer_native: default_prefer_native(),
        }
    }
}

/// Per-category subprocess timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Quick read-only queries (nixos-version, nix-channel --list, nix-env -q)
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,

    #[serde(default = "default_search_secs")]
    pub search_secs: u64,

    /// Profile install/remove and garbage collection
    #[serde(default = "default_package_secs")]
    pub package_secs: u64,

    /// nixos-rebuild and generation switches
    #[serde(default = "default_rebuild_secs")]
    pub rebuild_secs: u64,
}

fn default_query_secs() -> u64 {
    5
}

fn default_search_secs() -> u64 {
    30
}

fn default_package_secs() -> u64 {
    300
}

fn default_rebuild_secs() -> u64 {
    1800
}

impl TimeoutConfig {
    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs.max(1))
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs.max(1))
    }

    pub fn package(&self) -> Duration {
        Duration::from_secs(self.package_secs.max(1))
    }

    pub fn rebuild(&self) -> Duration {
        Duration::from_secs(self.rebuild_secs.max(1))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_secs: default_query_secs(),
            search_secs: default_search_secs(),
            package_secs: default_package_secs(),
            rebuild_secs: default_rebuild_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter directive used when LUMINOUS_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append one JSON line per request to the request log
    #[serde(default = "default_request_log")]
    pub request_log: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_request_log() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            request_log: default_request_log(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub nix: NixConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Settings {
    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the explicit path, else `$LUMINOUS_NIX_CONFIG`, else the XDG default
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&config_path()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Resolved config file path
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    config_dir().join(CONFIG_FILE)
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_DIR)
}
