//! In-process Nix system API
//!
//! `NativeNixApi` is synchronous; executors call it under `spawn_blocking`.
//! `ProfileDirApi` reads generations straight from the profiles directory
//! and reports every mutating call as unsupported.

use chrono::{DateTime, Local};
use luminous_shared::RebuildMode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NativeError {
    #[error("native API unavailable: {0}")]
    Unavailable(String),

    #[error("native API does not support {0}")]
    Unsupported(&'static str),

    #[error("generation {0} does not exist")]
    NoSuchGeneration(u32),

    #[error("native operation failed: {0}")]
    Failed(String),

    #[error("native I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A system profile generation. Field names follow `nixos-rebuild list-generations --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    #[serde(rename = "generation")]
    pub number: u32,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub nixos_version: Option<String>,
    #[serde(default)]
    pub kernel_version: Option<String>,
}

impl Generation {
    /// One-line summary
    pub fn summary(&self) -> String {
        let mut line = format!("Generation {}", self.number);
        if let Some(date) = &self.date {
            line.push_str(&format!("  {}", date));
        }
        if let Some(version) = &self.nixos_version {
            line.push_str(&format!("  NixOS {}", version));
        }
        if let Some(kernel) = &self.kernel_version {
            line.push_str(&format!("  kernel {}", kernel));
        }
        if self.current {
            line.push_str("  (current)");
        }
        line
    }
}

pub trait NativeNixApi: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the system configuration; returns the resulting store path
    fn build(&self, mode: RebuildMode, upgrade: bool) -> Result<String, NativeError>;

    fn switch_to_configuration(&self, mode: RebuildMode) -> Result<(), NativeError>;

    /// Activate the previous generation; returns its number
    fn rollback(&self) -> Result<u32, NativeError>;

    fn switch_to_generation(&self, generation: u32) -> Result<(), NativeError>;

    fn current_generation(&self) -> Result<Generation, NativeError>;

    /// Ascending by generation number
    fn list_generations(&self) -> Result<Vec<Generation>, NativeError>;
}

static KERNEL_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"linux-(\d[^/]*)").unwrap_or_else(|e| panic!("bad kernel pattern: {}", e))
});

/// Reads `<profiles>/<name>-<N>-link` entries
#[derive(Debug, Clone)]
pub struct ProfileDirApi {
    profiles_dir: PathBuf,
    profile_name: String,
}

impl ProfileDirApi {
    /// `system_profile` is the profile symlink, e.g. `/nix/var/nix/profiles/system`
    pub fn new(system_profile: &Path) -> Self {
        let profiles_dir = system_profile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let profile_name = system_profile
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "system".to_string());
        Self {
            profiles_dir,
            profile_name,
        }
    }

    /// Usable only when at least one generation link is readable
    pub fn detect(system_profile: &Path) -> Result<Self, NativeError> {
        let api = Self::new(system_profile);
        if !api.profiles_dir.is_dir() {
            return Err(NativeError::Unavailable(format!(
                "{} is not a directory",
                api.profiles_dir.display()
            )));
        }
        if api.generation_links()?.is_empty() {
            return Err(NativeError::Unavailable(format!(
                "no {} generations in {}",
                api.profile_name,
                api.profiles_dir.display()
            )));
        }
        Ok(api)
    }

    fn parse_link_name(&self, file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix(&self.profile_name)?
            .strip_prefix('-')?
            .strip_suffix("-link")?
            .parse()
            .ok()
    }

    fn generation_links(&self) -> Result<Vec<(u32, PathBuf)>, NativeError> {
        let mut links = Vec::new();
        for entry in fs::read_dir(&self.profiles_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(number) = self.parse_link_name(&name.to_string_lossy()) {
                links.push((number, entry.path()));
            }
        }
        links.sort_by_key(|(n, _)| *n);
        Ok(links)
    }

    fn current_number(&self) -> Option<u32> {
        let target = fs::read_link(self.profiles_dir.join(&self.profile_name)).ok()?;
        let file_name = target.file_name()?.to_string_lossy().into_owned();
        self.parse_link_name(&file_name)
    }

    fn describe(&self, number: u32, link: &Path, current: bool) -> Generation {
        let date = fs::symlink_metadata(link)
            .and_then(|m| m.modified())
            .ok()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string());
        let nixos_version = fs::read_to_string(link.join("nixos-version"))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let kernel_version = fs::read_link(link.join("kernel")).ok().and_then(|target| {
            KERNEL_VERSION
                .captures(&target.to_string_lossy())
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });
        Generation {
            number,
            date,
            current,
            nixos_version,
            kernel_version,
        }
    }
}

impl NativeNixApi for ProfileDirApi {
    fn name(&self) -> &'static str {
        "profile-dir"
    }

    fn build(&self, _mode: RebuildMode, _upgrade: bool) -> Result<String, NativeError> {
        Err(NativeError::Unsupported("build"))
    }

    fn switch_to_configuration(&self, _mode: RebuildMode) -> Result<(), NativeError> {
        Err(NativeError::Unsupported("switch-to-configuration"))
    }

    fn rollback(&self) -> Result<u32, NativeError> {
        Err(NativeError::Unsupported("rollback"))
    }

    fn switch_to_generation(&self, _generation: u32) -> Result<(), NativeError> {
        Err(NativeError::Unsupported("switch-generation"))
    }

    fn current_generation(&self) -> Result<Generation, NativeError> {
        let number = self.current_number().ok_or_else(|| {
            NativeError::Failed(format!("cannot resolve {} profile link", self.profile_name))
        })?;
        let link = self
            .profiles_dir
            .join(format!("{}-{}-link", self.profile_name, number));
        if fs::symlink_metadata(&link).is_err() {
            return Err(NativeError::NoSuchGeneration(number));
        }
        Ok(self.describe(number, &link, true))
    }

    fn list_generations(&self) -> Result<Vec<Generation>, NativeError> {
        let current = self.current_number();
        let generations: Vec<Generation> = self
            .generation_links()?
            .into_iter()
            .map(|(n, link)| self.describe(n, &link, Some(n) == current))
            .collect();
        debug!("read {} generations from {}", generations.len(), self.profiles_dir.display());
        Ok(generations)
    }
}

// ============================================================================
// Fake native API (testing)
// ============================================================================

/// Scripted native API. Every call is recorded by name.
#[derive(Debug, Default)]
pub struct FakeNativeApi {
    generations: Vec<Generation>,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeNativeApi {
    pub fn new(generations: Vec<Generation>) -> Self {
        Self {
            generations,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every call fail with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: &str) -> Result<(), NativeError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.to_string());
        match &self.failure {
            Some(message) => Err(NativeError::Failed(message.clone())),
            None => Ok(()),
        }
    }

    fn current_number(&self) -> Option<u32> {
        self.generations.iter().find(|g| g.current).map(|g| g.number)
    }
}

impl NativeNixApi for FakeNativeApi {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn build(&self, mode: RebuildMode, _upgrade: bool) -> Result<String, NativeError> {
        self.record(&format!("build:{}", mode))?;
        Ok("/nix/store/00000000000000000000000000000000-nixos-system".to_string())
    }

    fn switch_to_configuration(&self, mode: RebuildMode) -> Result<(), NativeError> {
        self.record(&format!("switch:{}", mode))
    }

    fn rollback(&self) -> Result<u32, NativeError> {
        self.record("rollback")?;
        let current = self.current_number().unwrap_or(1);
        self.generations
            .iter()
            .map(|g| g.number)
            .filter(|n| *n < current)
            .max()
            .ok_or_else(|| NativeError::Failed("no previous generation".to_string()))
    }

    fn switch_to_generation(&self, generation: u32) -> Result<(), NativeError> {
        self.record(&format!("switch-generation:{}", generation))?;
        if self.generations.iter().any(|g| g.number == generation) {
            Ok(())
        } else {
            Err(NativeError::NoSuchGeneration(generation))
        }
    }

    fn current_generation(&self) -> Result<Generation, NativeError> {
        self.record("current-generation")?;
        self.generations
            .iter()
            .find(|g| g.current)
            .cloned()
            .ok_or_else(|| NativeError::Failed("no current generation".to_string()))
    }

    fn list_generations(&self) -> Result<Vec<Generation>, NativeError> {
        self.record("list-generations")?;
        Ok(self.generations.clone())
    }
}
