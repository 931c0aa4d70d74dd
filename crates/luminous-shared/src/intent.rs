//! Typed intents produced by the parser and consumed by the dispatcher.
//!
//! Each operation kind carries exactly the entities it needs, so the
//! dispatcher matches exhaustively instead of reading string-keyed bags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `nixos-rebuild` action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildMode {
    #[default]
    Switch,
    Boot,
    Test,
    Build,
    DryBuild,
}

impl RebuildMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Boot => "boot",
            Self::Test => "test",
            Self::Build => "build",
            Self::DryBuild => "dry-build",
        }
    }

    /// Whether this mode activates the new configuration
    pub fn activates(&self) -> bool {
        matches!(self, Self::Switch | Self::Boot | Self::Test)
    }
}

impl std::fmt::Display for RebuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_arg())
    }
}

/// What the user asked for, with the entities each operation needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentKind {
    /// Install one or more packages into the user profile
    Install { packages: Vec<String> },
    /// Remove one or more packages from the user profile
    Remove { packages: Vec<String> },
    /// Search nixpkgs
    Search { query: String },
    /// Upgrade channels and rebuild the system
    Update,
    /// Roll back to the previous system generation
    Rollback,
    /// Activate a specific system generation
    SwitchGeneration { generation: u32 },
    /// List packages installed in the user profile
    ListInstalled,
    /// List system generations
    ListGenerations,
    /// Rebuild the system from its current configuration
    Rebuild { mode: RebuildMode },
    /// Delete unreachable store paths and old generations
    GarbageCollect,
    /// Report NixOS version, channels and current generation
    Status,
    /// State of one systemd service
    ServiceStatus { service: String },
    /// List systemd services and their states
    ListServices,
    /// Print the system configuration file
    ShowConfig,
    /// Explain a Nix concept
    Query { topic: String },
    /// Show usage examples
    Help,
    /// Not recognized; never executed
    Unknown,
}

/// Flat discriminant of [`IntentKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Install,
    Remove,
    Search,
    Update,
    Rollback,
    SwitchGeneration,
    ListInstalled,
    ListGenerations,
    Rebuild,
    GarbageCollect,
    Status,
    ServiceStatus,
    ListServices,
    ShowConfig,
    Query,
    Help,
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Search => "search",
            Self::Update => "update",
            Self::Rollback => "rollback",
            Self::SwitchGeneration => "switch_generation",
            Self::ListInstalled => "list_installed",
            Self::ListGenerations => "list_generations",
            Self::Rebuild => "rebuild",
            Self::GarbageCollect => "garbage_collect",
            Self::Status => "status",
            Self::ServiceStatus => "service_status",
            Self::ListServices => "list_services",
            Self::ShowConfig => "show_config",
            Self::Query => "query",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl IntentKind {
    pub fn intent_type(&self) -> IntentType {
        match self {
            Self::Install { .. } => IntentType::Install,
            Self::Remove { .. } => IntentType::Remove,
            Self::Search { .. } => IntentType::Search,
            Self::Update => IntentType::Update,
            Self::Rollback => IntentType::Rollback,
            Self::SwitchGeneration { .. } => IntentType::SwitchGeneration,
            Self::ListInstalled => IntentType::ListInstalled,
            Self::ListGenerations => IntentType::ListGenerations,
            Self::Rebuild { .. } => IntentType::Rebuild,
            Self::GarbageCollect => IntentType::GarbageCollect,
            Self::Status => IntentType::Status,
            Self::ServiceStatus { .. } => IntentType::ServiceStatus,
            Self::ListServices => IntentType::ListServices,
            Self::ShowConfig => IntentType::ShowConfig,
            Self::Query { .. } => IntentType::Query,
            Self::Help => IntentType::Help,
            Self::Unknown => IntentType::Unknown,
        }
    }

    /// Whether handling this intent changes the system or user profile
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Install { .. }
                | Self::Remove { .. }
                | Self::Update
                | Self::Rollback
                | Self::SwitchGeneration { .. }
                | Self::Rebuild { .. }
                | Self::GarbageCollect
        )
    }
}

/// A recognized request. Built once by the parser, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    /// The text exactly as the user typed it
    pub raw_query: String,
    /// Fixed per-rule confidence, 0.0 to 1.0
    pub confidence: f32,
    /// Extra hints gathered while parsing (e.g. the verb that matched)
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Intent {
    pub fn new(kind: IntentKind, raw_query: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind,
            raw_query: raw_query.into(),
            confidence: confidence.clamp(0.0, 1.0),
            context: BTreeMap::new(),
        }
    }

    pub fn unknown(raw_query: impl Into<String>, confidence: f32) -> Self {
        Self::new(IntentKind::Unknown, raw_query, confidence)
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn intent_type(&self) -> IntentType {
        self.kind.intent_type()
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, IntentKind::Unknown)
    }

    /// Package names for install/remove intents, empty otherwise
    pub fn packages(&self) -> &[String] {
        match &self.kind {
            IntentKind::Install { packages } | IntentKind::Remove { packages } => packages,
            _ => &[],
        }
    }
}
