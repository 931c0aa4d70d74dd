//! Command construction
//!
//! Turns intents into argv vectors. Nothing here spawns a process; the same
//! specs are shown in dry-run and handed to the runner otherwise.

use luminous_shared::RebuildMode;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::{InstallMethod, Settings};

/// Common names mapped to nixpkgs attributes
const PACKAGE_ALIASES: &[(&str, &str)] = &[
    ("chrome", "google-chrome"),
    ("code", "vscode"),
    ("vs-code", "vscode"),
    ("nvim", "neovim"),
    ("python", "python3"),
    ("node", "nodejs"),
    ("npm", "nodejs"),
    ("rust", "rustc"),
    ("golang", "go"),
];

/// Resolve a typed package name to its nixpkgs attribute
pub fn resolve_alias(name: &str) -> &str {
    PACKAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, attr)| *attr)
        .unwrap_or(name)
}

/// Stdout kept for output that is only shown or logged
pub const DISPLAY_OUTPUT_BYTES: usize = 64 * 1024;

/// Stdout kept for output that is parsed (one-line JSON from `nix search`)
pub const PARSED_OUTPUT_BYTES: usize = 64 * 1024 * 1024;

/// One program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Changes the system or user profile
    pub mutating: bool,
    /// Stdout bytes kept by the runner
    pub max_output: usize,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(30),
            mutating: false,
            max_output: DISPLAY_OUTPUT_BYTES,
        }
    }

    /// Stdout is parsed, so keep all of it up to `PARSED_OUTPUT_BYTES`
    pub fn parsed_output(mut self) -> Self {
        self.max_output = PARSED_OUTPUT_BYTES;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    /// Prefix with `sudo` when `enabled`
    pub fn with_sudo(self, enabled: bool) -> Self {
        if !enabled || self.program == "sudo" {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            ..self
        }
    }

    /// Space-joined command line, for display and logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

/// Builds command specs from settings
pub struct CommandBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    fn sudo(&self) -> bool {
        self.settings.nix.use_sudo
    }

    pub fn install(&self, packages: &[String]) -> Vec<CommandSpec> {
        let attrs = packages.iter().map(|p| resolve_alias(p));
        let spec = match self.settings.nix.install_method {
            InstallMethod::Profile => CommandSpec::new(
                "nix",
                ["profile".to_string(), "install".to_string()]
                    .into_iter()
                    .chain(attrs.map(|a| format!("nixpkgs#{}", a))),
            ),
            InstallMethod::Env => CommandSpec::new(
                "nix-env",
                ["-iA".to_string()]
                    .into_iter()
                    .chain(attrs.map(|a| format!("nixpkgs.{}", a))),
            ),
        };
        vec![spec.with_timeout(self.settings.timeouts.package()).mutating()]
    }

    pub fn remove(&self, packages: &[String]) -> Vec<CommandSpec> {
        let names = packages.iter().map(|p| resolve_alias(p).to_string());
        let spec = match self.settings.nix.install_method {
            InstallMethod::Profile => CommandSpec::new(
                "nix",
                ["profile".to_string(), "remove".to_string()]
                    .into_iter()
                    .chain(names),
            ),
            InstallMethod::Env => {
                CommandSpec::new("nix-env", ["-e".to_string()].into_iter().chain(names))
            }
        };
        vec![spec.with_timeout(self.settings.timeouts.package()).mutating()]
    }

    pub fn search(&self, query: &str) -> Vec<CommandSpec> {
        let args = ["search", "nixpkgs"]
            .into_iter()
            .map(str::to_string)
            .chain(query.split_whitespace().map(str::to_string))
            .chain(std::iter::once("--json".to_string()));
        vec![CommandSpec::new("nix", args)
            .with_timeout(self.settings.timeouts.search())
            .parsed_output()]
    }

    pub fn list_installed(&self) -> Vec<CommandSpec> {
        let spec = match self.settings.nix.install_method {
            InstallMethod::Profile => CommandSpec::new("nix", ["profile", "list"]),
            InstallMethod::Env => CommandSpec::new("nix-env", ["-q"]),
        };
        vec![spec.with_timeout(self.settings.timeouts.query()).parsed_output()]
    }

    /// `nixos-rebuild <action> [--flake] [--profile-name] [--upgrade] [--show-trace]`
    fn nixos_rebuild(&self, action: &str, upgrade: bool) -> CommandSpec {
        let nix = &self.settings.nix;
        let mut args = vec![action.to_string()];
        if let Some(flake) = &nix.flake {
            args.push("--flake".to_string());
            args.push(flake.clone());
        }
        if let Some(name) = &nix.profile_name {
            args.push("--profile-name".to_string());
            args.push(name.clone());
        }
        if upgrade {
            args.push("--upgrade".to_string());
        }
        if nix.show_trace {
            args.push("--show-trace".to_string());
        }
        CommandSpec::new("nixos-rebuild", args)
    }

    pub fn update(&self) -> Vec<CommandSpec> {
        vec![self
            .nixos_rebuild(RebuildMode::Switch.as_arg(), true)
            .with_timeout(self.settings.timeouts.rebuild())
            .mutating()
            .with_sudo(self.sudo())]
    }

    pub fn rebuild(&self, mode: RebuildMode) -> Vec<CommandSpec> {
        vec![self
            .nixos_rebuild(mode.as_arg(), false)
            .with_timeout(self.settings.timeouts.rebuild())
            .mutating()
            .with_sudo(self.sudo())]
    }

    pub fn rollback(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("nixos-rebuild", ["switch", "--rollback"])
                .with_timeout(self.settings.timeouts.rebuild())
                .mutating()
                .with_sudo(self.sudo()),
        ]
    }

    /// Point the system profile at generation `n`, then activate it
    pub fn switch_generation(&self, generation: u32) -> Vec<CommandSpec> {
        let profile = &self.settings.nix.system_profile;
        let activate = Path::new(profile).join("bin").join("switch-to-configuration");
        vec![
            CommandSpec::new(
                "nix-env",
                [
                    "-p".to_string(),
                    profile.display().to_string(),
                    "--switch-generation".to_string(),
                    generation.to_string(),
                ],
            )
            .with_timeout(self.settings.timeouts.package())
            .mutating()
            .with_sudo(self.sudo()),
            CommandSpec::new(&activate.display().to_string(), ["switch"])
                .with_timeout(self.settings.timeouts.rebuild())
                .mutating()
                .with_sudo(self.sudo()),
        ]
    }

    pub fn list_generations(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("nixos-rebuild", ["list-generations", "--json"])
            .with_timeout(self.settings.timeouts.query())
            .parsed_output()]
    }

    pub fn garbage_collect(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("nix-collect-garbage", ["-d"])
            .with_timeout(self.settings.timeouts.package())
            .mutating()
            .with_sudo(self.sudo())]
    }

    pub fn nixos_version(&self) -> CommandSpec {
        CommandSpec::new("nixos-version", Vec::<String>::new())
            .with_timeout(self.settings.timeouts.query())
    }

    pub fn channels(&self) -> CommandSpec {
        CommandSpec::new("nix-channel", ["--list"])
            .with_timeout(self.settings.timeouts.query())
            .parsed_output()
    }

    /// `systemctl show` exits 0 for unknown units and reports `LoadState=not-found`
    pub fn service_status(&self, service: &str) -> Vec<CommandSpec> {
        vec![CommandSpec::new(
            "systemctl",
            [
                "show",
                service,
                "--no-pager",
                "--property=Id,Description,LoadState,ActiveState,SubState",
            ],
        )
        .with_timeout(self.settings.timeouts.query())]
    }

    pub fn list_services(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new(
            "systemctl",
            [
                "list-units",
                "--type=service",
                "--all",
                "--no-pager",
                "--no-legend",
                "--plain",
            ],
        )
        .with_timeout(self.settings.timeouts.query())
        .parsed_output()]
    }

    pub fn show_config(&self) -> Vec<CommandSpec> {
        let path = self.settings.nix.configuration_path.display().to_string();
        vec![CommandSpec::new("cat", [path]).with_timeout(self.settings.timeouts.query())]
    }

    pub fn status(&self) -> Vec<CommandSpec> {
        let mut specs = vec![self.nixos_version(), self.channels()];
        specs.extend(self.list_generations());
        specs
    }
}

/// Command lines for display
pub fn command_lines(specs: &[CommandSpec]) -> Vec<String> {
    specs.iter().map(CommandSpec::command_line).collect()
}
