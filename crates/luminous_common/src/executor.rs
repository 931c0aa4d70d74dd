//! Nix executors
//!
//! `NixExecutor` is the seam the dispatcher talks to. `SubprocessExecutor`
//! always shells out. `NativeApiExecutor` tries the in-process API for
//! system operations and falls back to the same commands on any native error.
//! The choice is made once, by [`select_executor`].

use async_trait::async_trait;
use luminous_shared::RebuildMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::CommandSpec;
use crate::config::Settings;
use crate::native::{Generation, NativeError, NativeNixApi, ProfileDirApi};
use crate::runner::{CommandRunner, ExecError};

/// Which path handled a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Native,
    Subprocess,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Native => "native",
            Backend::Subprocess => "subprocess",
        }
    }
}

/// Which executor was selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    Subprocess,
    NativeWithFallback,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::Subprocess => "subprocess",
            ExecutorKind::NativeWithFallback => "native-with-fallback",
        }
    }
}

/// System operations that have a native path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemOp {
    Rebuild { mode: RebuildMode, upgrade: bool },
    Rollback,
    SwitchGeneration(u32),
    ListGenerations,
    CurrentGeneration,
}

impl SystemOp {
    pub fn name(&self) -> &'static str {
        match self {
            SystemOp::Rebuild { .. } => "rebuild",
            SystemOp::Rollback => "rollback",
            SystemOp::SwitchGeneration(_) => "switch-generation",
            SystemOp::ListGenerations => "list-generations",
            SystemOp::CurrentGeneration => "current-generation",
        }
    }
}

/// What an executor call produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub backend: Backend,
    /// Command lines run, or `native: <op>` for native calls
    pub commands: Vec<String>,
    /// Concatenated stdout of the commands
    pub stdout: String,
    /// Filled by native generation queries
    pub generations: Vec<Generation>,
    /// Short native result text (store path, new generation)
    pub note: Option<String>,
}

impl ExecOutcome {
    fn native(op: SystemOp) -> Self {
        Self {
            backend: Backend::Native,
            commands: vec![format!("native: {}", op.name())],
            stdout: String::new(),
            generations: Vec::new(),
            note: None,
        }
    }
}

#[async_trait]
pub trait NixExecutor: Send + Sync {
    fn kind(&self) -> ExecutorKind;

    /// Run commands in order, stopping at the first failure
    async fn run(&self, commands: &[CommandSpec], operation_id: Uuid) -> Result<ExecOutcome, ExecError>;

    /// A system operation; `fallback` is what the subprocess path runs
    async fn system(
        &self,
        op: SystemOp,
        fallback: &[CommandSpec],
        operation_id: Uuid,
    ) -> Result<ExecOutcome, ExecError>;
}

/// Shells out for everything
pub struct SubprocessExecutor {
    runner: Arc<dyn CommandRunner>,
}

impl SubprocessExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl NixExecutor for SubprocessExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Subprocess
    }

    async fn run(&self, commands: &[CommandSpec], operation_id: Uuid) -> Result<ExecOutcome, ExecError> {
        let mut outcome = ExecOutcome {
            backend: Backend::Subprocess,
            commands: Vec::with_capacity(commands.len()),
            stdout: String::new(),
            generations: Vec::new(),
            note: None,
        };
        for spec in commands {
            outcome.commands.push(spec.command_line());
            let output = self.runner.run(spec, operation_id).await?;
            outcome.stdout.push_str(&output.stdout);
        }
        Ok(outcome)
    }

    async fn system(
        &self,
        _op: SystemOp,
        fallback: &[CommandSpec],
        operation_id: Uuid,
    ) -> Result<ExecOutcome, ExecError> {
        self.run(fallback, operation_id).await
    }
}

/// Native API first, subprocess on any native error
pub struct NativeApiExecutor {
    api: Arc<dyn NativeNixApi>,
    fallback: SubprocessExecutor,
}

impl NativeApiExecutor {
    pub fn new(api: Arc<dyn NativeNixApi>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            api,
            fallback: SubprocessExecutor::new(runner),
        }
    }

    async fn call_native(&self, op: SystemOp) -> Result<ExecOutcome, NativeError> {
        let api = Arc::clone(&self.api);
        let joined = tokio::task::spawn_blocking(move || run_native(api.as_ref(), op)).await;
        joined.map_err(|e| NativeError::Failed(format!("native task panicked: {}", e)))?
    }
}

fn run_native(api: &dyn NativeNixApi, op: SystemOp) -> Result<ExecOutcome, NativeError> {
    let mut outcome = ExecOutcome::native(op);
    match op {
        SystemOp::Rebuild { mode, upgrade } => {
            let path = api.build(mode, upgrade)?;
            if mode.activates() {
                api.switch_to_configuration(mode)?;
            }
            outcome.note = Some(path);
        }
        SystemOp::Rollback => {
            let generation = api.rollback()?;
            outcome.note = Some(format!("generation {}", generation));
        }
        SystemOp::SwitchGeneration(generation) => {
            api.switch_to_generation(generation)?;
            outcome.note = Some(format!("generation {}", generation));
        }
        SystemOp::ListGenerations => {
            outcome.generations = api.list_generations()?;
        }
        SystemOp::CurrentGeneration => {
            outcome.generations = vec![api.current_generation()?];
        }
    }
    Ok(outcome)
}

#[async_trait]
impl NixExecutor for NativeApiExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::NativeWithFallback
    }

    async fn run(&self, commands: &[CommandSpec], operation_id: Uuid) -> Result<ExecOutcome, ExecError> {
        self.fallback.run(commands, operation_id).await
    }

    async fn system(
        &self,
        op: SystemOp,
        fallback: &[CommandSpec],
        operation_id: Uuid,
    ) -> Result<ExecOutcome, ExecError> {
        match self.call_native(op).await {
            Ok(outcome) => {
                info!("{} handled by native API ({})", op.name(), self.api.name());
                Ok(outcome)
            }
            Err(e) => {
                warn!("Native {} failed: {}. Falling back to subprocess.", op.name(), e);
                self.fallback.run(fallback, operation_id).await
            }
        }
    }
}

/// Startup capability check: native executor when the profile directory is
/// readable and `executor.prefer_native` is set, subprocess otherwise
pub fn select_executor(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Arc<dyn NixExecutor> {
    if !settings.executor.prefer_native {
        info!("Executor: subprocess (native disabled by config)");
        return Arc::new(SubprocessExecutor::new(runner));
    }
    match ProfileDirApi::detect(&settings.nix.system_profile) {
        Ok(api) => {
            info!("Executor: native with subprocess fallback");
            Arc::new(NativeApiExecutor::new(Arc::new(api), runner))
        }
        Err(e) => {
            info!("Executor: subprocess ({})", e);
            Arc::new(SubprocessExecutor::new(runner))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FakeNativeApi;
    use crate::runner::{FakeResponse, FakeRunner};

    fn generation(number: u32, current: bool) -> Generation {
        Generation {
            number,
            date: None,
            current,
            nixos_version: None,
            kernel_version: None,
        }
    }

    fn rollback_cmd() -> Vec<CommandSpec> {
        vec![CommandSpec::new("nixos-rebuild", ["switch", "--rollback"])]
    }

    #[tokio::test]
    async fn test_native_success_skips_subprocess() {
        let runner = Arc::new(FakeRunner::new());
        let api = Arc::new(FakeNativeApi::new(vec![generation(1, false), generation(2, true)]));
        let executor = NativeApiExecutor::new(api.clone(), runner.clone());

        let outcome = executor
            .system(SystemOp::Rollback, &rollback_cmd(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.backend, Backend::Native);
        assert_eq!(outcome.note.as_deref(), Some("generation 1"));
        assert_eq!(runner.call_count(), 0);
        assert_eq!(api.calls(), vec!["rollback"]);
    }

    #[tokio::test]
    async fn test_native_failure_falls_back() {
        let runner = Arc::new(FakeRunner::new());
        let api = Arc::new(FakeNativeApi::failing("daemon socket missing"));
        let executor = NativeApiExecutor::new(api, runner.clone());

        let outcome = executor
            .system(SystemOp::Rollback, &rollback_cmd(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.backend, Backend::Subprocess);
        assert_eq!(runner.calls(), vec!["nixos-rebuild switch --rollback"]);
    }

    #[tokio::test]
    async fn test_rebuild_build_mode_does_not_activate() {
        let runner = Arc::new(FakeRunner::new());
        let api = Arc::new(FakeNativeApi::new(vec![generation(1, true)]));
        let executor = NativeApiExecutor::new(api.clone(), runner);
        executor
            .system(
                SystemOp::Rebuild {
                    mode: RebuildMode::Build,
                    upgrade: false,
                },
                &[],
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert_eq!(api.calls(), vec!["build:build"]);
    }

    #[tokio::test]
    async fn test_subprocess_stops_at_first_failure() {
        let runner = Arc::new(
            FakeRunner::new().respond("nix-env", FakeResponse::fail(1, "no such generation")),
        );
        let executor = SubprocessExecutor::new(runner.clone());
        let commands = vec![
            CommandSpec::new("nix-env", ["--switch-generation", "99"]),
            CommandSpec::new("switch-to-configuration", ["switch"]),
        ];
        let err = executor
            .system(SystemOp::SwitchGeneration(99), &commands, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Failed { code: 1, .. }));
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn test_select_respects_config() {
        let mut settings = Settings::default();
        settings.executor.prefer_native = false;
        let executor = select_executor(&settings, Arc::new(FakeRunner::new()));
        assert_eq!(executor.kind(), ExecutorKind::Subprocess);

        settings.executor.prefer_native = true;
        settings.nix.system_profile = "/nonexistent/luminous/profiles/system".into();
        let executor = select_executor(&settings, Arc::new(FakeRunner::new()));
        assert_eq!(executor.kind(), ExecutorKind::Subprocess);
    }
}
