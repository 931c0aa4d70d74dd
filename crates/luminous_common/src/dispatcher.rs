//! Command Dispatcher - intent to operation result
//!
//! One `Dispatcher` is built at startup and shared by reference. Dry-run
//! requests are answered from the command builder alone and never reach the
//! executor. Mutating operations hold a single-writer lock while they run.

use luminous_shared::{
    Checkpoint, Intent, IntentKind, OperationResult, OperationTracker, RebuildMode, Response,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::{command_lines, CommandBuilder, CommandSpec};
use crate::config::{InstallMethod, Settings};
use crate::executor::{select_executor, ExecOutcome, ExecutorKind, NixExecutor, SystemOp};
use crate::knowledge;
use crate::native::Generation;
use crate::parsers;
use crate::personality::Personality;
use crate::progress_bus::ProgressBus;
use crate::remediation;
use crate::runner::{ExecError, TokioRunner};

/// Search hits listed in the message text
const MAX_LISTED_HITS: usize = 20;

/// Per-request options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub dry_run: bool,
    pub personality: Personality,
}

impl RequestContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dry_run: settings.core.dry_run,
            personality: settings.core.personality,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct Dispatcher {
    executor: Arc<dyn NixExecutor>,
    bus: ProgressBus,
    settings: Settings,
    write_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn NixExecutor>, bus: ProgressBus, settings: Settings) -> Self {
        Self {
            executor,
            bus,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    /// Production wiring: tokio runner streaming into a fresh bus, executor
    /// chosen by startup detection
    pub fn from_settings(settings: Settings) -> Self {
        let bus = ProgressBus::default();
        let runner = Arc::new(TokioRunner::with_progress(bus.clone()));
        let executor = select_executor(&settings, runner);
        Self::new(executor, bus, settings)
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn executor_kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    /// Handle one intent. Never panics on operation errors; failures come
    /// back as `success: false` with an error and suggestions.
    pub async fn process(&self, intent: &Intent, ctx: &RequestContext) -> OperationResult {
        let start = Instant::now();
        info!(
            "Processing {} (confidence {:.2}, dry_run={})",
            intent.intent_type(),
            intent.confidence,
            ctx.dry_run
        );

        let result = match &intent.kind {
            IntentKind::Unknown => not_understood(intent),
            IntentKind::Help => OperationResult::success(knowledge::help_text())
                .with_data("examples", knowledge::EXAMPLES.to_vec()),
            IntentKind::Query { topic } => explain(topic),
            _ if ctx.dry_run => self.plan(&intent.kind),
            kind => self.execute(kind).await,
        };

        result.with_duration(start.elapsed().as_secs_f64())
    }

    /// `process`, then wrap the text in the request's personality
    pub async fn respond(&self, intent: &Intent, ctx: &RequestContext) -> Response {
        let result = self.process(intent, ctx).await;
        render(intent, &result, ctx.personality)
    }

    /// Command specs for an executable intent, empty for the rest
    pub fn commands_for(&self, kind: &IntentKind) -> Vec<CommandSpec> {
        let builder = CommandBuilder::new(&self.settings);
        match kind {
            IntentKind::Install { packages } => builder.install(packages),
            IntentKind::Remove { packages } => builder.remove(packages),
            IntentKind::Search { query } => builder.search(query),
            IntentKind::ListInstalled => builder.list_installed(),
            IntentKind::Update => builder.update(),
            IntentKind::Rebuild { mode } => builder.rebuild(*mode),
            IntentKind::Rollback => builder.rollback(),
            IntentKind::SwitchGeneration { generation } => builder.switch_generation(*generation),
            IntentKind::ListGenerations => builder.list_generations(),
            IntentKind::GarbageCollect => builder.garbage_collect(),
            IntentKind::Status => builder.status(),
            IntentKind::ServiceStatus { service } => builder.service_status(service),
            IntentKind::ListServices => builder.list_services(),
            IntentKind::ShowConfig => builder.show_config(),
            IntentKind::Query { .. } | IntentKind::Help | IntentKind::Unknown => Vec::new(),
        }
    }

    /// Dry run: describe, never execute
    fn plan(&self, kind: &IntentKind) -> OperationResult {
        let lines = command_lines(&self.commands_for(kind));
        let message = match kind {
            IntentKind::Install { packages } => format!("Would install: {}", packages.join(", ")),
            IntentKind::Remove { packages } => format!("Would remove: {}", packages.join(", ")),
            _ => format!("Would run: {}", lines.join(" && ")),
        };
        let mut result = OperationResult::success(message)
            .with_data("dry_run", true)
            .with_commands(lines);
        if let IntentKind::Install { packages } | IntentKind::Remove { packages } = kind {
            result = result.with_data("packages", packages.clone());
        }
        result
    }

    async fn execute(&self, kind: &IntentKind) -> OperationResult {
        let mut tracker = OperationTracker::new();
        let op = tracker.id();
        if let Err(e) = tracker.start() {
            warn!("operation {}: {}", op, e);
        }
        self.bus
            .checkpoint(op, Checkpoint::Started, format!("Starting {}", kind.intent_type()));

        let _guard = if kind.is_mutating() {
            Some(self.write_lock.lock().await)
        } else {
            None
        };

        let commands = self.commands_for(kind);
        self.bus.checkpoint(
            op,
            Checkpoint::Prepared,
            format!("Prepared {} command(s)", commands.len()),
        );

        let result = match self.run_handler(kind, &commands, op).await {
            Ok(result) => result,
            Err(e) => failure_from(e, &commands),
        };

        if let Err(e) = tracker.finish(result.success) {
            warn!("operation {}: {}", op, e);
        }
        let done = if result.success { "Done" } else { "Failed" };
        self.bus.checkpoint(op, Checkpoint::Finished, done);
        info!("Operation {} {}", op, tracker.state());
        result
    }

    async fn run_handler(
        &self,
        kind: &IntentKind,
        commands: &[CommandSpec],
        op: Uuid,
    ) -> Result<OperationResult, ExecError> {
        let running = |what: &str| {
            self.bus.checkpoint(op, Checkpoint::Running, what.to_string());
        };
        let processing = || {
            self.bus
                .checkpoint(op, Checkpoint::Processing, "Processing results");
        };

        match kind {
            IntentKind::Install { packages } => {
                running(&format!("Installing {}", packages.join(", ")));
                let outcome = self.executor.run(commands, op).await?;
                processing();
                Ok(OperationResult::success(format!("Installed: {}", packages.join(", ")))
                    .with_data("packages", packages.clone())
                    .with_commands(outcome.commands))
            }
            IntentKind::Remove { packages } => {
                running(&format!("Removing {}", packages.join(", ")));
                let outcome = self.executor.run(commands, op).await?;
                processing();
                Ok(OperationResult::success(format!("Removed: {}", packages.join(", ")))
                    .with_data("packages", packages.clone())
                    .with_commands(outcome.commands))
            }
            IntentKind::Search { query } => {
                running(&format!("Searching nixpkgs for '{}'", query));
                let outcome = self.executor.run(commands, op).await?;
                processing();
                Ok(search_result(query, outcome))
            }
            IntentKind::ListInstalled => {
                running("Listing installed packages");
                let outcome = self.executor.run(commands, op).await?;
                processing();
                let packages = match self.settings.nix.install_method {
                    InstallMethod::Profile => parsers::parse_profile_list(&outcome.stdout),
                    InstallMethod::Env => parsers::parse_env_query(&outcome.stdout),
                };
                let message = if packages.is_empty() {
                    "No packages installed in your profile".to_string()
                } else {
                    format!(
                        "{} package(s) installed:\n{}",
                        packages.len(),
                        bullet_list(packages.iter().map(String::as_str))
                    )
                };
                Ok(OperationResult::success(message)
                    .with_data("packages", packages)
                    .with_commands(outcome.commands))
            }
            IntentKind::Update => {
                running("Updating channels and rebuilding the system");
                let op_kind = SystemOp::Rebuild {
                    mode: RebuildMode::Switch,
                    upgrade: true,
                };
                let outcome = self.executor.system(op_kind, commands, op).await?;
                processing();
                Ok(system_result("System updated", outcome))
            }
            IntentKind::Rebuild { mode } => {
                running(&format!("Rebuilding ({})", mode));
                let op_kind = SystemOp::Rebuild {
                    mode: *mode,
                    upgrade: false,
                };
                let outcome = self.executor.system(op_kind, commands, op).await?;
                processing();
                let message = match mode {
                    RebuildMode::Switch => "System rebuilt and activated".to_string(),
                    RebuildMode::Boot => "System rebuilt; active after next boot".to_string(),
                    RebuildMode::Test => "System rebuilt and activated until reboot".to_string(),
                    RebuildMode::Build | RebuildMode::DryBuild => format!("Rebuild ({}) finished", mode),
                };
                Ok(system_result(&message, outcome).with_data("mode", mode.as_arg()))
            }
            IntentKind::Rollback => {
                running("Rolling back to the previous generation");
                let outcome = self.executor.system(SystemOp::Rollback, commands, op).await?;
                processing();
                Ok(system_result("Rolled back to the previous generation", outcome))
            }
            IntentKind::SwitchGeneration { generation } => {
                running(&format!("Switching to generation {}", generation));
                let outcome = self
                    .executor
                    .system(SystemOp::SwitchGeneration(*generation), commands, op)
                    .await?;
                processing();
                Ok(system_result(&format!("Switched to generation {}", generation), outcome)
                    .with_data("generation", *generation))
            }
            IntentKind::ListGenerations => {
                running("Reading system generations");
                let outcome = self.executor.system(SystemOp::ListGenerations, commands, op).await?;
                processing();
                Ok(generations_result(outcome))
            }
            IntentKind::GarbageCollect => {
                running("Collecting garbage");
                let outcome = self.executor.run(commands, op).await?;
                processing();
                let freed = outcome
                    .stdout
                    .lines()
                    .rev()
                    .find(|l| l.contains("freed"))
                    .map(|l| l.trim().to_string());
                let message = match &freed {
                    Some(line) => format!("Garbage collection finished: {}", line),
                    None => "Garbage collection finished".to_string(),
                };
                Ok(OperationResult::success(message).with_commands(outcome.commands))
            }
            IntentKind::Status => {
                running("Collecting system status");
                let result = self.status(op).await?;
                processing();
                Ok(result)
            }
            IntentKind::ServiceStatus { service } => {
                running(&format!("Checking service {}", service));
                let outcome = self.executor.run(commands, op).await?;
                processing();
                Ok(service_status_result(service, outcome))
            }
            IntentKind::ListServices => {
                running("Listing services");
                let outcome = self.executor.run(commands, op).await?;
                processing();
                Ok(services_result(outcome))
            }
            IntentKind::ShowConfig => {
                running("Reading the system configuration");
                let outcome = self.executor.run(commands, op).await?;
                processing();
                let path = self.settings.nix.configuration_path.display().to_string();
                let message = format!("{}:\n{}", path, outcome.stdout.trim_end());
                Ok(OperationResult::success(message)
                    .with_data("path", path)
                    .with_commands(outcome.commands))
            }
            IntentKind::Query { topic } => Ok(explain(topic)),
            IntentKind::Help => Ok(OperationResult::success(knowledge::help_text())),
            IntentKind::Unknown => Ok(OperationResult::failure("nothing to execute")),
        }
    }

    /// Version is required; channels and generation are best effort
    async fn status(&self, op: Uuid) -> Result<OperationResult, ExecError> {
        let builder = CommandBuilder::new(&self.settings);
        let mut commands = Vec::new();

        let version = self.executor.run(&[builder.nixos_version()], op).await?;
        commands.extend(version.commands);
        let version = version.stdout.trim().to_string();

        let channels = match self.executor.run(&[builder.channels()], op).await {
            Ok(outcome) => {
                commands.extend(outcome.commands);
                parsers::parse_channels(&outcome.stdout)
            }
            Err(e) => {
                warn!("nix-channel --list failed: {}", e);
                Vec::new()
            }
        };

        let current = match self
            .executor
            .system(SystemOp::CurrentGeneration, &builder.list_generations(), op)
            .await
        {
            Ok(outcome) => {
                commands.extend(outcome.commands.clone());
                generations_from(&outcome).into_iter().find(|g| g.current)
            }
            Err(e) => {
                warn!("current generation unavailable: {}", e);
                None
            }
        };

        let mut lines = vec![format!("NixOS version: {}", version)];
        match &current {
            Some(g) => lines.push(format!("Current generation: {}", g.summary())),
            None => lines.push("Current generation: unknown".to_string()),
        }
        if channels.is_empty() {
            lines.push("Channels: none".to_string());
        } else {
            lines.push("Channels:".to_string());
            for (name, url) in &channels {
                lines.push(format!("  • {} {}", name, url));
            }
        }
        lines.push(format!("Executor: {}", self.executor.kind().as_str()));

        let channel_map: serde_json::Map<String, serde_json::Value> = channels
            .iter()
            .map(|(name, url)| (name.clone(), json!(url)))
            .collect();
        Ok(OperationResult::success(lines.join("\n"))
            .with_data("nixos_version", version)
            .with_data("current_generation", current.map(|g| g.number))
            .with_data("channels", channel_map)
            .with_data("executor", self.executor.kind().as_str())
            .with_commands(commands))
    }
}

/// Response for front-ends, text styled by `personality`
pub fn render(intent: &Intent, result: &OperationResult, personality: Personality) -> Response {
    let text = display_text(result);
    Response::from_result(result)
        .with_intent(intent.intent_type())
        .with_text(personality.apply(&text, result.success))
}

/// What front-ends show: message, else the error
pub fn display_text(result: &OperationResult) -> String {
    match (&result.error, result.message.is_empty()) {
        (Some(error), true) => format!("Error: {}", error),
        (Some(error), false) => format!("{}\nError: {}", result.message, error),
        (None, _) => result.message.clone(),
    }
}

fn not_understood(intent: &Intent) -> OperationResult {
    let mut result = OperationResult::failure(format!(
        "I didn't understand \"{}\"",
        intent.raw_query.trim()
    ))
    .with_suggestions(knowledge::example_suggestions())
    .with_data("confidence", intent.confidence);
    if let Some(verb) = intent.context.get("verb") {
        result = result.with_message(format!(
            "I recognized \"{}\" but not what it should apply to.",
            verb
        ));
    }
    result
}

fn explain(topic: &str) -> OperationResult {
    match knowledge::explain(topic) {
        Some(text) => OperationResult::success(text).with_data("topic", topic),
        None => OperationResult::failure(format!("I don't have an explanation for '{}' yet", topic))
            .with_suggestions(
                knowledge::topics()
                    .into_iter()
                    .map(|t| format!("Try: 'what is a {}?'", t))
                    .take(4)
                    .collect(),
            ),
    }
}

fn failure_from(err: ExecError, commands: &[CommandSpec]) -> OperationResult {
    let text = err.to_string();
    warn!("Operation failed: {}", text);
    let mut suggestions = remediation::suggestions_for(&text);
    if suggestions.is_empty() {
        suggestions.push("Run the command yourself to see the full output".to_string());
    }
    OperationResult::failure(text)
        .with_commands(command_lines(commands))
        .with_suggestions(suggestions)
}

fn bullet_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.map(|i| format!("  • {}", i)).collect::<Vec<_>>().join("\n")
}

fn search_result(query: &str, outcome: ExecOutcome) -> OperationResult {
    let hits = match parsers::parse_search_json(&outcome.stdout) {
        Ok(hits) => hits,
        Err(e) => {
            return OperationResult::failure(format!("could not read nix search output: {}", e))
                .with_commands(outcome.commands)
        }
    };
    let names: Vec<String> = hits.iter().map(|h| h.name.clone()).collect();
    if hits.is_empty() {
        return OperationResult::success(format!("No packages found matching '{}'", query))
            .with_data("packages", names)
            .with_commands(outcome.commands)
            .with_suggestions(vec![
                "Try a shorter or more general search term".to_string(),
            ]);
    }

    let mut message = format!("Found {} package(s) matching '{}':\n", hits.len(), query);
    let listed: Vec<String> = hits
        .iter()
        .take(MAX_LISTED_HITS)
        .map(|h| {
            let mut line = format!("  • {}", h.name);
            if !h.version.is_empty() {
                line.push_str(&format!(" ({})", h.version));
            }
            if !h.description.is_empty() {
                line.push_str(&format!(" - {}", h.description));
            }
            line
        })
        .collect();
    message.push_str(&listed.join("\n"));
    if hits.len() > MAX_LISTED_HITS {
        message.push_str(&format!("\n  … and {} more", hits.len() - MAX_LISTED_HITS));
    }

    OperationResult::success(message)
        .with_data("packages", names)
        .with_data("results", serde_json::to_value(&hits).unwrap_or_default())
        .with_commands(outcome.commands)
}

fn service_status_result(service: &str, outcome: ExecOutcome) -> OperationResult {
    let props = parsers::parse_unit_properties(&outcome.stdout);
    let get = |key: &str| props.get(key).map(String::as_str).unwrap_or_default();
    let unit = match get("Id") {
        "" => service,
        id => id,
    };
    if get("LoadState") == "not-found" {
        return OperationResult::failure(format!("No service named '{}'", service))
            .with_data("service", unit)
            .with_commands(outcome.commands)
            .with_suggestions(vec!["Try 'list services' to see the units on this system".to_string()]);
    }

    let (active, sub) = (get("ActiveState"), get("SubState"));
    let mut message = format!("{} is {}", unit, active);
    if !sub.is_empty() && sub != active {
        message.push_str(&format!(" ({})", sub));
    }
    if !get("Description").is_empty() {
        message.push_str(&format!("\n  {}", get("Description")));
    }
    OperationResult::success(message)
        .with_data("service", unit)
        .with_data("active_state", active)
        .with_data("sub_state", sub)
        .with_commands(outcome.commands)
}

fn services_result(outcome: ExecOutcome) -> OperationResult {
    let units = parsers::parse_service_units(&outcome.stdout);
    let running = units.iter().filter(|u| u.is_running()).count();
    let failed: Vec<&str> = units
        .iter()
        .filter(|u| u.active == "failed")
        .map(|u| u.unit.as_str())
        .collect();

    let mut message = format!("{} service(s), {} running", units.len(), running);
    if !failed.is_empty() {
        message.push_str(&format!(", {} failed:\n{}", failed.len(), bullet_list(failed.iter().copied())));
    }
    let mut result = OperationResult::success(message)
        .with_data("services", serde_json::to_value(&units).unwrap_or_default())
        .with_data("running", running)
        .with_commands(outcome.commands);
    if !failed.is_empty() {
        result = result.with_suggestions(
            failed
                .iter()
                .take(3)
                .map(|u| format!("Try: 'status of {}'", u.trim_end_matches(".service")))
                .collect(),
        );
    }
    result
}

fn system_result(message: &str, outcome: ExecOutcome) -> OperationResult {
    let mut result = OperationResult::success(message)
        .with_data("backend", outcome.backend.as_str())
        .with_commands(outcome.commands);
    if let Some(note) = outcome.note {
        result = result.with_data("native", note);
    }
    result
}

/// Generations from a native outcome, or parsed from `list-generations --json`
fn generations_from(outcome: &ExecOutcome) -> Vec<Generation> {
    if !outcome.generations.is_empty() {
        return outcome.generations.clone();
    }
    parsers::parse_generations_json(&outcome.stdout).unwrap_or_else(|e| {
        warn!("could not parse list-generations output: {}", e);
        Vec::new()
    })
}

fn generations_result(outcome: ExecOutcome) -> OperationResult {
    let generations = generations_from(&outcome);
    let message = if generations.is_empty() {
        "No system generations found".to_string()
    } else {
        format!(
            "{} generation(s):\n{}",
            generations.len(),
            generations
                .iter()
                .map(|g| format!("  • {}", g.summary()))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };
    let current = generations.iter().find(|g| g.current).map(|g| g.number);
    OperationResult::success(message)
        .with_data("generations", serde_json::to_value(&generations).unwrap_or_default())
        .with_data("current_generation", current)
        .with_data("backend", outcome.backend.as_str())
        .with_commands(outcome.commands)
}
