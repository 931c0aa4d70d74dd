//! Request handling shared by one-shot and interactive use

use anyhow::Result;
use luminous_common::config::config_path;
use luminous_common::{parse, render, Dispatcher, RequestContext, RequestLogEntry, Settings};
use luminous_shared::{Intent, IntentKind};
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::errors::{exit_code, EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use crate::output::{print_response, OutputOptions};
use crate::progress_display::ProgressDisplay;
use crate::{logging, repl};

/// A dispatcher plus the options every request of this process shares
pub struct Session {
    dispatcher: Dispatcher,
    pub ctx: RequestContext,
    pub output: OutputOptions,
    request_log: bool,
    _progress: Option<ProgressDisplay>,
}

impl Session {
    pub fn new(settings: Settings, cli: &Cli) -> Self {
        let mut ctx = RequestContext::from_settings(&settings)
            .with_dry_run(cli.dry_run(settings.core.dry_run));
        if let Some(personality) = cli.personality {
            ctx = ctx.with_personality(personality);
        }
        let request_log = settings.log.request_log;
        let dispatcher = Dispatcher::from_settings(settings);
        let output = OutputOptions::detect(cli.json);
        let progress = if output.json {
            None
        } else {
            ProgressDisplay::attach(dispatcher.bus())
        };
        debug!("executor: {}", dispatcher.executor_kind().as_str());

        Self {
            dispatcher,
            ctx,
            output,
            request_log,
            _progress: progress,
        }
    }

    /// Parse, dispatch, log and print one request; returns the exit code
    pub async fn ask(&self, query: &str) -> Result<i32> {
        let intent = parse(query);
        debug!(
            "parsed {:?} as {} ({:.2})",
            query,
            intent.intent_type(),
            intent.confidence
        );
        self.handle(&intent, &self.ctx).await
    }

    /// System status always runs: it only reads
    pub async fn status(&self) -> Result<i32> {
        let intent = Intent::new(IntentKind::Status, "status", 1.0);
        self.handle(&intent, &self.ctx.with_dry_run(false)).await
    }

    async fn handle(&self, intent: &Intent, ctx: &RequestContext) -> Result<i32> {
        let result = self.dispatcher.process(intent, ctx).await;
        if self.request_log {
            RequestLogEntry::new(intent, &result, ctx.dry_run).write();
        }
        let response = render(intent, &result, ctx.personality);
        print_response(&response, self.output)?;
        Ok(exit_code(intent, &response))
    }
}

/// Entry point behind `main`
pub async fn run(cli: Cli) -> Result<i32> {
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ask-nix: {}", e);
            return Ok(EXIT_CONFIG_ERROR);
        }
    };
    logging::init(&settings.log.level, cli.verbose);

    if let Some(Commands::Config { path, .. }) = &cli.command {
        return show_config(&cli, &settings, *path);
    }

    let query = cli.query_text();
    let session = Session::new(settings, &cli);
    match (&cli.command, query) {
        (Some(Commands::Status), _) => session.status().await,
        (None, Some(query)) => session.ask(&query).await,
        _ => repl::run(session).await,
    }
}

fn show_config(cli: &Cli, settings: &Settings, path_only: bool) -> Result<i32> {
    let path = cli.config.clone().unwrap_or_else(config_path);
    if path_only {
        println!("{}", path.display());
    } else {
        println!("# {}", path.display());
        print!("{}", settings.to_toml()?);
    }
    Ok(EXIT_SUCCESS)
}
