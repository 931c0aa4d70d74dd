//! Luminous Nix common - parsing, dispatch and execution of NixOS requests.
//!
//! raw text -> [`intent_parser::parse`] -> [`Dispatcher::process`] ->
//! executor (native API or subprocess) -> `OperationResult` -> personality text.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod intent_parser;
pub mod knowledge;
pub mod native;
pub mod parsers;
pub mod personality;
pub mod progress_bus;
pub mod remediation;
pub mod request_log;
pub mod runner;

pub use commands::{CommandBuilder, CommandSpec};
pub use config::{ConfigError, InstallMethod, Settings};
pub use dispatcher::{display_text, render, Dispatcher, RequestContext};
pub use executor::{
    select_executor, Backend, ExecutorKind, NativeApiExecutor, NixExecutor, SubprocessExecutor,
};
pub use intent_parser::parse;
pub use native::{Generation, NativeError, NativeNixApi, ProfileDirApi};
pub use personality::Personality;
pub use progress_bus::ProgressBus;
pub use request_log::RequestLogEntry;
pub use runner::{CommandOutput, CommandRunner, ExecError, TokioRunner};

pub use luminous_shared;
