//! ask-nix - command-line front-end for Luminous Nix

pub mod app;
pub mod cli;
pub mod errors;
pub mod logging;
pub mod output;
pub mod progress_display;
pub mod repl;
