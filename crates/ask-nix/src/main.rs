//! ask-nix - manage NixOS in plain English

use ask_nix::app;
use ask_nix::cli::Cli;
use ask_nix::errors::EXIT_FAILED;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match app::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ask-nix: {:#}", e);
            EXIT_FAILED
        }
    };
    std::process::exit(code);
}
