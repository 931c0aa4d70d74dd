//! Interactive prompt
//!
//! One request per line. `exit`/`quit` or end of input leaves; `:execute`
//! and `:dry-run` switch mode; `:personality <name>` changes the style.

use anyhow::Result;
use luminous_common::Personality;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::app::Session;
use crate::errors::EXIT_SUCCESS;

const PROMPT: &str = "ask-nix> ";

/// What a REPL line asks for
#[derive(Debug, PartialEq)]
pub enum ReplCommand {
    Quit,
    Empty,
    SetDryRun(bool),
    SetPersonality(Personality),
    Invalid(String),
    Ask(String),
}

pub fn classify(line: &str) -> ReplCommand {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => return ReplCommand::Empty,
        "exit" | "quit" | "bye" | ":q" => return ReplCommand::Quit,
        ":execute" => return ReplCommand::SetDryRun(false),
        ":dry-run" | ":dryrun" => return ReplCommand::SetDryRun(true),
        _ => {}
    }
    if let Some(name) = line.strip_prefix(":personality") {
        return match name.trim().parse() {
            Ok(personality) => ReplCommand::SetPersonality(personality),
            Err(e) => ReplCommand::Invalid(e),
        };
    }
    if line.starts_with(':') {
        return ReplCommand::Invalid(format!("unknown command {}", line));
    }
    ReplCommand::Ask(line.to_string())
}

pub async fn run(mut session: Session) -> Result<i32> {
    let color = session.output.color;
    let mode = if session.ctx.dry_run { "preview" } else { "execute" };
    if color {
        println!("{}", "Luminous Nix".bright_cyan().bold());
    } else {
        println!("Luminous Nix");
    }
    println!("Ask in plain English. Mode: {}. Type 'exit' to leave.\n", mode);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        match classify(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => {}
            ReplCommand::SetDryRun(dry_run) => {
                session.ctx = session.ctx.with_dry_run(dry_run);
                println!(
                    "{}",
                    if dry_run {
                        "Preview mode: changes are only shown."
                    } else {
                        "Execute mode: changes will be applied."
                    }
                );
            }
            ReplCommand::SetPersonality(personality) => {
                session.ctx = session.ctx.with_personality(personality);
                println!("Personality: {}", personality);
            }
            ReplCommand::Invalid(message) => eprintln!("{}", message),
            ReplCommand::Ask(query) => {
                session.ask(&query).await?;
                println!();
            }
        }
    }

    Ok(EXIT_SUCCESS)
}
