//! Response rendering for the terminal
//!
//! Human output uses color only when `console` says the terminal supports
//! it (TTY, NO_COLOR unset). JSON output is the serialized `Response` and
//! nothing else, so it can be piped.

use anyhow::Result;
use luminous_shared::Response;
use owo_colors::OwoColorize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub color: bool,
}

impl OutputOptions {
    pub fn detect(json: bool) -> Self {
        Self {
            json,
            color: !json && console::colors_enabled(),
        }
    }
}

pub fn print_response(response: &Response, opts: OutputOptions) -> Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        print!("{}", format_response(response, opts.color));
    }
    Ok(())
}

/// Human-readable rendering: text, planned commands, suggestions
pub fn format_response(response: &Response, color: bool) -> String {
    let mut out = String::new();

    if response.success {
        let _ = writeln!(out, "{}", response.text);
    } else if color {
        let _ = writeln!(out, "{} {}", "✗".red().bold(), response.text);
    } else {
        let _ = writeln!(out, "✗ {}", response.text);
    }

    let dry_run = response
        .data
        .get("dry_run")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if dry_run && !response.commands.is_empty() {
        out.push('\n');
        for command in &response.commands {
            if color {
                let _ = writeln!(out, "  {} {}", "$".dimmed(), command.bright_cyan());
            } else {
                let _ = writeln!(out, "  $ {}", command);
            }
        }
        let note = "Dry run: nothing was changed. Add --execute to apply.";
        if color {
            let _ = writeln!(out, "{}", note.dimmed());
        } else {
            let _ = writeln!(out, "{}", note);
        }
    }

    if !response.suggestions.is_empty() {
        out.push('\n');
        if color {
            let _ = writeln!(out, "{}", "Suggestions:".yellow().bold());
        } else {
            let _ = writeln!(out, "Suggestions:");
        }
        for suggestion in &response.suggestions {
            let _ = writeln!(out, "  • {}", suggestion);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use luminous_shared::OperationResult;

    #[test]
    fn test_dry_run_shows_commands() {
        let result = OperationResult::success("Would install: firefox")
            .with_data("dry_run", true)
            .with_commands(vec!["nix profile install nixpkgs#firefox".to_string()]);
        let text = format_response(&Response::from_result(&result), false);
        assert!(text.starts_with("Would install: firefox\n"));
        assert!(text.contains("  $ nix profile install nixpkgs#firefox"));
        assert!(text.contains("--execute"));
    }

    #[test]
    fn test_failure_lists_suggestions() {
        let result = OperationResult::failure("permission denied")
            .with_message("Error: permission denied")
            .with_suggestions(vec!["Run with elevated privileges".to_string()]);
        let text = format_response(&Response::from_result(&result), false);
        assert!(text.starts_with("✗ Error: permission denied"));
        assert!(text.contains("Suggestions:\n  • Run with elevated privileges"));
    }

    #[test]
    fn test_executed_commands_are_not_repeated() {
        let result = OperationResult::success("Installed firefox")
            .with_commands(vec!["nix profile install nixpkgs#firefox".to_string()]);
        let text = format_response(&Response::from_result(&result), false);
        assert_eq!(text, "Installed firefox\n");
    }
}
