//! CLI integration tests for ask-nix
//!
//! Every test runs the real binary against a throwaway config and request
//! log. Only preview (dry-run) paths are exercised, so nothing touches the
//! system.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn request_log(&self) -> PathBuf {
        self.dir.path().join("requests.jsonl")
    }

    fn write_config(&self, content: &str) {
        std::fs::write(self.config(), content).expect("write config");
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ask-nix"));
        cmd.env("LUMINOUS_NIX_CONFIG", self.config())
            .env("LUMINOUS_NIX_LOG_FILE", self.request_log())
            .env("HOME", self.dir.path())
            .env("NO_COLOR", "1")
            .env_remove("LUMINOUS_LOG")
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run ask-nix")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("log line is JSON"))
        .collect()
}

#[test]
fn test_version() {
    let output = Sandbox::new().run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("ask-nix "));
}

#[test]
fn test_dry_run_install() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["install", "firefox"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Would install: firefox"), "{}", text);
    assert!(text.contains("$ nix profile install nixpkgs#firefox"), "{}", text);
}

#[test]
fn test_json_output() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--json", "install", "firefox"]);

    assert_eq!(output.status.code(), Some(0));
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).expect("JSON on stdout");
    assert_eq!(response["success"], true);
    assert_eq!(response["intent"], "install");
    assert_eq!(response["commands"][0], "nix profile install nixpkgs#firefox");
    assert_eq!(response["data"]["dry_run"], true);
}

#[test]
fn test_minimal_personality() {
    let output = Sandbox::new().run(&["-p", "minimal", "remove", "vim"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("Would remove: vim\n"));
}

#[test]
fn test_not_understood_exit_code() {
    let output = Sandbox::new().run(&["blue", "sky", "thinking"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(stdout(&output).contains("Try: 'install firefox'"));
}

#[test]
fn test_malformed_config_exit_code() {
    let sandbox = Sandbox::new();
    sandbox.write_config("[core\ndry_run = maybe\n");
    let output = sandbox.run(&["install", "firefox"]);

    assert_eq!(output.status.code(), Some(78));
    assert!(stderr(&output).contains("config.toml"), "{}", stderr(&output));
}

#[test]
fn test_config_values_apply() {
    let sandbox = Sandbox::new();
    sandbox.write_config("[core]\npersonality = \"technical\"\n\n[nix]\ninstall_method = \"env\"\n");
    let output = sandbox.run(&["install", "htop"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("nix-env -iA nixpkgs.htop"), "{}", text);
    assert!(text.contains("declarative"), "{}", text);
}

#[test]
fn test_config_path() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["config", "--path"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), sandbox.config().display().to_string());
}

#[test]
fn test_config_show() {
    let output = Sandbox::new().run(&["config"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("[core]"));
    assert!(text.contains("dry_run = true"));
}

#[test]
fn test_request_log_written() {
    let sandbox = Sandbox::new();
    sandbox.run(&["install", "firefox"]);
    sandbox.run(&["what", "is", "a", "flake"]);

    let entries = read_lines(&sandbox.request_log());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["intent"], "install");
    assert_eq!(entries[0]["query"], "install firefox");
    assert_eq!(entries[0]["dry_run"], true);
    assert_eq!(entries[1]["intent"], "query");
}

#[test]
fn test_dry_run_conflicts_with_execute() {
    let output = Sandbox::new().run(&["--dry-run", "--execute", "install", "vim"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_interactive_session() {
    use std::io::Write;

    let sandbox = Sandbox::new();
    let mut child = sandbox
        .command()
        .arg("interactive")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ask-nix");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"install vim\n:personality minimal\nremove htop\nquit\n")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("Would install: vim"), "{}", text);
    assert!(text.contains("Personality: minimal"), "{}", text);
    assert!(text.contains("Would remove: htop"), "{}", text);
}
