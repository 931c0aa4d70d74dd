//! Remediation hints for failed operations, matched on error text.

use once_cell::sync::Lazy;
use regex::Regex;

struct Hint {
    pattern: Regex,
    suggestions: &'static [&'static str],
}

fn hint(pattern: &str, suggestions: &'static [&'static str]) -> Hint {
    Hint {
        pattern: Regex::new(&format!("(?i){}", pattern))
            .unwrap_or_else(|e| panic!("bad remediation pattern {}: {}", pattern, e)),
        suggestions,
    }
}

static HINTS: Lazy<Vec<Hint>> = Lazy::new(|| {
    vec![
        hint(
            r"permission denied|operation not permitted|must be root|requires root",
            &[
                "This operation requires elevated privileges",
                "Try running with sudo if appropriate, or set nix.use_sudo = true",
            ],
        ),
        hint(
            r"attribute '.*' (missing|not found)|undefined variable|does not provide attribute|cannot find flake attribute",
            &[
                "The package name may be wrong",
                "Search for it first, e.g. 'search <name>'",
            ],
        ),
        hint(
            r"network (is )?unreachable|could not resolve|unable to download|connection (refused|timed out)|temporary failure in name resolution",
            &[
                "Check your internet connection",
                "If you are offline, try again once the network is back",
            ],
        ),
        hint(
            r"hash mismatch",
            &["The channel data may be stale; run 'nix-channel --update' and retry"],
        ),
        hint(
            r"no space left on device",
            &[
                "The disk is full",
                "Free space with 'garbage collect' (nix-collect-garbage -d)",
            ],
        ),
        hint(
            r"out of memory|cannot allocate memory",
            &["The build ran out of memory; close other programs or add swap"],
        ),
        hint(
            r"read-only file system",
            &["The Nix store is mounted read-only; check your mounts or run on the host system"],
        ),
        hint(
            r"timed out",
            &[
                "The operation took too long and was stopped",
                "Raise the limit under [timeouts] in the config file",
            ],
        ),
        hint(
            r"no such file or directory|command not found|failed to start",
            &["A required Nix tool is missing from PATH; is this a NixOS system?"],
        ),
        hint(
            r"no such generation|generation \d+ does not exist",
            &["List available generations with 'list generations'"],
        ),
    ]
});

/// Suggestions for an error text, in table order, without duplicates
pub fn suggestions_for(error: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for hint in HINTS.iter().filter(|h| h.pattern.is_match(error)) {
        for s in hint.suggestions.iter().copied() {
            if !out.iter().any(|existing| existing == s) {
                out.push(s.to_string());
            }
        }
    }
    out
}
