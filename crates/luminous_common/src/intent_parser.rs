//! Intent Parser - natural language to intent mapping
//!
//! Ordered regex rules over normalized text; the first rule that matches
//! wins and assigns its fixed confidence. Package names are whatever tokens
//! remain after stopword removal. They are not checked against nixpkgs.

use luminous_shared::{Intent, IntentKind, RebuildMode};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Confidence for text that matched no rule
pub const UNKNOWN_CONFIDENCE: f32 = 0.3;
/// Confidence for a recognized verb with nothing usable after it
pub const INCOMPLETE_CONFIDENCE: f32 = 0.45;

const HELP_CONFIDENCE: f32 = 0.95;
const PACKAGE_CONFIDENCE: f32 = 0.9;
const VAGUE_PACKAGE_CONFIDENCE: f32 = 0.6;
const WANT_CONFIDENCE: f32 = 0.8;
const SYSTEM_CONFIDENCE: f32 = 0.85;
const LISTING_CONFIDENCE: f32 = 0.9;
const GENERIC_UPDATE_CONFIDENCE: f32 = 0.7;
const SEARCH_CONFIDENCE: f32 = 0.8;
const QUERY_CONFIDENCE: f32 = 0.7;

fn compile<S: AsRef<str>>(patterns: &[S]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref();
            Regex::new(p).unwrap_or_else(|e| panic!("bad intent pattern {}: {}", p, e))
        })
        .collect()
}

/// `pattern` as a whole whitespace-delimited phrase. Unlike `\b`, a hyphen
/// does not delimit, so verbs inside names like `git-delete-merged-branches`
/// never match.
fn spaced(pattern: &str) -> String {
    format!(r"(?:^|\s)(?:{})(?:\s|$)", pattern)
}

static HELP: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^(help|help me|\?)$",
        r"\bwhat can you do\b",
        r"\bwhat can i (say|ask)\b",
        r"\bhow do i use (this|you)\b",
        r"\b(show me|list( of)?) (the )?commands\b",
    ])
});

static SWITCH_GENERATION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(?:switch|change|go)\s+(?:back\s+)?to\s+generation\s+#?(\d+)\b",
        r"\broll\s*back\s+to\s+generation\s+#?(\d+)\b",
        r"\buse\s+generation\s+#?(\d+)\b",
        r"\bboot\s+(?:into|to)\s+generation\s+#?(\d+)\b",
    ])
});

static GARBAGE_COLLECT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bgarbage[\s-]+collect(ion)?\b",
        spaced(r"gc").as_str(),
        spaced(r"clean\s*up").as_str(),
        r"\bfree\s+(up\s+)?(some\s+)?(disk\s+)?space\b",
        r"\b(delete|remove)\s+(the\s+)?old\s+(packages?|generations?)\b",
    ])
});

static LIST_INSTALLED: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(list|show|what)\s+(packages?\s+)?(are\s+|is\s+)?installed\b",
        r"\bwhat'?s\s+installed\b",
        r"\bwhat\s+do\s+i\s+have\s+installed\b",
        r"\bshow\s+(me\s+)?my\s+packages\b",
        r"\blist\s+(my\s+)?packages\b",
        r"\binstalled\s+packages?\b",
    ])
});

static REMOVE_VERB: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[spaced(r"remove|uninstall|delete|erase"), spaced(r"get\s+rid\s+of")])
});

static DONT_WANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bi\s+(?:don'?t|do\s+not)\s+want\s+(.+?)\s+any\s*more\b")
        .unwrap_or_else(|e| panic!("bad intent pattern: {}", e))
});

static INSTALL_VERB: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[spaced(r"install|add|get|set\s+up|setup")]));

/// Text that opens with an install verb and names something after it
static LEADING_INSTALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:install|add|get|set\s+up|setup)\s+\S")
        .unwrap_or_else(|e| panic!("bad intent pattern: {}", e))
});

static WANT_VERB: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[spaced(r"i\s+(?:need|want|would\s+like)")]));

static LIST_GENERATIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(list|show|view)\s+(me\s+)?(my\s+|the\s+)?(system\s+)?generations?\b",
        r"\bwhat\s+generations?\b",
        r"\bhistory\s+of\s+(my\s+)?system\b",
        r"^generations?$",
    ])
});

static ROLLBACK: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(rollback|roll\s+back|revert|undo)\b",
        r"\bgo\s+back\b",
        r"\b(previous|last|old)\s+(generation|version|state)\b",
    ])
});

static REBUILD: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(rebuild|apply)\s+(my\s+|the\s+)?(configuration|config|changes|system)\b",
        r"\b(nixos-)?rebuild\s+(switch|boot|test|build|dry-build)\b",
        r"\bapply\s+(the\s+)?changes?\b",
        r"\bactivate\s+(my\s+|the\s+)?(configuration|config)\b",
        r"\bdry[\s-]build\b",
        r"\b(validate|check|verify)\s+(my\s+|the\s+)?(nixos\s+|system\s+)?(configuration|config)(\.nix)?\b",
        r"^rebuild$",
    ])
});

static LIST_SERVICES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(list|show|view)\s+(me\s+)?(all\s+)?(my\s+|the\s+)?(running\s+|active\s+|failed\s+|system\s+)?services\b",
        r"\bwhat\s+services\b",
        r"\bstatus\s+of\s+(all\s+)?(my\s+|the\s+)?services\b",
        r"^services$",
    ])
});

/// Group 1 is the unit name
static SERVICE_STATUS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bstatus\s+of\s+(?:the\s+)?(?:service\s+)?([a-z0-9][a-z0-9@._-]*)",
        r"\bis\s+(?:the\s+)?([a-z0-9][a-z0-9@._-]*)\s+(?:service\s+)?(?:running|active|up|down)\b",
        r"\bcheck\s+(?:on\s+)?(?:the\s+)?([a-z0-9][a-z0-9@._-]*)\s+service\b",
        r"\b([a-z0-9][a-z0-9@._-]*)\s+service\s+status\b",
    ])
});

static SHOW_CONFIG: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(show|display|view|print|cat)\s+(me\s+)?(my\s+|the\s+)?(current\s+)?(nixos\s+|system\s+)?(configuration|config)(\.nix)?\b",
        r"^configuration\.nix$",
    ])
});

static STATUS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(system\s+)?status\b",
        r"\bsystem\s+info(rmation)?\b",
        r"\bhow\s+is\s+my\s+system\b",
        r"\b(health\s+check|system\s+health)\b",
        r"\b(what|which)\s+(nixos\s+)?version\b",
        r"\bnixos\s+version\b",
        r"\b(list|show|which|what)\s+(my\s+)?channels?\b",
    ])
});

static UPDATE_SYSTEM: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(update|upgrade|refresh)\s+(my\s+|the\s+)?(system|nixos|everything|all|channels?)\b",
        r"\b(system|nixos)\s+(update|upgrade)\b",
        r"^(update|upgrade)$",
    ])
});

static UPDATE_ANY: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"\b(update|upgrade)\b"]));

static SEARCH_VERB: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(search|find|look\s+for|looking\s+for|is\s+there)\b",
        r"\bwhat\s+(packages?|programs?)\b",
    ])
});

static QUERY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^(what\s+is|what\s+are|what'?s|explain|tell\s+me\s+about|describe|how\s+does|how\s+do)\b",
        r"\bwhat\s+(is|are)\b",
    ])
});

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // articles, pronouns, glue
        "a", "an", "the", "some", "me", "my", "i", "you", "it", "this", "that", "these",
        "those", "for", "to", "and", "also", "with", "of", "in", "on", "from", "as", "or",
        "too", "well", "via", "using", "called", "named", "any", "there", "is", "are", "do",
        "does", "how", "what", "which", "be",
        // politeness and modality
        "please", "pls", "thanks", "thank", "can", "could", "would", "will", "want", "need",
        "like", "just", "now", "quickly", "kindly", "hey", "hi",
        // verbs consumed by the rules
        "install", "add", "get", "setup", "set", "up", "remove", "uninstall", "delete",
        "erase", "rid", "search", "find", "look", "looking",
        // generic nouns
        "package", "packages", "program", "programs", "app", "apps", "application",
        "applications", "software", "tool", "tools", "system", "computer", "machine",
        "nixpkgs", "nix", "nixos", "new", "latest", "version", "anymore",
    ]
    .into_iter()
    .collect()
});

static VAGUE_WORDS: &[&str] = &["something", "anything", "stuff", "things", "thing", "everything"];

/// Package tokens: lowercase attribute-like names, never flag-like
static PACKAGE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_+][a-z0-9._+-]*$").unwrap_or_else(|e| panic!("bad token pattern: {}", e))
});

/// Parse free text into an intent
pub fn parse(text: &str) -> Intent {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Intent::unknown(text, UNKNOWN_CONFIDENCE);
    }
    match_rules(&normalized, text).unwrap_or_else(|| Intent::unknown(text, UNKNOWN_CONFIDENCE))
}

/// Lower-case, drop sentence punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let cleaned: String = lower
        .chars()
        .map(|c| match c {
            '?' | '!' | ',' | ';' | '"' | '`' => ' ',
            _ => c,
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c| matches!(c, '.' | ':'))
        .trim()
        .to_string()
}

/// Split on whitespace and drop stopwords and anything that is not a package-like token
pub fn extract_packages(fragment: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    fragment
        .split_whitespace()
        .map(|t| t.trim_matches(|c| matches!(c, '\'' | '.' | ':' | '(' | ')')))
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .filter(|t| PACKAGE_TOKEN.is_match(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

fn first_match<'t>(rules: &[Regex], text: &'t str) -> Option<regex::Match<'t>> {
    rules.iter().find_map(|re| re.find(text))
}

fn any_match(rules: &[Regex], text: &str) -> bool {
    rules.iter().any(|re| re.is_match(text))
}

/// Text after the first match of any rule
fn tail_after<'t>(rules: &[Regex], text: &'t str) -> Option<(&'t str, &'t str)> {
    first_match(rules, text).map(|m| (m.as_str(), &text[m.end()..]))
}

fn match_rules(text: &str, raw: &str) -> Option<Intent> {
    if any_match(&HELP, text) {
        return Some(Intent::new(IntentKind::Help, raw, HELP_CONFIDENCE));
    }

    // "install gc" installs gc: a leading install verb beats the system rules
    if LEADING_INSTALL.is_match(text) && !text.starts_with("get rid of") {
        if let Some(intent) = match_install(text, raw).filter(|i| !i.is_unknown()) {
            return Some(intent);
        }
    }

    for re in SWITCH_GENERATION.iter() {
        if let Some(caps) = re.captures(text) {
            if let Some(generation) = caps.get(1).and_then(|g| g.as_str().parse::<u32>().ok()) {
                return Some(Intent::new(
                    IntentKind::SwitchGeneration { generation },
                    raw,
                    LISTING_CONFIDENCE,
                ));
            }
        }
    }

    if any_match(&GARBAGE_COLLECT, text) {
        return Some(Intent::new(IntentKind::GarbageCollect, raw, SYSTEM_CONFIDENCE));
    }

    if any_match(&LIST_INSTALLED, text) {
        return Some(Intent::new(IntentKind::ListInstalled, raw, LISTING_CONFIDENCE));
    }

    if let Some(intent) = match_remove(text, raw) {
        return Some(intent);
    }

    if let Some(intent) = match_install(text, raw) {
        return Some(intent);
    }

    if any_match(&LIST_GENERATIONS, text) {
        return Some(Intent::new(IntentKind::ListGenerations, raw, LISTING_CONFIDENCE));
    }

    if any_match(&ROLLBACK, text) {
        return Some(Intent::new(IntentKind::Rollback, raw, SYSTEM_CONFIDENCE));
    }

    if any_match(&REBUILD, text) {
        let mode = rebuild_mode(text);
        return Some(
            Intent::new(IntentKind::Rebuild { mode }, raw, SYSTEM_CONFIDENCE)
                .with_context("mode", mode.as_arg()),
        );
    }

    if any_match(&LIST_SERVICES, text) {
        return Some(Intent::new(IntentKind::ListServices, raw, LISTING_CONFIDENCE));
    }

    if let Some(service) = service_name(text) {
        return Some(
            Intent::new(IntentKind::ServiceStatus { service: service.clone() }, raw, LISTING_CONFIDENCE)
                .with_context("service", service),
        );
    }

    if any_match(&SHOW_CONFIG, text) {
        return Some(Intent::new(IntentKind::ShowConfig, raw, LISTING_CONFIDENCE));
    }

    if any_match(&STATUS, text) {
        return Some(Intent::new(IntentKind::Status, raw, LISTING_CONFIDENCE));
    }

    if any_match(&UPDATE_SYSTEM, text) {
        return Some(Intent::new(IntentKind::Update, raw, SYSTEM_CONFIDENCE));
    }
    if any_match(&UPDATE_ANY, text) {
        return Some(Intent::new(IntentKind::Update, raw, GENERIC_UPDATE_CONFIDENCE));
    }

    if let Some((verb, tail)) = tail_after(&SEARCH_VERB, text) {
        let terms = extract_packages(tail);
        if terms.is_empty() {
            return Some(
                Intent::unknown(raw, INCOMPLETE_CONFIDENCE).with_context("verb", verb.trim()),
            );
        }
        return Some(
            Intent::new(
                IntentKind::Search {
                    query: terms.join(" "),
                },
                raw,
                SEARCH_CONFIDENCE,
            )
            .with_context("verb", verb.trim()),
        );
    }

    if let Some((_, tail)) = tail_after(&QUERY, text) {
        let topic = extract_packages(tail).join(" ");
        if !topic.is_empty() {
            return Some(Intent::new(IntentKind::Query { topic }, raw, QUERY_CONFIDENCE));
        }
    }

    None
}

fn match_remove(text: &str, raw: &str) -> Option<Intent> {
    if let Some(caps) = DONT_WANT.captures(text) {
        let packages = caps.get(1).map(|m| extract_packages(m.as_str())).unwrap_or_default();
        if !packages.is_empty() {
            return Some(
                Intent::new(IntentKind::Remove { packages }, raw, PACKAGE_CONFIDENCE)
                    .with_context("verb", "don't want"),
            );
        }
    }

    let (verb, tail) = tail_after(&REMOVE_VERB, text)?;
    let verb = verb.trim();
    let packages = extract_packages(tail);
    if packages.is_empty() {
        return Some(Intent::unknown(raw, INCOMPLETE_CONFIDENCE).with_context("verb", verb));
    }
    Some(Intent::new(IntentKind::Remove { packages }, raw, PACKAGE_CONFIDENCE).with_context("verb", verb))
}

fn match_install(text: &str, raw: &str) -> Option<Intent> {
    let (verb, tail, base_confidence) = match tail_after(&INSTALL_VERB, text) {
        Some((verb, tail)) => (verb, tail, PACKAGE_CONFIDENCE),
        None => {
            let (verb, tail) = tail_after(&WANT_VERB, text)?;
            // "i want to ..." names an action, not a package
            if tail.trim_start().starts_with("to ") {
                return None;
            }
            (verb, tail, WANT_CONFIDENCE)
        }
    };

    let verb = verb.trim();
    let packages = extract_packages(tail);
    if packages.is_empty() {
        return Some(Intent::unknown(raw, INCOMPLETE_CONFIDENCE).with_context("verb", verb));
    }

    let confidence = if packages.iter().all(|p| VAGUE_WORDS.contains(&p.as_str())) {
        VAGUE_PACKAGE_CONFIDENCE
    } else {
        base_confidence
    };
    Some(Intent::new(IntentKind::Install { packages }, raw, confidence).with_context("verb", verb))
}

/// Unit named by a service-status phrasing; "status of my system" names none
fn service_name(text: &str) -> Option<String> {
    SERVICE_STATUS
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.'))
        .find(|name| !name.is_empty() && !STOPWORDS.contains(name) && *name != "service")
        .map(str::to_string)
}

fn rebuild_mode(text: &str) -> RebuildMode {
    let words: Vec<&str> = text.split_whitespace().collect();
    let validates = ["validate", "check", "verify"].iter().any(|w| words.contains(w));
    if validates || text.contains("dry-build") || text.contains("dry build") {
        RebuildMode::DryBuild
    } else if words.contains(&"boot") {
        RebuildMode::Boot
    } else if words.contains(&"test") {
        RebuildMode::Test
    } else if words.contains(&"build") {
        RebuildMode::Build
    } else {
        RebuildMode::Switch
    }
}
