//! Built-in help and short explanations of Nix concepts

/// Example requests shown in help and when a request is not understood
pub const EXAMPLES: &[&str] = &[
    "install firefox",
    "remove vim",
    "search for text editors",
    "update my system",
    "rollback",
    "list generations",
    "switch to generation 42",
    "what's installed?",
    "garbage collect",
    "system status",
    "is sshd running?",
    "show my configuration",
    "what is a flake?",
];

const TOPICS: &[(&[&str], &str)] = &[
    (
        &["generation"],
        "A generation is a snapshot of your system configuration. Every rebuild \
         creates a new one, and the boot menu lists them. You can roll back to any \
         generation that has not been garbage collected.",
    ),
    (
        &["rollback", "roll back"],
        "Rolling back activates the previous system generation. Nothing is deleted, \
         so you can switch forward again later.",
    ),
    (
        &["flake"],
        "A flake is a Nix project with a flake.nix that pins its inputs in \
         flake.lock. Builds from flakes are reproducible across machines.",
    ),
    (
        &["channel"],
        "A channel is a named, regularly updated snapshot of nixpkgs. \
         'nix-channel --list' shows the ones you follow and 'update my system' \
         pulls the latest revision.",
    ),
    (
        &["garbage", "gc"],
        "Garbage collection deletes store paths nothing refers to. With -d it also \
         removes old generations first, so you cannot roll back to them afterwards.",
    ),
    (
        &["store"],
        "The Nix store (/nix/store) holds every package in its own directory named \
         by a hash of its inputs. Paths are immutable and shared between users.",
    ),
    (
        &["derivation"],
        "A derivation is a build recipe: inputs, a builder and environment. \
         Building it produces one or more store paths.",
    ),
    (
        &["profile"],
        "A profile is a symlink to the packages a user or the system has \
         installed. Installing or removing packages creates a new profile generation.",
    ),
    (
        &["declarative", "configuration.nix", "configuration"],
        "NixOS is configured declaratively: /etc/nixos/configuration.nix describes the \
         whole system and 'nixos-rebuild switch' makes it so. Packages installed \
         imperatively with nix profile only affect your user.",
    ),
    (
        &["nix-shell", "shell"],
        "nix-shell (or 'nix shell') gives you a temporary environment with extra \
         packages without installing them into your profile.",
    ),
];

/// Explanation for the first topic keyword found in `topic`
pub fn explain(topic: &str) -> Option<&'static str> {
    let topic = topic.to_lowercase();
    TOPICS
        .iter()
        .find(|(keys, _)| keys.iter().any(|k| topic.contains(k)))
        .map(|(_, text)| *text)
}

/// Names of the topics that have explanations
pub fn topics() -> Vec<&'static str> {
    TOPICS.iter().map(|(keys, _)| keys[0]).collect()
}

pub fn help_text() -> String {
    let mut text = String::from("I can help you manage NixOS in plain English. Try:\n");
    for example in EXAMPLES {
        text.push_str(&format!("  • {}\n", example));
    }
    text.push_str("\nChanges are only previewed until you run with --execute.");
    text
}

pub fn example_suggestions() -> Vec<String> {
    EXAMPLES.iter().take(5).map(|e| format!("Try: '{}'", e)).collect()
}
