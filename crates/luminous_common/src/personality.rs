//! Response personalities
//!
//! Post-processes the text of a response. Styles only wrap the text; they
//! never change success, error or data.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    /// Warm, balanced
    #[default]
    Friendly,
    /// Just the facts
    Minimal,
    /// Adds a note on the declarative model
    Technical,
    /// Supportive, for people learning NixOS
    Encouraging,
    /// Asks for feedback
    Symbiotic,
}

impl Personality {
    pub fn all() -> &'static [Personality] {
        &[
            Personality::Friendly,
            Personality::Minimal,
            Personality::Technical,
            Personality::Encouraging,
            Personality::Symbiotic,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Friendly => "friendly",
            Personality::Minimal => "minimal",
            Personality::Technical => "technical",
            Personality::Encouraging => "encouraging",
            Personality::Symbiotic => "symbiotic",
        }
    }

    /// Wrap `text` in this style
    pub fn apply(&self, text: &str, success: bool) -> String {
        let text = text.trim_end();
        match self {
            Personality::Minimal => text.to_string(),
            Personality::Friendly if success => {
                format!("{}\n\nLet me know if you need anything else!", text)
            }
            Personality::Friendly => {
                format!("Hmm, that didn't work out.\n{}", text)
            }
            Personality::Technical => {
                format!(
                    "{}\n\nNote: NixOS is declarative; persistent system changes belong in configuration.nix.",
                    text
                )
            }
            Personality::Encouraging if success => {
                format!("Great! {}\n\nYou're getting the hang of NixOS. Keep it up!", text)
            }
            Personality::Encouraging => {
                format!("{}\n\nDon't worry, this happens to everyone. Let's sort it out.", text)
            }
            Personality::Symbiotic => {
                format!(
                    "{}\n\nI'm still learning! Was this helpful? Your feedback helps me improve.",
                    text
                )
            }
        }
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "friendly" => Ok(Personality::Friendly),
            "minimal" => Ok(Personality::Minimal),
            "technical" => Ok(Personality::Technical),
            "encouraging" => Ok(Personality::Encouraging),
            "symbiotic" => Ok(Personality::Symbiotic),
            other => Err(format!(
                "unknown personality '{}' (expected one of: friendly, minimal, technical, encouraging, symbiotic)",
                other
            )),
        }
    }
}
