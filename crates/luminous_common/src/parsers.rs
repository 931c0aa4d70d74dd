//! Parsers for Nix command output

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::native::Generation;

/// One `nix search --json` hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub attribute: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct RawSearchHit {
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
}

/// Installable name for a search attribute: `legacyPackages.x86_64-linux.vim` -> `vim`,
/// `legacyPackages.x86_64-linux.python3Packages.numpy` -> `python3Packages.numpy`
pub fn package_name_from_attr(attribute: &str) -> String {
    let mut parts = attribute.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("legacyPackages" | "packages"), Some(_system), Some(rest)) if !rest.is_empty() => {
            rest.to_string()
        }
        _ => attribute.rsplit('.').next().unwrap_or(attribute).to_string(),
    }
}

/// Parse `nix search <flake> <terms> --json`, sorted by attribute
pub fn parse_search_json(json: &str) -> Result<Vec<SearchHit>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: BTreeMap<String, RawSearchHit> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|(attribute, hit)| SearchHit {
            name: package_name_from_attr(&attribute),
            attribute,
            version: hit.version,
            description: hit.description,
        })
        .collect())
}

/// Parse `nixos-rebuild list-generations --json`, ascending by number
pub fn parse_generations_json(json: &str) -> Result<Vec<Generation>, serde_json::Error> {
    let mut generations: Vec<Generation> = serde_json::from_str(json)?;
    generations.sort_by_key(|g| g.number);
    Ok(generations)
}

/// Parse `nix-env -q`: one `name-version` per line
pub fn parse_env_query(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `nix profile list`, both the `Name:` block format and the older
/// `<index> <flake-ref>#<attr> <locked-ref> <store-path>` line format
pub fn parse_profile_list(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(name) = line.strip_prefix("Name:") {
            let name = name.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(index), Some(reference)) = (fields.next(), fields.next()) else {
            continue;
        };
        if index.parse::<u32>().is_err() {
            continue;
        }
        if let Some((_, attr)) = reference.split_once('#') {
            names.push(package_name_from_attr(attr));
        }
    }
    names
}

/// Parse `nix-channel --list` into `(name, url)` pairs
pub fn parse_channels(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            Some((fields.next()?.to_string(), fields.next()?.to_string()))
        })
        .collect()
}

/// One row of `systemctl list-units --plain --no-legend`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUnit {
    pub unit: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
}

impl ServiceUnit {
    pub fn is_running(&self) -> bool {
        self.active == "active" && self.sub == "running"
    }
}

/// Parse `systemctl list-units --type=service --plain --no-legend`
pub fn parse_service_units(output: &str) -> Vec<ServiceUnit> {
    output
        .lines()
        .filter_map(|line| {
            // some systemd versions still mark failed units with a bullet
            let mut rest = line.trim().trim_start_matches(['●', '*']);
            let unit = next_field(&mut rest)?;
            if !unit.ends_with(".service") {
                return None;
            }
            let load = next_field(&mut rest)?;
            let active = next_field(&mut rest)?;
            let sub = next_field(&mut rest)?;
            Some(ServiceUnit {
                unit: unit.to_string(),
                load: load.to_string(),
                active: active.to_string(),
                sub: sub.to_string(),
                description: rest.trim().to_string(),
            })
        })
        .collect()
}

/// Next whitespace-separated field; `rest` keeps whatever follows it
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let text: &'a str = *rest;
    let text = text.trim_start();
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    let (field, tail) = text.split_at(end);
    *rest = tail;
    (!field.is_empty()).then_some(field)
}

/// Parse `systemctl show` `Key=Value` lines
pub fn parse_unit_properties(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
