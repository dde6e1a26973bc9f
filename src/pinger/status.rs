use std::collections::BTreeSet;
use std::fmt::Write;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::error;

use super::PingError;

const ANONYMOUS_PLAYER: &str = "Anonymous Player";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusResponse {
    /// Plain string or chat component.
    pub description: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub players: Players,
    #[serde(deserialize_with = "null_as_default")]
    pub version: Version,
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Players {
    pub max: Option<i64>,
    pub online: Option<i64>,
    pub sample: Option<Vec<Player>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Player {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Version {
    pub name: Option<String>,
    pub protocol: Option<i64>,
}

impl StatusResponse {
    pub fn from_json(body: &str) -> Result<Self, PingError> {
        serde_json::from_str(body).map_err(|source| {
            error!("Invalid response: {}", body);
            PingError::InvalidResponse {
                body: body.to_string(),
                source,
            }
        })
    }

    /// MOTD without formatting codes, on a single line.
    pub fn motd(&self) -> String {
        let mut text = String::new();
        if let Some(description) = &self.description {
            component_text(description, &mut text);
        }
        strip_formatting(&text)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Named players from the sample, sorted and deduplicated.
    pub fn player_names(&self) -> BTreeSet<&str> {
        self.players
            .sample
            .iter()
            .flatten()
            .map(|player| player.name.as_str())
            .filter(|name| !name.trim().is_empty() && *name != ANONYMOUS_PLAYER)
            .collect()
    }

    /// One status line, plus the sampled player names when there are any.
    /// The names are followed by `online` minus their count. An unknown
    /// `online` counts as -1 there as well.
    pub fn summary(&self, address: &str) -> String {
        let online = self.players.online.unwrap_or(-1);
        let max = self.players.max.unwrap_or(-1);
        let version = self.version.name.as_deref().unwrap_or("");

        let mut line = format!("{} ({}/{}) [{}] \"{}\"", address, online, max, version, self.motd());

        let names = self.player_names();
        if !names.is_empty() {
            let named = names.len() as i64;
            let _ = write!(line, "\n └ {}", names.into_iter().collect::<Vec<_>>().join(", "));
            let diff = online - named;
            if diff > 0 {
                let _ = write!(line, " +{}", diff);
            } else if diff < 0 {
                let _ = write!(line, " {}", diff);
            }
        }
        line
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn component_text(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| component_text(part, out)),
        Value::Object(component) => {
            if let Some(text) = component.get("text") {
                component_text(text, out);
            }
            if let Some(extra) = component.get("extra") {
                component_text(extra, out);
            }
        }
        _ => {}
    }
}

/// Drops legacy `§x` formatting codes.
fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
