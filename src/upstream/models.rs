// Serde shapes of the Cristalix profile payloads.
//
// Every field is optional on the wire. A payload only turns into a
// `ResolvedProfile` when both the id and the skin URL are present and
// non-empty; anything less is treated the same as "player not found".

use serde::Deserialize;
use serde_json::Value;

use crate::cache::ResolvedProfile;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Textures {
    pub skin: Option<String>,
    pub cape: Option<String>,
}

/// Response of `getProfileByName`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleProfile {
    pub id: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub textures: Option<Textures>,
}

/// One element of the `getProfilesByNames` response array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchProfile {
    pub id: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub textures: Option<Textures>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn complete(id: Option<&String>, textures: Option<&Textures>) -> Option<ResolvedProfile> {
    let id = non_empty(id)?;
    let skin = non_empty(textures.and_then(|t| t.skin.as_ref()))?;
    Some(ResolvedProfile::new(id, skin))
}

impl SingleProfile {
    /// Parse a single-profile payload. Anything that isn't an object with
    /// the expected fields yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    pub fn into_resolved(self) -> Option<ResolvedProfile> {
        complete(self.id.as_ref(), self.textures.as_ref())
    }
}

impl BatchProfile {
    /// Parse a batch payload. A non-array payload counts as empty and
    /// elements that don't match the shape are skipped individually.
    pub fn list_from_value(value: Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The upstream spelling of the username plus the resolved profile,
    /// if the element is complete.
    pub fn into_resolved(self) -> Option<(String, ResolvedProfile)> {
        let username = non_empty(self.username.as_ref())?.to_string();
        let profile = complete(self.id.as_ref(), self.textures.as_ref())?;
        Some((username, profile))
    }
}
