// Profile cache: lowercase-keyed, time-to-live map of resolved profiles.
//
// Expiry is a read-time predicate only: a stale entry stays in the map until
// a newer fetch overwrites it or the cache is cleared. Nothing runs in the
// background. Shared by every concurrent resolution via interior mutability,
// so callers only need a &self reference.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default time-to-live for cached profiles (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A player profile resolved from the upstream API.
///
/// Only ever built from a payload that carried both a player id and a skin
/// URL; see `upstream::models`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub player_id: String,
    pub texture_url: String,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedProfile {
    /// A profile resolved right now.
    pub fn new(player_id: impl Into<String>, texture_url: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            texture_url: texture_url.into(),
            resolved_at: Utc::now(),
        }
    }

    /// Time since the profile was fetched. A timestamp in the future counts as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.resolved_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Snapshot of the cache for observability endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheEntryStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryStats {
    pub username: String,
    pub player_id: String,
    pub age_seconds: u64,
}

pub struct ProfileCache {
    entries: RwLock<HashMap<String, ResolvedProfile>>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a username (case-insensitive). Entries at or past the TTL
    /// are reported as absent but left in place.
    pub fn get(&self, username: &str) -> Option<ResolvedProfile> {
        let key = username.to_lowercase();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let profile = entries.get(&key)?;

        if profile.age(Utc::now()) >= self.ttl {
            return None;
        }
        Some(profile.clone())
    }

    /// Store a profile, replacing whatever was there (fresh or stale).
    pub fn put(&self, username: &str, profile: ResolvedProfile) {
        let key = username.to_lowercase();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, profile);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored entry with its age in whole seconds.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let mut snapshot: Vec<CacheEntryStats> = entries
            .iter()
            .map(|(username, profile)| CacheEntryStats {
                username: username.clone(),
                player_id: profile.player_id.clone(),
                age_seconds: profile.age(now).as_secs(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.username.cmp(&b.username));

        CacheStats {
            size: entries.len(),
            entries: snapshot,
        }
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
