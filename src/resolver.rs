// Batch resolver: the public entry point of the lookup pipeline.
//
// Flow for a batch:
//   cache check per name -> dedupe misses -> chunk to the upstream limit ->
//   submit each chunk to the execution queue -> strategy chain ->
//   cache + result under every spelling the caller used.
//
// Nothing here returns an error to the caller. A failed chunk or lookup
// degrades to "unresolved" for the names involved and is counted in
// `ResolverStats` instead.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheStats, ProfileCache, ResolvedProfile, DEFAULT_CACHE_TTL};
use crate::config::Config;
use crate::fetch::{DirectStrategy, FetchStrategy, RenderStrategy, StrategyChain};
use crate::queue::{ExecutionQueue, DEFAULT_MAX_ACTIVE};
use crate::upstream::{BatchProfile, RequestBuilder, SingleProfile};

/// What callers get back for a resolved player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSkin {
    pub id: String,
    pub texture_url: String,
}

impl From<&ResolvedProfile> for PlayerSkin {
    fn from(profile: &ResolvedProfile) -> Self {
        Self {
            id: profile.player_id.clone(),
            texture_url: profile.texture_url.clone(),
        }
    }
}

/// Resolved players keyed by the name exactly as the caller supplied it.
/// Unresolved names are simply missing.
pub type LookupResult = HashMap<String, PlayerSkin>;

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub cache_ttl: Duration,
    /// Upstream calls allowed in flight at once
    pub max_pages: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            max_pages: DEFAULT_MAX_ACTIVE,
        }
    }
}

/// Failure and traffic counters since startup.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverStats {
    pub upstream_calls: u64,
    pub failed_chunks: u64,
    pub failed_lookups: u64,
    pub fallbacks: u64,
    pub active_tasks: usize,
    pub waiting_tasks: usize,
}

pub struct Resolver {
    cache: ProfileCache,
    requests: RequestBuilder,
    chain: Arc<StrategyChain>,
    queue: ExecutionQueue,
    render: Option<Arc<RenderStrategy>>,
    upstream_calls: AtomicU64,
    failed_chunks: AtomicU64,
    failed_lookups: AtomicU64,
}

impl Resolver {
    /// Assemble a resolver from explicit parts.
    pub fn new(settings: ResolverSettings, requests: RequestBuilder, chain: StrategyChain) -> Self {
        Self {
            cache: ProfileCache::new(settings.cache_ttl),
            requests,
            chain: Arc::new(chain),
            queue: ExecutionQueue::new(settings.max_pages),
            render: None,
            upstream_calls: AtomicU64::new(0),
            failed_chunks: AtomicU64::new(0),
            failed_lookups: AtomicU64::new(0),
        }
    }

    /// Keep a handle on the render strategy so `shutdown` can close the
    /// browser. The strategy must also be part of the chain.
    pub fn with_render(mut self, render: Arc<RenderStrategy>) -> Self {
        self.render = Some(render);
        self
    }

    /// Build the production pipeline: render strategy (when enabled and
    /// compiled in) followed by the direct strategy.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.require_credentials()?;

        let requests = RequestBuilder::new(&config.base_url, &config.project_key, &config.token)?
            .with_max_batch_size(config.batch_size);

        let render = render_strategy(config);
        let mut strategies: Vec<Arc<dyn FetchStrategy>> = Vec::new();
        if let Some(render) = &render {
            strategies.push(render.clone());
        }
        strategies.push(Arc::new(DirectStrategy::new(config.request_timeout)?));

        let chain = StrategyChain::new(strategies);
        info!(
            strategies = ?chain.strategy_names(),
            max_pages = config.max_pages,
            batch_size = config.batch_size,
            "Resolver configured"
        );

        let settings = ResolverSettings {
            cache_ttl: config.cache_ttl,
            max_pages: config.max_pages,
        };
        let resolver = Self::new(settings, requests, chain);
        Ok(match render {
            Some(render) => resolver.with_render(render),
            None => resolver,
        })
    }

    /// Resolve many names at once.
    ///
    /// Cached names cost nothing. The rest are de-duplicated
    /// case-insensitively, split into upstream-sized chunks and fetched
    /// concurrently (bounded by the execution queue). Every spelling the
    /// caller used gets the resolved value.
    pub async fn resolve_many<S: AsRef<str>>(&self, usernames: &[S]) -> LookupResult {
        let mut result = LookupResult::new();
        let mut misses: Vec<&str> = Vec::new();

        for name in usernames {
            let name = name.as_ref();
            if name.is_empty() {
                continue;
            }
            match self.cache.get(name) {
                Some(profile) => {
                    result.insert(name.to_string(), PlayerSkin::from(&profile));
                }
                None => misses.push(name),
            }
        }

        if misses.is_empty() {
            info!(count = result.len(), "All players served from cache");
            return result;
        }

        // lowercase key -> every spelling the caller used for it
        let mut spellings: HashMap<String, Vec<String>> = HashMap::new();
        let mut unique: Vec<String> = Vec::new();
        for name in misses {
            match spellings.entry(name.to_lowercase()) {
                Entry::Vacant(slot) => {
                    unique.push(name.to_string());
                    slot.insert(vec![name.to_string()]);
                }
                Entry::Occupied(mut slot) => {
                    if !slot.get().iter().any(|s| s == name) {
                        slot.get_mut().push(name.to_string());
                    }
                }
            }
        }

        let batch_size = self.requests.max_batch_size();
        info!(
            requested = usernames.len(),
            cached = result.len(),
            fetching = unique.len(),
            chunks = unique.len().div_ceil(batch_size),
            "Resolving players"
        );

        let mut pending = Vec::new();
        for chunk in unique.chunks(batch_size) {
            let request = match self.requests.batch(chunk) {
                Ok(request) => request,
                Err(e) => {
                    self.failed_chunks.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, names = chunk.len(), "Could not build batch request");
                    continue;
                }
            };
            self.upstream_calls.fetch_add(1, Ordering::Relaxed);
            let chain = Arc::clone(&self.chain);
            let task = self
                .queue
                .submit(async move { chain.execute(&request).await });
            pending.push((chunk.len(), task));
        }

        for (requested, task) in pending {
            let fetched = match task.join().await {
                Ok(fetched) => fetched,
                Err(e) => {
                    self.failed_chunks.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, names = requested, "Batch chunk failed, skipping");
                    continue;
                }
            };

            let mut loaded = 0usize;
            for profile in BatchProfile::list_from_value(fetched.data) {
                let Some((upstream_name, resolved)) = profile.into_resolved() else {
                    continue;
                };
                let key = upstream_name.to_lowercase();
                self.cache.put(&key, resolved.clone());

                if let Some(names) = spellings.get(&key) {
                    let skin = PlayerSkin::from(&resolved);
                    for name in names {
                        result.insert(name.clone(), skin.clone());
                    }
                    loaded += 1;
                }
            }

            info!(
                loaded,
                requested,
                strategy = fetched.strategy,
                "Batch chunk resolved"
            );
        }

        result
    }

    /// Resolve one name. Any failure, or a profile without an id or skin,
    /// yields `None`.
    pub async fn resolve_one(&self, username: &str) -> Option<ResolvedProfile> {
        if username.is_empty() {
            return None;
        }
        if let Some(profile) = self.cache.get(username) {
            return Some(profile);
        }

        let request = match self.requests.single(username) {
            Ok(request) => request,
            Err(e) => {
                self.failed_lookups.fetch_add(1, Ordering::Relaxed);
                warn!(username, error = %e, "Could not build profile request");
                return None;
            }
        };

        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        let chain = Arc::clone(&self.chain);
        let fetched = match self
            .queue
            .submit(async move { chain.execute(&request).await })
            .join()
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                self.failed_lookups.fetch_add(1, Ordering::Relaxed);
                warn!(username, error = %e, "Profile lookup failed");
                return None;
            }
        };

        match SingleProfile::from_value(fetched.data).and_then(SingleProfile::into_resolved) {
            Some(profile) => {
                self.cache.put(username, profile.clone());
                Some(profile)
            }
            None => {
                warn!(username, "No profile data for player");
                None
            }
        }
    }

    /// Player id only.
    pub async fn resolve_player_id(&self, username: &str) -> Option<String> {
        self.resolve_one(username).await.map(|p| p.player_id)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Profile cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            failed_chunks: self.failed_chunks.load(Ordering::Relaxed),
            failed_lookups: self.failed_lookups.load(Ordering::Relaxed),
            fallbacks: self.chain.fallbacks(),
            active_tasks: self.queue.active(),
            waiting_tasks: self.queue.waiting(),
        }
    }

    /// Close the browser, if one was started.
    pub async fn shutdown(&self) {
        if let Some(render) = &self.render {
            render.shutdown().await;
        }
    }
}

#[cfg(feature = "browser")]
fn render_strategy(config: &Config) -> Option<Arc<RenderStrategy>> {
    use crate::fetch::chromium::ChromiumBackend;

    if !config.browser_enabled {
        return None;
    }
    let backend = Arc::new(ChromiumBackend::new(
        config.chrome_executable.clone(),
        config.request_timeout,
    ));
    Some(Arc::new(RenderStrategy::new(backend, config.request_timeout)))
}

#[cfg(not(feature = "browser"))]
fn render_strategy(config: &Config) -> Option<Arc<RenderStrategy>> {
    if config.browser_enabled {
        info!("Built without the `browser` feature, using direct requests only");
    }
    None
}
