// Shared test fixtures: an in-memory stand-in for the Cristalix API.
//
// StubUpstream implements FetchStrategy directly, so resolver tests run the
// real queue, chain and cache without any network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};

use cristalix_skins::fetch::{FetchStrategy, StrategyChain};
use cristalix_skins::upstream::{HttpMethod, RequestBuilder, UpstreamRequest};
use cristalix_skins::{Resolver, ResolverSettings};

pub struct StubUpstream {
    /// lowercase name -> (canonical spelling, id, skin url)
    players: HashMap<String, (String, String, Option<String>)>,
    /// Batch requests containing this (lowercase) name fail
    fail_on: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<UpstreamRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubUpstream {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            fail_on: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Register a player with a complete profile.
    pub fn player(mut self, name: &str) -> Self {
        self.players.insert(
            name.to_lowercase(),
            (
                name.to_string(),
                format!("id-{}", name.to_lowercase()),
                Some(skin_url(name)),
            ),
        );
        self
    }

    /// Register a player whose profile has no skin.
    pub fn player_without_skin(mut self, name: &str) -> Self {
        self.players.insert(
            name.to_lowercase(),
            (name.to_string(), format!("id-{}", name.to_lowercase()), None),
        );
        self
    }

    pub fn fail_on(mut self, name: &str) -> Self {
        self.fail_on = Some(name.to_lowercase());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Names sent in each batch call, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == HttpMethod::Post)
            .map(|c| batch_names(&c))
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn profile_json(&self, name: &str) -> Option<Value> {
        let (canonical, id, skin) = self.players.get(&name.to_lowercase())?;
        let textures = match skin {
            Some(url) => json!({ "skin": url }),
            None => json!({}),
        };
        Some(json!({ "id": id, "username": canonical, "textures": textures }))
    }

    fn respond(&self, request: &UpstreamRequest) -> Result<Value> {
        match request.method {
            HttpMethod::Get => {
                let url = Url::parse(&request.url)?;
                let name = url
                    .query_pairs()
                    .find(|(k, _)| k == "playerName")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                Ok(self
                    .profile_json(&name)
                    .unwrap_or_else(|| json!({ "error": "PLAYER_NOT_FOUND" })))
            }
            HttpMethod::Post => {
                let names = batch_names(request);
                if let Some(bad) = &self.fail_on {
                    if names.iter().any(|n| &n.to_lowercase() == bad) {
                        anyhow::bail!("HTTP 503 Service Unavailable");
                    }
                }
                let found: Vec<Value> = names.iter().filter_map(|n| self.profile_json(n)).collect();
                Ok(Value::Array(found))
            }
        }
    }
}

#[async_trait]
impl FetchStrategy for StubUpstream {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.respond(request)
    }
}

/// A strategy that always fails, standing in for an unavailable browser.
pub struct BrokenStrategy {
    pub calls: Mutex<Vec<UpstreamRequest>>,
}

impl BrokenStrategy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl FetchStrategy for BrokenStrategy {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(request.clone());
        anyhow::bail!("Rendering engine unavailable")
    }
}

pub fn skin_url(name: &str) -> String {
    format!("https://textures.test/skins/{}.png", name.to_lowercase())
}

pub fn batch_names(request: &UpstreamRequest) -> Vec<String> {
    request
        .body
        .as_ref()
        .and_then(|b| b.get("array"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn request_builder(batch_size: usize) -> RequestBuilder {
    RequestBuilder::new("https://api.test", "project", "token")
        .unwrap()
        .with_max_batch_size(batch_size)
}

pub fn resolver_with(strategies: Vec<Arc<dyn FetchStrategy>>, batch_size: usize) -> Resolver {
    Resolver::new(
        ResolverSettings::default(),
        request_builder(batch_size),
        StrategyChain::new(strategies),
    )
}

pub fn resolver_for(stub: &Arc<StubUpstream>) -> Resolver {
    resolver_with(vec![stub.clone()], 50)
}
