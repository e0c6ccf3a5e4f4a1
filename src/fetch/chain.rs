// Ordered strategy chain with transparent fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchStrategy, ResourceUnavailable};
use crate::upstream::UpstreamRequest;

/// Successful chain execution: the payload and which strategy produced it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub strategy: &'static str,
    pub data: Value,
}

/// Result of running one strategy.
#[derive(Debug)]
pub enum StepOutcome {
    Success(Value),
    Failure { strategy: &'static str, reason: String },
    /// The strategy's resource was not running; already logged at its source.
    Unavailable { strategy: &'static str, reason: String },
}

pub struct StrategyChain {
    strategies: Vec<Arc<dyn FetchStrategy>>,
    fallbacks: AtomicU64,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>) -> Self {
        Self {
            strategies,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Names of the configured strategies, in evaluation order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// How many times a strategy failed and the next one was tried.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    async fn run_step(strategy: &dyn FetchStrategy, request: &UpstreamRequest) -> StepOutcome {
        match strategy.fetch(request).await {
            Ok(data) => StepOutcome::Success(data),
            Err(e) if e.downcast_ref::<ResourceUnavailable>().is_some() => {
                StepOutcome::Unavailable {
                    strategy: strategy.name(),
                    reason: format!("{e:#}"),
                }
            }
            Err(e) => StepOutcome::Failure {
                strategy: strategy.name(),
                reason: format!("{e:#}"),
            },
        }
    }

    /// Run the request through each strategy in order until one succeeds.
    ///
    /// Every strategy receives the identical request. The error, if all of
    /// them fail, lists each strategy's reason.
    pub async fn execute(&self, request: &UpstreamRequest) -> Result<Fetched> {
        let mut failures: Vec<String> = Vec::new();

        for (index, strategy) in self.strategies.iter().enumerate() {
            let is_last = index + 1 == self.strategies.len();
            match Self::run_step(strategy.as_ref(), request).await {
                StepOutcome::Success(data) => {
                    debug!(
                        strategy = strategy.name(),
                        method = request.method.as_str(),
                        "Upstream request succeeded"
                    );
                    return Ok(Fetched {
                        strategy: strategy.name(),
                        data,
                    });
                }
                StepOutcome::Unavailable { strategy, reason } => {
                    if !is_last {
                        self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(strategy, error = %reason, "Fetch strategy unavailable, skipping");
                    failures.push(format!("{strategy}: {reason}"));
                }
                StepOutcome::Failure { strategy, reason } => {
                    if is_last {
                        warn!(strategy, error = %reason, "Last fetch strategy failed");
                    } else {
                        self.fallbacks.fetch_add(1, Ordering::Relaxed);
                        warn!(strategy, error = %reason, "Fetch strategy failed, falling back");
                    }
                    failures.push(format!("{strategy}: {reason}"));
                }
            }
        }

        if failures.is_empty() {
            anyhow::bail!("No fetch strategies configured");
        }
        anyhow::bail!("All fetch strategies failed ({})", failures.join("; "))
    }
}
