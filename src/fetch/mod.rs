// Fetch strategies: how a built request actually reaches the network.
//
// The chain holds an ordered list of strategies: the render strategy (a
// headless browser that gets past the API's bot protection) followed by the
// direct strategy (plain reqwest). Each step yields a tagged outcome and the
// chain stops at the first success.

pub mod chain;
#[cfg(feature = "browser")]
pub mod chromium;
pub mod direct;
pub mod render;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::upstream::UpstreamRequest;

pub use chain::{Fetched, StepOutcome, StrategyChain};
pub use direct::DirectStrategy;
pub use render::{RenderBackend, RenderEngine, RenderPage, RenderStrategy};

/// A strategy could not run because the resource behind it is not up.
///
/// The resource logs its own start-up failure once; the chain only notes
/// the skip at `debug` when it sees this error.
#[derive(Debug)]
pub struct ResourceUnavailable(pub String);

impl fmt::Display for ResourceUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ResourceUnavailable {}

/// One way of executing an upstream request and returning its JSON body.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Execute the request. Any error makes the chain move on to the next
    /// strategy.
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value>;
}
