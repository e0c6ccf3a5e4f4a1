// cristalix-skins: cached, batched player skin resolution for the Cristalix API.
//
// This is the library root. Each module corresponds to one stage of the
// lookup pipeline; `resolver` ties them together.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod queue;
pub mod resolver;
pub mod roster;
pub mod upstream;

#[cfg(feature = "web")]
pub mod web;

pub use cache::{CacheStats, ProfileCache, ResolvedProfile};
pub use resolver::{LookupResult, PlayerSkin, Resolver, ResolverSettings, ResolverStats};
