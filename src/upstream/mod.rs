// Cristalix open API: request construction and payload shapes.
//
// Nothing in here performs I/O. Requests are plain data handed to the
// fetch strategy chain, which decides how they reach the network.

pub mod models;
pub mod request;

pub use models::{BatchProfile, SingleProfile};
pub use request::{normalize_token, HttpMethod, RequestBuilder, UpstreamRequest};
