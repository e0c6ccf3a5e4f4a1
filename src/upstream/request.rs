// Request builder for the Cristalix players API.
//
// Two endpoints are used:
//   GET  /players/v1/getProfileByName?playerName=..&project_key=..
//   POST /players/v1/getProfilesByNames?project_key=..   body {"array": [...]}
// Both carry a bearer token. The batch endpoint accepts at most 50 names.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

/// Default public endpoint of the Cristalix open API.
pub const DEFAULT_BASE_URL: &str = "https://api.cristalix.gg";

/// Upstream limit on names per batch request.
pub const MAX_BATCH_SIZE: usize = 50;

/// Browser-like user agent; the API's protection layer rejects obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const BEARER_PREFIX: &str = "Bearer ";

/// Characters left as-is in query values, matching what browsers'
/// `encodeURIComponent` leaves alone. Space becomes `%20`, never `+`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully-built upstream call. Strategies receive this verbatim, so two
/// strategies given the same request hit the same URL with the same headers.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    /// The request body as a JSON string, if there is one.
    pub fn body_text(&self) -> Option<String> {
        self.body.as_ref().map(Value::to_string)
    }
}

#[derive(Serialize)]
struct BatchBody<'a> {
    array: &'a [String],
}

/// Add the `Bearer ` scheme unless the token already carries it.
///
/// Idempotent: normalizing an already-normalized token returns it unchanged.
pub fn normalize_token(token: &str) -> String {
    if token.starts_with(BEARER_PREFIX) {
        token.to_string()
    } else {
        format!("{BEARER_PREFIX}{token}")
    }
}

/// Builds authenticated requests. Holds only immutable configuration.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    project_key: String,
    authorization: String,
    max_batch_size: usize,
}

impl RequestBuilder {
    /// Create a builder for the given API base URL and credentials.
    ///
    /// Fails if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, project_key: &str, token: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;

        Ok(Self {
            base_url,
            project_key: project_key.to_string(),
            authorization: normalize_token(token),
            max_batch_size: MAX_BATCH_SIZE,
        })
    }

    /// Override the batch size limit (clamped to 1..=50).
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET request for a single profile by display name.
    pub fn single(&self, username: &str) -> Result<UpstreamRequest> {
        let url = format!(
            "{}/players/v1/getProfileByName?playerName={}&project_key={}",
            self.base_url,
            encode_value(username),
            encode_value(&self.project_key),
        );
        // Validate only; re-serializing through Url would re-escape `'`
        Url::parse(&url).context("Failed to build profile URL")?;

        Ok(UpstreamRequest {
            method: HttpMethod::Get,
            url,
            headers: self.headers(false),
            body: None,
        })
    }

    /// POST request for up to `max_batch_size` profiles.
    ///
    /// Larger lists must be split by the caller; passing one is an error.
    pub fn batch(&self, usernames: &[String]) -> Result<UpstreamRequest> {
        if usernames.len() > self.max_batch_size {
            anyhow::bail!(
                "Batch of {} names exceeds the limit of {}",
                usernames.len(),
                self.max_batch_size
            );
        }

        let url = format!(
            "{}/players/v1/getProfilesByNames?project_key={}",
            self.base_url,
            encode_value(&self.project_key),
        );
        Url::parse(&url).context("Failed to build batch URL")?;

        let body = serde_json::to_value(BatchBody { array: usernames })
            .context("Failed to encode batch body")?;

        Ok(UpstreamRequest {
            method: HttpMethod::Post,
            url,
            headers: self.headers(true),
            body: Some(body),
        })
    }

    fn headers(&self, json_body: bool) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), self.authorization.clone());
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        if json_body {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        headers
    }
}
