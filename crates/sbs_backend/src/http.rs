//! HTTP backend for Dgraph-style `/query` endpoints.

use crate::backend::{Backend, QueryOptions, ReadMode};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use sbs_core::{BackendError, QueryRequest, Variables};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Longest error body kept in a [`BackendError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    variables: &'a Variables,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow, default)]
    data: Option<&'a RawValue>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
}

/// Backend reached over HTTP.
///
/// Queries are posted to `{endpoint}/query` as JSON. The response's `data`
/// member is returned verbatim, without re-encoding.
pub struct DgraphHttpBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl DgraphHttpBackend {
    /// Create a backend for `endpoint`.
    ///
    /// An endpoint without a scheme is treated as `http://`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self::with_client(endpoint, client))
    }

    /// Create a backend sharing an existing client
    #[must_use]
    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint),
            client,
        }
    }

    fn query_url(&self, options: &QueryOptions) -> String {
        let mut url = format!(
            "{}/query?timeout={}s&ro=true",
            self.endpoint,
            options.timeout.as_secs().max(1)
        );
        if options.read_mode == ReadMode::BestEffort {
            url.push_str("&be=true");
        }
        url
    }
}

#[async_trait]
impl Backend for DgraphHttpBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query(
        &self,
        request: &QueryRequest,
        options: &QueryOptions,
    ) -> Result<String, BackendError> {
        let body = QueryBody {
            query: request.text(),
            variables: request.variables(),
        };
        tracing::trace!(endpoint = %self.endpoint, query = request.text(), "sending query");

        let response = self
            .client
            .post(self.query_url(options))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(options.timeout)
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        parse_envelope(&text)
    }
}

/// Pull the raw `data` member out of a response envelope
fn parse_envelope(text: &str) -> Result<String, BackendError> {
    let envelope: Envelope<'_> =
        serde_json::from_str(text).map_err(|e| BackendError::Decode(e.to_string()))?;

    if !envelope.errors.is_empty() {
        let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(BackendError::Query(messages.join("; ")));
    }

    envelope
        .data
        .map(|raw| raw.get().to_string())
        .ok_or_else(|| BackendError::Decode("response has no data member".to_string()))
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
