use std::time::Duration;

use async_trait::async_trait;
use mims_core::NamespaceId;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::settings::{DgraphSettings, Endpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Raw schema text, sent as `application/graphql`.
    GraphQlSchema(String),
}

/// One HTTP exchange with Dgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct DgraphRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub namespace: Option<NamespaceId>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl DgraphRequest {
    pub fn get(endpoint: Endpoint, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            endpoint,
            namespace: None,
            body: RequestBody::Empty,
            timeout,
        }
    }

    pub fn post_json(endpoint: Endpoint, body: Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            endpoint,
            namespace: None,
            body: RequestBody::Json(body),
            timeout,
        }
    }

    pub fn graphql(query: &str, variables: Value, timeout: Duration) -> Self {
        Self::post_json(
            Endpoint::GraphQl,
            json!({ "query": query, "variables": variables }),
            timeout,
        )
    }

    pub fn post_schema(schema: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            endpoint: Endpoint::AdminSchema,
            namespace: None,
            body: RequestBody::GraphQlSchema(schema.into()),
            timeout,
        }
    }

    /// Bind the request to `namespace`. The default namespace is stored as `None`.
    ///
    /// Callers that name a namespace on behalf of a user go through
    /// [`Validation::scope`](crate::guard::Validation::scope) instead.
    pub fn bound_to(mut self, namespace: Option<NamespaceId>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_default());
        self
    }

    /// The GraphQL document carried by a JSON body, if any.
    pub fn query_text(&self) -> Option<&str> {
        match &self.body {
            RequestBody::Json(v) => v.get("query").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Status and decoded body. Bodies that are not JSON are kept as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// The seam between the capability layer and the network.
#[async_trait]
pub trait DgraphTransport: Send + Sync {
    async fn send(&self, request: DgraphRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    settings: DgraphSettings,
}

impl HttpTransport {
    pub fn new(settings: DgraphSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.probe_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &DgraphSettings {
        &self.settings
    }
}

#[async_trait]
impl DgraphTransport for HttpTransport {
    async fn send(&self, request: DgraphRequest) -> Result<HttpResponse, TransportError> {
        let url = self.settings.url_for(request.endpoint, request.namespace.as_ref());
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(request.timeout);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::GraphQlSchema(schema) => {
                builder.header(CONTENT_TYPE, "application/graphql").body(schema)
            }
        };

        debug!(%url, method = ?request.method, "sending Dgraph request");

        let response = builder
            .send()
            .await
            .map_err(|err| classify(err, &url, request.timeout))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| classify(err, &url, request.timeout))?;

        Ok(HttpResponse::new(status, decode_body(text)))
    }
}

fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn classify(err: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    let url = url.to_string();
    if err.is_timeout() {
        TransportError::Timeout { url, timeout }
    } else if err.is_connect() {
        TransportError::Connect {
            url,
            message: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        TransportError::Decode {
            url,
            message: err.to_string(),
        }
    } else {
        TransportError::Request {
            url,
            message: err.to_string(),
        }
    }
}
