//! The Redfish HTTP client boundary. The concrete transport is explicitly
//! out of scope; this module defines only the trait the topology crawler
//! and property refresher consume, plus one concrete implementation over
//! `reqwest` so the rest of the stack has something real to run against.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// A fetched Redfish resource, already decoded from JSON. `uri` is `None`
/// only for synthetic objects (e.g. in tests) that were never actually
/// fetched from a URI.
#[derive(Debug, Clone)]
pub struct RedfishObject {
    pub uri: Option<String>,
    pub body: serde_json::Value,
}

impl RedfishObject {
    pub fn new(uri: impl Into<String>, body: serde_json::Value) -> Self {
        RedfishObject {
            uri: Some(uri.into()),
            body,
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.body.get(field)
    }
}

/// Fetches a Redfish resource by URI. Implementations own connection
/// pooling, auth, and retries; the core only needs `get`.
#[async_trait]
pub trait RedfishClient: Send + Sync {
    async fn get(&self, uri: &str) -> Result<RedfishObject, TransportError>;
}

/// A `RedfishClient` backed by a real HTTP server, using `reqwest`'s
/// rustls-backed client.
pub struct HttpRedfishClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRedfishClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        HttpRedfishClient {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client configuration is static and valid"),
        }
    }
}

#[async_trait]
impl RedfishClient for HttpRedfishClient {
    async fn get(&self, uri: &str) -> Result<RedfishObject, TransportError> {
        let url = format!("{}{}", self.base_url, uri);
        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::DeadlineExceeded { uri: uri.to_string() }
            } else {
                TransportError::FetchFailed {
                    uri: uri.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        let body = response.json::<serde_json::Value>().await.map_err(|e| TransportError::FetchFailed {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;
        Ok(RedfishObject::new(uri, body))
    }
}

/// A `RedfishClient` serving canned responses, for tests and the mock
/// service's fixture-backed topology.
#[derive(Default)]
pub struct FixtureRedfishClient {
    pub fixtures: std::collections::HashMap<String, serde_json::Value>,
}

impl FixtureRedfishClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uri: impl Into<String>, body: serde_json::Value) -> Self {
        self.fixtures.insert(uri.into(), body);
        self
    }
}

#[async_trait]
impl RedfishClient for FixtureRedfishClient {
    async fn get(&self, uri: &str) -> Result<RedfishObject, TransportError> {
        self.fixtures
            .get(uri)
            .cloned()
            .map(|body| RedfishObject::new(uri, body))
            .ok_or_else(|| TransportError::FetchFailed {
                uri: uri.to_string(),
                message: "no fixture registered".to_string(),
            })
    }
}
