//! Reqwest-backed [`HttpClient`].

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpStreamResponse},
};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Desktop HTTP client.
///
/// Only the connect phase has a client-wide timeout: a full-track download
/// can legitimately run for minutes. Callers bound a request with
/// [`HttpRequest::timeout`] or by dropping the future.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("offline-player/", env!("CARGO_PKG_VERSION")))
            .build()
            .map(Self::with_client)
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn to_reqwest(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let builder = request
            .headers
            .into_iter()
            .fold(self.client.request(method, &request.url), |builder, (key, value)| {
                builder.header(key, value)
            });

        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn network_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Network("Request timed out".to_string())
    } else if e.is_connect() {
        BridgeError::Network(format!("Connection failed: {}", e))
    } else {
        BridgeError::Network(e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        let response = self.to_reqwest(request).send().await.map_err(network_error)?;

        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        debug!(
            status,
            content_length = response.content_length(),
            "HTTP response headers received"
        );

        let body = response.bytes_stream().map_err(network_error).boxed();

        Ok(HttpStreamResponse {
            status,
            headers,
            body,
        })
    }
}
