//! HTTP Client Abstraction
//!
//! Track payloads are large, so the one required operation is
//! [`HttpClient::execute_stream`]: the body arrives as a stream of chunks the
//! caller consumes (and may abandon) incrementally. Small responses can be
//! collected with [`HttpClient::execute`].
//!
//! Non-2xx statuses are not errors at this layer; callers inspect `status`.
//! Retrying is the caller's policy.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    /// Headers only; no body chunks are produced
    Head,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Bound on the whole exchange, body included
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Request the inclusive byte range `start..=end`.
    pub fn range(self, start: u64, end: u64) -> Self {
        self.header("Range", format!("bytes={}-{}", start, end))
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response with the body fully buffered.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Boxed stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response whose body is consumed incrementally.
///
/// Dropping the value drops the body stream, which releases the underlying
/// connection without reading the remainder.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Value of the `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    /// Drain the body into memory.
    pub async fn into_buffered(self) -> Result<HttpResponse> {
        let capacity = self.content_length().unwrap_or(0).min(16 * 1024 * 1024) as usize;
        let body = self
            .body
            .try_fold(BytesMut::with_capacity(capacity), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;

        Ok(HttpResponse {
            status: self.status,
            headers: self.headers,
            body: body.freeze(),
        })
    }
}

impl fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Platform HTTP stack.
///
/// Transport failures (connect, TLS, timeout, a body that breaks off) are
/// [`BridgeError::Network`](crate::error::BridgeError::Network), whether they
/// surface from the call itself or while the body stream is consumed.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse>;

    /// Execute `request` and buffer the whole body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_stream(request).await?.into_buffered().await
    }
}
