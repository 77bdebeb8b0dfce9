//! In-memory bridge implementations for tests.
//!
//! Enabled with the `mock` feature. [`FakeHttpClient`] serves canned bodies
//! per URL with configurable chunking, range support and mid-stream failure,
//! and records every request it sees. [`ManualClock`] is a settable [`Clock`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;

use crate::error::{BridgeError, Result};
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpStreamResponse};
use crate::time::Clock;

/// A canned resource served by [`FakeHttpClient`].
#[derive(Debug, Clone)]
pub struct FakeResource {
    pub body: Bytes,
    pub status: u16,
    pub chunk_size: usize,
    pub honor_range: bool,
    /// Emit a network error once this many body bytes have been streamed.
    pub fail_after: Option<usize>,
    pub send_content_length: bool,
}

impl FakeResource {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            status: 200,
            chunk_size: 16 * 1024,
            honor_range: true,
            fail_after: None,
            send_content_length: true,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn without_range_support(mut self) -> Self {
        self.honor_range = false;
        self
    }

    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn without_content_length(mut self) -> Self {
        self.send_content_length = false;
        self
    }
}

struct PreparedResponse {
    status: u16,
    headers: HashMap<String, String>,
    chunks: Vec<Result<Bytes>>,
}

/// Scriptable [`HttpClient`] backed by an in-memory URL table.
#[derive(Default)]
pub struct FakeHttpClient {
    resources: Mutex<HashMap<String, FakeResource>>,
    requests: Mutex<Vec<HttpRequest>>,
    bytes_served: Arc<AtomicUsize>,
}

impl FakeHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, url: impl Into<String>, resource: FakeResource) -> Self {
        self.insert(url, resource);
        self
    }

    pub fn insert(&self, url: impl Into<String>, resource: FakeResource) {
        self.resources.lock().insert(url.into(), resource);
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    /// Body bytes actually pulled from response streams by consumers.
    pub fn bytes_served(&self) -> usize {
        self.bytes_served.load(Ordering::SeqCst)
    }

    fn prepare(&self, request: &HttpRequest) -> PreparedResponse {
        self.requests.lock().push(request.clone());

        let Some(resource) = self.resources.lock().get(&request.url).cloned() else {
            return PreparedResponse {
                status: 404,
                headers: HashMap::new(),
                chunks: Vec::new(),
            };
        };

        if !(200..300).contains(&resource.status) {
            return PreparedResponse {
                status: resource.status,
                headers: HashMap::new(),
                chunks: Vec::new(),
            };
        }

        let total = resource.body.len();
        let mut headers = HashMap::new();
        let requested = request.header_value("range").and_then(parse_range);

        let (status, body) = match requested {
            Some((start, end)) if resource.honor_range && start < total => {
                let end = end.map_or(total - 1, |e| e.min(total - 1));
                headers.insert(
                    "content-range".to_string(),
                    format!("bytes {}-{}/{}", start, end, total),
                );
                (206, resource.body.slice(start..=end))
            }
            _ => (resource.status, resource.body.clone()),
        };

        if resource.send_content_length {
            headers.insert("content-length".to_string(), body.len().to_string());
        }

        let mut chunks = Vec::new();
        if request.method == HttpMethod::Get {
            let mut offset = 0;
            while offset < body.len() {
                if resource.fail_after.is_some_and(|limit| offset >= limit) {
                    chunks.push(Err(BridgeError::Network("connection reset".to_string())));
                    break;
                }
                let end = (offset + resource.chunk_size).min(body.len());
                chunks.push(Ok(body.slice(offset..end)));
                offset = end;
            }
        }

        PreparedResponse {
            status,
            headers,
            chunks,
        }
    }
}

/// Parses `bytes=start-[end]`.
fn parse_range(value: &str) -> Option<(usize, Option<usize>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn execute_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        let prepared = self.prepare(&request);
        let counter = Arc::clone(&self.bytes_served);
        let body = futures::stream::iter(prepared.chunks)
            .inspect(move |item| {
                if let Ok(chunk) = item {
                    counter.fetch_add(chunk.len(), Ordering::SeqCst);
                }
            })
            .boxed();

        Ok(HttpStreamResponse {
            status: prepared.status,
            headers: prepared.headers,
            body,
        })
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_millis: AtomicI64,
}

impl ManualClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(millis),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.now_millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.now_millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
