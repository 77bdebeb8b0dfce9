//! Bounded fetch of the leading bytes of a remote resource.
//!
//! Tag headers of the supported containers sit at the start of the stream,
//! so metadata for a track that is not cached only needs a prefix. Servers
//! that ignore the `Range` header still never cost more than the cap: the
//! body is read incrementally and the stream is dropped once the cap is hit.

use bridge_traits::http::{HttpClient, HttpRequest, HttpStreamResponse};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// Default number of leading bytes requested (256 KiB).
pub const DEFAULT_RANGE_BYTES: usize = 262_144;

/// Leading bytes of a resource plus whatever is known about its full size.
#[derive(Debug, Clone)]
pub struct RangeFetch {
    /// At most `max_bytes` bytes from offset 0.
    pub data: Bytes,
    /// Size of the whole resource, when the response or caller revealed it.
    pub total_size: Option<u64>,
    /// MIME type reported by the server.
    pub content_type: Option<String>,
}

pub struct RangeFetcher {
    http_client: Arc<dyn HttpClient>,
    max_bytes: usize,
}

impl RangeFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_max_bytes(http_client, DEFAULT_RANGE_BYTES)
    }

    pub fn with_max_bytes(http_client: Arc<dyn HttpClient>, max_bytes: usize) -> Self {
        Self {
            http_client,
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Fetch up to `max_bytes` leading bytes of `url`.
    ///
    /// Sends `Range: bytes=0-(max-1)` first. A non-success answer is retried
    /// as a plain GET; the body is truncated client-side either way.
    ///
    /// Total size precedence: `content-range` total, then `known_total_size`.
    /// Otherwise it is left unknown.
    pub async fn fetch(&self, url: &str, known_total_size: Option<u64>) -> Result<RangeFetch> {
        let ranged = HttpRequest::get(url).range(0, self.max_bytes as u64 - 1);
        let mut response = self.http_client.execute_stream(ranged).await?;

        if !response.is_success() {
            warn!(
                status = response.status,
                "Range request rejected, falling back to plain GET"
            );
            response = self.http_client.execute_stream(HttpRequest::get(url)).await?;
            if !response.is_success() {
                return Err(MetadataError::HttpStatus(response.status));
            }
        }

        let total_size = response
            .header("content-range")
            .and_then(parse_content_range_total)
            .or(known_total_size);
        let content_type = response.header("content-type").map(str::to_string);
        let status = response.status;

        let data = self.read_capped(response).await?;
        debug!(
            status,
            bytes = data.len(),
            total_size = ?total_size,
            "Fetched leading bytes"
        );

        Ok(RangeFetch {
            data,
            total_size,
            content_type,
        })
    }

    /// Accumulate body chunks until the cap, discarding the excess of the
    /// chunk that crosses it and abandoning the rest of the stream.
    async fn read_capped(&self, response: HttpStreamResponse) -> Result<Bytes> {
        let mut body = response.body;
        let mut buffer = BytesMut::with_capacity(self.max_bytes.min(64 * 1024));

        while buffer.len() < self.max_bytes {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = chunk?;
            let room = self.max_bytes - buffer.len();
            buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }

        Ok(buffer.freeze())
    }
}

/// Total length from a `Content-Range` value such as `bytes 0-99/1234`.
///
/// Returns `None` for an unknown total (`*`) or a malformed header.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::mock::{FakeHttpClient, FakeResource};

    const URL: &str = "https://cdn.example.com/track.mp3";

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-262143/10485760"), Some(10_485_760));
        assert_eq!(parse_content_range_total("bytes 0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_honored_range_uses_content_range_total() {
        let client = Arc::new(FakeHttpClient::new().with_resource(URL, FakeResource::new(body(1_000))));
        let fetcher = RangeFetcher::with_max_bytes(client.clone(), 100);

        let fetched = fetcher.fetch(URL, Some(5)).await.unwrap();

        assert_eq!(fetched.data.len(), 100);
        assert_eq!(fetched.data.as_ref(), &body(1_000)[..100]);
        assert_eq!(fetched.total_size, Some(1_000));
        assert_eq!(
            client.requests()[0].header_value("range"),
            Some("bytes=0-99")
        );
    }

    #[tokio::test]
    async fn test_ignored_range_is_truncated_client_side() {
        let client = Arc::new(FakeHttpClient::new().with_resource(
            URL,
            FakeResource::new(body(10 * 1024 * 1024))
                .without_range_support()
                .with_chunk_size(10_000),
        ));
        let fetcher = RangeFetcher::new(client.clone());

        let fetched = fetcher.fetch(URL, None).await.unwrap();

        assert_eq!(fetched.data.len(), DEFAULT_RANGE_BYTES);
        assert_eq!(fetched.data.as_ref(), &body(DEFAULT_RANGE_BYTES)[..]);
        // Only the chunk crossing the cap is pulled past it.
        assert!(client.bytes_served() < DEFAULT_RANGE_BYTES + 10_000);
        // A full response's content-length is not taken as the total.
        assert_eq!(fetched.total_size, None);
    }

    #[tokio::test]
    async fn test_known_size_used_without_content_range() {
        let client = Arc::new(FakeHttpClient::new().with_resource(
            URL,
            FakeResource::new(body(50)).without_range_support(),
        ));
        let fetcher = RangeFetcher::with_max_bytes(client, 100);

        let fetched = fetcher.fetch(URL, Some(4_096)).await.unwrap();

        assert_eq!(fetched.data.len(), 50);
        assert_eq!(fetched.total_size, Some(4_096));
    }

    #[tokio::test]
    async fn test_error_status_falls_back_then_fails() {
        let client = Arc::new(
            FakeHttpClient::new().with_resource(URL, FakeResource::new(body(10)).with_status(403)),
        );
        let fetcher = RangeFetcher::new(client.clone());

        let result = fetcher.fetch(URL, None).await;

        assert!(matches!(result, Err(MetadataError::HttpStatus(403))));
        assert_eq!(client.request_count(URL), 2);
        assert!(client.requests()[1].header_value("range").is_none());
    }

    #[tokio::test]
    async fn test_network_failure_surfaces() {
        let client = Arc::new(FakeHttpClient::new().with_resource(
            URL,
            FakeResource::new(body(1_000))
                .with_chunk_size(10)
                .failing_after(20),
        ));
        let fetcher = RangeFetcher::with_max_bytes(client, 500);

        let result = fetcher.fetch(URL, None).await;
        assert!(matches!(result, Err(MetadataError::Network(_))));
    }
}
