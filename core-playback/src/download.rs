//! # Streaming Downloader
//!
//! Fetches a complete remote payload chunk by chunk.
//!
//! The body is accumulated in memory and only handed back once the stream
//! ends cleanly. Any failure part way through (transport error, short body,
//! cancellation) discards everything received so far, so callers never see a
//! truncated payload.

use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::{Bytes, BytesMut};
use core_runtime::logging::redact_url;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{PlaybackError, Result};

/// Caller-supplied progress sink, invoked with a percentage in `[0, 100]`.
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Upper bound on the buffer reserved up front from an advertised size.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Reports non-decreasing percentages to an optional sink.
struct ProgressReporter<'a> {
    sink: Option<&'a ProgressSink>,
    total: Option<u64>,
    last: f64,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: Option<&'a ProgressSink>, total: Option<u64>) -> Self {
        Self {
            sink,
            total: total.filter(|t| *t > 0),
            last: 0.0,
        }
    }

    fn report(&mut self, received: u64) {
        let (Some(sink), Some(total)) = (self.sink, self.total) else {
            return;
        };
        let percent = (received as f64 * 100.0 / total as f64).min(100.0);
        if percent >= self.last {
            self.last = percent;
            sink(percent);
        }
    }

    fn finish(&mut self) {
        if let (Some(sink), Some(_)) = (self.sink, self.total) {
            if self.last < 100.0 {
                self.last = 100.0;
                sink(100.0);
            }
        }
    }
}

pub struct StreamingDownloader {
    http_client: Arc<dyn HttpClient>,
}

impl StreamingDownloader {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Download `url` in full.
    ///
    /// Progress is reported after each chunk when a total is known, taken
    /// from `content-length` or else from `expected_size`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::HttpStatus`] for a non-success response
    /// - [`PlaybackError::Network`] when the transport fails or the body is
    ///   shorter than its declared `content-length`
    /// - [`PlaybackError::Aborted`] when `cancel` fires
    #[instrument(skip(self, on_progress, cancel), fields(url = %redact_url(url)))]
    pub async fn download(
        &self,
        url: &str,
        expected_size: Option<u64>,
        on_progress: Option<&ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        if cancel.is_cancelled() {
            return Err(PlaybackError::Aborted);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlaybackError::Aborted),
            response = self.http_client.execute_stream(HttpRequest::get(url)) => response?,
        };

        if !response.is_success() {
            return Err(PlaybackError::HttpStatus(response.status));
        }

        let content_length = response.content_length();
        let total = content_length.or(expected_size);
        let mut progress = ProgressReporter::new(on_progress, total);
        let mut buffer =
            BytesMut::with_capacity(total.map_or(0, |t| t.min(MAX_PREALLOCATION)) as usize);
        let mut body = response.body;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(received = buffer.len(), "Download cancelled");
                    return Err(PlaybackError::Aborted);
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(&chunk);
                    progress.report(buffer.len() as u64);
                }
                Some(Err(e)) => {
                    debug!(received = buffer.len(), error = %e, "Download stream failed");
                    return Err(e.into());
                }
                None => break,
            }
        }

        if let Some(expected) = content_length {
            if (buffer.len() as u64) < expected {
                return Err(PlaybackError::Network(format!(
                    "Body ended after {} of {} bytes",
                    buffer.len(),
                    expected
                )));
            }
        }

        progress.finish();
        debug!(bytes = buffer.len(), "Download complete");
        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::mock::{FakeHttpClient, FakeResource};
    use parking_lot::Mutex;

    const URL: &str = "https://cdn.example.com/a.mp3?sig=secret";

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().push(p));
        (sink, seen)
    }

    fn downloader(resource: FakeResource) -> StreamingDownloader {
        StreamingDownloader::new(Arc::new(FakeHttpClient::new().with_resource(URL, resource)))
    }

    #[tokio::test]
    async fn test_downloads_full_body_with_monotonic_progress() {
        let body: Vec<u8> = (0..1_000u32).map(|i| i as u8).collect();
        let downloader = downloader(FakeResource::new(body.clone()).with_chunk_size(300));
        let (sink, seen) = recording_sink();

        let payload = downloader
            .download(URL, None, Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(payload.as_ref(), body.as_slice());
        let seen = seen.lock().clone();
        assert_eq!(seen, vec![30.0, 60.0, 90.0, 100.0]);
    }

    #[tokio::test]
    async fn test_expected_size_used_without_content_length() {
        let downloader = downloader(
            FakeResource::new(vec![0u8; 100])
                .with_chunk_size(50)
                .without_content_length(),
        );
        let (sink, seen) = recording_sink();

        downloader
            .download(URL, Some(200), Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        // Stale expected size: progress still ends at 100.
        assert_eq!(seen.lock().clone(), vec![25.0, 50.0, 100.0]);
    }

    #[tokio::test]
    async fn test_no_progress_without_any_total() {
        let downloader = downloader(FakeResource::new(vec![0u8; 10]).without_content_length());
        let (sink, seen) = recording_sink();

        let payload = downloader
            .download(URL, None, Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(payload.len(), 10);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_returns_no_payload() {
        let downloader = downloader(
            FakeResource::new(vec![1u8; 100])
                .with_chunk_size(10)
                .failing_after(40),
        );

        let result = downloader
            .download(URL, None, None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PlaybackError::Network(_))));
    }

    #[tokio::test]
    async fn test_error_status() {
        let downloader = downloader(FakeResource::new(vec![1u8; 10]).with_status(404));

        let result = downloader
            .download(URL, None, None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PlaybackError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let downloader = downloader(FakeResource::new(vec![1u8; 10]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = downloader.download(URL, None, None, &cancel).await;
        assert!(matches!(result, Err(PlaybackError::Aborted)));
    }

    #[test]
    fn test_progress_reporter_clamps() {
        let (sink, seen) = recording_sink();
        let mut reporter = ProgressReporter::new(Some(&sink), Some(10));

        reporter.report(5);
        reporter.report(20);
        reporter.finish();

        assert_eq!(seen.lock().clone(), vec![50.0, 100.0]);
    }
}
