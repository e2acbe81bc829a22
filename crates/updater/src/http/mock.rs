//! Scripted HTTP server for tests.

use super::{HttpClient, HttpResponse, Request};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// What a [`MockHttp`] serves for one URL.
#[derive(Debug, Clone)]
pub struct MockRoute {
    status: u16,
    body: Vec<u8>,
    content_length: Option<u64>,
    chunk_size: usize,
    delay: Duration,
    stall_after: Option<usize>,
    refused: bool,
}

impl MockRoute {
    /// `200 OK` with `body` and a matching `Content-Length`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
            chunk_size: 1024,
            delay: Duration::ZERO,
            stall_after: None,
            refused: false,
        }
    }

    /// Given status with an empty body.
    pub fn status(status: u16) -> Self {
        Self { status, ..Self::ok(Vec::new()) }
    }

    /// The connection can't be established at all.
    pub fn refused() -> Self {
        Self { refused: true, ..Self::ok(Vec::new()) }
    }

    /// Override the advertised `Content-Length` (`None` omits it).
    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    /// Largest chunk a single `read()` returns.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Wait this long before every `read()`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Stop sending (without closing) once `bytes` have been read.
    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.stall_after = Some(bytes);
        self
    }
}

/// In-memory [`HttpClient`] serving [`MockRoute`]s by exact URL.
///
/// Unknown URLs are refused. Every request is recorded.
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, MockRoute>>,
    requests: Mutex<Vec<Request>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `route` for `url`, replacing any previous route.
    pub fn route(&self, url: impl Into<String>, route: MockRoute) {
        lock(&self.routes).insert(url.into(), route);
    }

    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn open(&self, request: Request) -> Result<Box<dyn HttpResponse>> {
        let route = lock(&self.routes).get(&request.url).cloned();
        lock(&self.requests).push(request.clone());
        let Some(route) = route.filter(|r| !r.refused) else {
            exn::bail!(ErrorKind::Transport(format!("connection refused: {}", request.url)));
        };
        Ok(Box::new(MockResponse { route, offset: 0 }))
    }
}

struct MockResponse {
    route: MockRoute,
    offset: usize,
}

#[async_trait]
impl HttpResponse for MockResponse {
    fn status(&self) -> u16 {
        self.route.status
    }

    fn content_length(&self) -> Option<u64> {
        self.route.content_length
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.route.delay.is_zero() {
            tokio::time::sleep(self.route.delay).await;
        }
        let end = self.route.stall_after.unwrap_or(usize::MAX).min(self.route.body.len());
        if self.offset >= end && self.route.stall_after.is_some_and(|stall| stall < self.route.body.len()) {
            std::future::pending::<()>().await;
        }
        let n = buf.len().min(self.route.chunk_size).min(end - self.offset);
        buf[..n].copy_from_slice(&self.route.body[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(response: &mut dyn HttpResponse) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = response.read(&mut buf).await.unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_serves_body_in_chunks() {
        let http = MockHttp::new();
        http.route("http://x/a", MockRoute::ok(b"0123456789".to_vec()).with_chunk_size(3));
        let mut response = http.open(Request::get("http://x/a")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.content_length(), Some(10));
        let mut buf = [0u8; 16];
        assert_eq!(response.read(&mut buf).await.unwrap(), 3);
        assert_eq!(read_all(response.as_mut()).await, b"3456789");
    }

    #[tokio::test]
    async fn test_unknown_url_is_refused() {
        let http = MockHttp::new();
        let err = http.open(Request::get("http://x/missing")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Transport(_)));
        assert_eq!(http.request_count("http://x/missing"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_never_completes() {
        let http = MockHttp::new();
        http.route("http://x/a", MockRoute::ok(vec![1; 10]).stall_after(4));
        let mut response = http.open(Request::get("http://x/a")).await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(response.read(&mut buf).await.unwrap(), 4);
        let stalled = tokio::time::timeout(Duration::from_secs(3600), response.read(&mut buf)).await;
        assert!(stalled.is_err());
    }
}
