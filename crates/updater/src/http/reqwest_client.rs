use super::{HttpClient, HttpResponse, Method, Request};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::time::Duration;

/// [`HttpClient`] over `reqwest` with rustls.
///
/// Only the connect phase is bounded here; read and overall timeouts are the
/// caller's business so that they can be enforced per chunk.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .or_raise(|| ErrorKind::Transport("could not build HTTP client".to_string()))?;
        Ok(Self { client })
    }

    /// `phase` names what timed out: `"connect"` for `send()`, `"read"` for
    /// body chunks.
    fn map_error(err: &reqwest::Error, phase: &'static str) -> ErrorKind {
        error_kind(phase, err.is_timeout(), || err.to_string())
    }
}

fn error_kind(phase: &'static str, timed_out: bool, message: impl FnOnce() -> String) -> ErrorKind {
    if timed_out { ErrorKind::Timeout(phase) } else { ErrorKind::Transport(message()) }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn open(&self, request: Request) -> Result<Box<dyn HttpResponse>> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await.map_err(|e| Self::map_error(&e, "connect"))?;
        tracing::debug!(
            url = %request.url,
            status = response.status().as_u16(),
            length = ?response.content_length(),
            "Response received"
        );
        Ok(Box::new(ReqwestResponse { response, pending: Vec::new(), offset: 0 }))
    }
}

/// Adapts reqwest's chunk stream to fill caller-sized buffers.
struct ReqwestResponse {
    response: reqwest::Response,
    pending: Vec<u8>,
    offset: usize,
}

#[async_trait]
impl HttpResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        while self.offset >= self.pending.len() {
            match self.response.chunk().await.map_err(|e| ReqwestClient::map_error(&e, "read"))? {
                Some(chunk) => {
                    self.pending = chunk.to_vec();
                    self.offset = 0;
                },
                None => return Ok(0),
            }
        }
        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("connect")]
    #[case("read")]
    fn test_timeout_keeps_phase(#[case] phase: &'static str) {
        assert!(matches!(error_kind(phase, true, String::new), ErrorKind::Timeout(p) if p == phase));
    }

    #[test]
    fn test_other_failures_are_transport() {
        let kind = error_kind("read", false, || "connection reset".to_string());
        assert!(matches!(kind, ErrorKind::Transport(message) if message == "connection reset"));
    }
}
