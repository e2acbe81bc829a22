//! The HTTP boundary.
//!
//! The updater only needs "open a GET, look at the status and length, read
//! the body in chunks". Keeping that behind [`HttpClient`] lets the device
//! build plug in its own TLS stack and lets tests script a server.

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "reqwest")]
mod reqwest_client;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockHttp, MockRoute};
#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type HttpHandle = Arc<dyn HttpClient>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), headers: Vec::new() }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header called `name`, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

/// Opens requests. Implementations must be cheap to share between tasks.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` and return once the status line and headers are in.
    async fn open(&self, request: Request) -> Result<Box<dyn HttpResponse>>;
}

/// An open response. Dropping it closes the connection.
#[async_trait]
pub trait HttpResponse: Send {
    fn status(&self) -> u16;

    /// `Content-Length`, if the server sent one.
    fn content_length(&self) -> Option<u64>;

    /// Read the next chunk of body into `buf`. `Ok(0)` means the body ended.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}
