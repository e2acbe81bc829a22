use crate::error::{ErrorKind, Result};
use crate::http::{HttpClient, HttpResponse, Request};
use crate::options::UpdaterOptions;
use std::time::Duration;

/// Longest response body accepted from the resolve endpoint.
const MAX_URL_LEN: usize = 4096;

/// Ask `endpoint` where the current bundle lives.
///
/// The response body, trimmed, is the URL. A non-200 status, an empty body
/// or something that isn't an `http(s)` URL is
/// [`Unresolvable`](ErrorKind::Unresolvable).
pub async fn resolve_bundle_url(http: &dyn HttpClient, endpoint: &str, options: &UpdaterOptions) -> Result<String> {
    let request = Request::get(endpoint)
        .header("User-Agent", options.user_agent.as_str())
        .header("Accept", "text/plain, */*")
        .header("Accept-Encoding", "identity");
    let resolve = async {
        let mut response = http.open(request).await?;
        let status = response.status();
        if status != 200 {
            exn::bail!(ErrorKind::Unresolvable(format!("endpoint answered {status}")));
        }
        let body = read_body(response.as_mut(), MAX_URL_LEN, options.read_timeout).await?;
        let url = String::from_utf8_lossy(&body).trim().to_string();
        if url.is_empty() {
            exn::bail!(ErrorKind::Unresolvable("endpoint returned an empty body".to_string()));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            exn::bail!(ErrorKind::Unresolvable(format!("not an HTTP URL: {url}")));
        }
        Ok::<_, crate::error::Error>(url)
    };
    let url = tokio::time::timeout(options.resolve_timeout, resolve)
        .await
        .map_err(|_| ErrorKind::Timeout("resolve"))??;
    tracing::info!(endpoint, url = %url, "Resolved bundle URL");
    Ok(url)
}

async fn read_body(response: &mut dyn HttpResponse, limit: usize, read_timeout: Duration) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = tokio::time::timeout(read_timeout, response.read(&mut buf))
            .await
            .map_err(|_| ErrorKind::Timeout("read"))??;
        if n == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > limit {
            exn::bail!(ErrorKind::Unresolvable(format!("response body exceeds {limit} bytes")));
        }
    }
}
