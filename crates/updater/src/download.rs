//! Streaming a bundle straight into the asset store's staging area, and
//! checking it there before it is allowed anywhere near its final name.

use crate::error::{ErrorKind, Result};
use crate::http::{HttpClient, Request};
use crate::options::UpdaterOptions;
use emote_frame::bundle::validate_reader;
use emote_storage::{AssetStore, Sealed, Staged, Writing};
use exn::ResultExt;
use std::time::Duration;

const CHUNK_SIZE: usize = 4096;

/// A complete, sealed download waiting in the staging area.
pub struct Download {
    pub staged: Staged<Sealed>,
    pub size: u64,
    /// Lowercase hex BLAKE3 digest of the body.
    pub hash: String,
}

/// Download `url` into a staging file destined for `destination`.
///
/// Without a usable `Content-Length` (absent or zero) the body is read until
/// the server closes it; otherwise exactly `Content-Length` bytes are
/// expected and an early close is [`Interrupted`](ErrorKind::Interrupted).
/// Every read is bounded by `read_timeout` and the whole transfer by
/// `download_timeout`. On any failure the connection is dropped and the
/// staging file deleted.
pub async fn stream_download(
    http: &dyn HttpClient,
    url: &str,
    store: &AssetStore,
    destination: &str,
    options: &UpdaterOptions,
) -> Result<Download> {
    let mut staged = store.stage(destination).await.or_raise(|| ErrorKind::Storage)?;
    let transfer = tokio::time::timeout(
        options.download_timeout,
        transfer(http, url, &mut staged, options.read_timeout, &options.user_agent),
    )
    .await;
    let (size, hash) = match transfer {
        Ok(Ok(done)) => done,
        Ok(Err(err)) => {
            tracing::warn!(url, error = %err, received = staged.written(), "Download failed");
            store.discard(staged).await;
            return Err(err);
        },
        Err(_) => {
            tracing::warn!(url, received = staged.written(), "Download timed out");
            store.discard(staged).await;
            exn::bail!(ErrorKind::Timeout("download"));
        },
    };
    let staged = store.seal(staged).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(url, size, hash = %hash, "Download complete");
    Ok(Download { staged, size, hash })
}

async fn transfer(
    http: &dyn HttpClient,
    url: &str,
    staged: &mut Staged<Writing>,
    read_timeout: Duration,
    user_agent: &str,
) -> Result<(u64, String)> {
    let request = Request::get(url)
        .header("User-Agent", user_agent)
        .header("Accept", "application/octet-stream")
        .header("Accept-Encoding", "identity");
    let mut response = http.open(request).await?;
    let status = response.status();
    if status != 200 {
        exn::bail!(ErrorKind::Status(status));
    }
    let expected = response.content_length().filter(|length| *length > 0);
    tracing::debug!(url, ?expected, "Download started");

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received = 0u64;
    loop {
        let want = match expected {
            Some(expected) if received >= expected => break,
            // Bounded by CHUNK_SIZE, so the narrowing is lossless.
            Some(expected) => (expected - received).min(CHUNK_SIZE as u64) as usize,
            None => CHUNK_SIZE,
        };
        let n = tokio::time::timeout(read_timeout, response.read(&mut buf[..want]))
            .await
            .map_err(|_| ErrorKind::Timeout("read"))??;
        if n == 0 {
            if let Some(expected) = expected {
                exn::bail!(ErrorKind::Interrupted { received, expected });
            }
            break;
        }
        let chunk = &buf[..n];
        staged.write_chunk(chunk).await.or_raise(|| ErrorKind::Storage)?;
        hasher.update(chunk);
        received += n as u64;
        tracing::trace!(received, ?expected, "Chunk written");
    }
    Ok((received, hasher.finalize().to_hex().to_string()))
}

/// Validate a sealed download against the expected per-animation frame
/// counts, reading it back from disk one header at a time.
pub async fn validate_download(store: &AssetStore, download: &Download, expected_frame_counts: &[u32]) -> Result<u32> {
    let reader = store.open_staged(&download.staged).await.or_raise(|| ErrorKind::Storage)?;
    let counts = expected_frame_counts.to_vec();
    let frames = tokio::task::spawn_blocking(move || validate_reader(reader, &counts))
        .await
        .or_raise(|| ErrorKind::Validation)?
        .or_raise(|| ErrorKind::Validation)?;
    tracing::debug!(name = download.staged.name(), frames, "Bundle validated");
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::{MockHttp, MockRoute};
    use emote_frame::{Frame, FrameHeader, encode_frame};
    use emote_storage::backend::MockBackend;
    use std::path::PathBuf;
    use std::sync::Arc;

    pub(crate) const BUNDLE_URL: &str = "https://cdn.local/animations_mega.bin";

    /// A mega bundle of `frames` tiny frames.
    pub(crate) fn bundle(frames: u32) -> Vec<u8> {
        (0..frames)
            .flat_map(|n| {
                let header = FrameHeader { color_format: 0x12, flags: 0, width: 2, height: 2, stride: 4 };
                encode_frame(&Frame::new(header, vec![n as u8; 8]).unwrap())
            })
            .collect()
    }

    fn setup(route: MockRoute) -> (Arc<MockBackend>, AssetStore, MockHttp) {
        let backend = Arc::new(MockBackend::default());
        let store = AssetStore::new(backend.clone());
        let http = MockHttp::new();
        http.route(BUNDLE_URL, route);
        (backend, store, http)
    }

    async fn download(store: &AssetStore, http: &MockHttp) -> Result<Download> {
        stream_download(http, BUNDLE_URL, store, "animations_mega.bin", &UpdaterOptions::default()).await
    }

    #[tokio::test]
    async fn test_known_length() {
        let body = bundle(28);
        let (backend, store, http) = setup(MockRoute::ok(body.clone()).with_chunk_size(100));
        let download = download(&store, &http).await.unwrap();
        assert_eq!(download.size, body.len() as u64);
        assert_eq!(download.hash, blake3::hash(&body).to_hex().to_string());
        assert_eq!(backend.paths(), vec![PathBuf::from(".updates/animations_mega.bin.tmp")]);
        let request = &http.requests()[0];
        assert_eq!(request.header_value("Accept"), Some("application/octet-stream"));
        assert_eq!(request.header_value("Accept-Encoding"), Some("identity"));
    }

    #[tokio::test]
    async fn test_zero_content_length_reads_until_close() {
        let body = bundle(28);
        let (_backend, store, http) = setup(MockRoute::ok(body.clone()).with_content_length(Some(0)));
        let download = download(&store, &http).await.unwrap();
        assert_eq!(download.size, body.len() as u64);
        assert_eq!(validate_download(&store, &download, &[3, 3, 4, 4, 4, 4, 2, 4]).await.unwrap(), 28);
    }

    #[tokio::test]
    async fn test_missing_content_length_reads_until_close() {
        let body = bundle(5);
        let (_backend, store, http) = setup(MockRoute::ok(body.clone()).with_content_length(None));
        let download = download(&store, &http).await.unwrap();
        assert_eq!(download.size, body.len() as u64);
    }

    #[tokio::test]
    async fn test_extra_bytes_past_content_length_are_ignored() {
        let body = bundle(2);
        let declared = body.len() as u64 - 10;
        let (_backend, store, http) = setup(MockRoute::ok(body).with_content_length(Some(declared)));
        assert_eq!(download(&store, &http).await.unwrap().size, declared);
    }

    #[tokio::test]
    async fn test_short_body_is_interrupted() {
        let body = bundle(3);
        let declared = body.len() as u64 + 100;
        let (backend, store, http) = setup(MockRoute::ok(body.clone()).with_content_length(Some(declared)));
        let err = download(&store, &http).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Interrupted { received, expected }
            if *received == body.len() as u64 && *expected == declared));
        assert!(backend.paths().is_empty());
    }

    #[tokio::test]
    async fn test_bad_status() {
        let (backend, store, http) = setup(MockRoute::status(404));
        let err = download(&store, &http).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Status(404)));
        assert!(backend.paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_read_times_out_and_deletes_partial_file() {
        let route = MockRoute::ok(bundle(28)).with_chunk_size(64).stall_after(200);
        let (backend, store, http) = setup(route);
        let err = download(&store, &http).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Timeout("read")));
        assert!(backend.paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transfer_hits_overall_timeout() {
        // Each read is well inside the read timeout, but 896 bytes at eight
        // bytes per second take far longer than the download timeout.
        let route = MockRoute::ok(bundle(28)).with_chunk_size(8).with_delay(Duration::from_secs(1));
        let (backend, store, http) = setup(route);
        let err = download(&store, &http).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Timeout("download")));
        assert!(backend.paths().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_storage() {
        let (backend, store, http) = setup(MockRoute::ok(bundle(1)));
        backend.fail_writes_to(".updates/animations_mega.bin.tmp");
        let err = download(&store, &http).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage));
        assert_eq!(http.requests().len(), 0);
    }

    #[tokio::test]
    async fn test_validation_rejects_short_bundle() {
        let (_backend, store, http) = setup(MockRoute::ok(bundle(27)));
        let download = download(&store, &http).await.unwrap();
        let err = validate_download(&store, &download, &[3, 3, 4, 4, 4, 4, 2, 4]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation));
    }
}
