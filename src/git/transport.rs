use crate::error::CoreError;
use crate::git::negotiation::FetchRequest;
use crate::git::sideband::SideBandDemux;
use crate::git::url::GitUrl;
use bytes::Bytes;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapts an already-buffered response body into `AsyncRead` for
/// `SideBandDemux`, which is written against a streaming socket/body in
/// general but here only ever sees data already resident in memory.
struct BytesReader {
    data: Bytes,
    pos: usize,
}

impl AsyncRead for BytesReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.data[this.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Runs the client side of protocol-v2 `fetch` over HTTP(S), streaming the
/// resulting packfile to an external sink. Exists for the duration of one
/// fetch; holds no state across calls.
pub struct FetchTransport {
    client: reqwest::Client,
    read_timeout: Duration,
    buffer_size: usize,
}

impl FetchTransport {
    pub fn new() -> Self {
        FetchTransport {
            client: reqwest::Client::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            buffer_size: crate::git::sideband::DEFAULT_BUFFER_SIZE,
        }
    }

    /// Routes all requests through `proxy_url` (e.g. `http://localhost:8080`).
    pub fn with_proxy(proxy_url: &str) -> Result<Self, CoreError> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| CoreError::FramingInvalid(format!("invalid proxy url {proxy_url:?}: {e}")))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .build()
            .map_err(|e| CoreError::TransportClosed(e.to_string()))?;
        Ok(FetchTransport {
            client,
            read_timeout: DEFAULT_READ_TIMEOUT,
            buffer_size: crate::git::sideband::DEFAULT_BUFFER_SIZE,
        })
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Posts a `fetch` negotiation body to `<repo>/git-upload-pack` and
    /// demuxes the side-band response into `sink`. Returns the number of
    /// packfile bytes written. On any network error the caller is expected
    /// to discard whatever the sink received; this transport never renames
    /// partial files into place.
    pub async fn fetch<W: AsyncWrite + Unpin>(
        &self,
        url: &GitUrl,
        request: &FetchRequest,
        sink: &mut W,
    ) -> Result<u64, CoreError> {
        let _span = tracing::info_span!("fetch", wants = request.wants.len()).entered();
        let GitUrl::Http { scheme, host, port, path } = url else {
            return Err(CoreError::FramingInvalid(
                "FetchTransport only dials http(s)/git:// urls".to_string(),
            ));
        };
        let endpoint = match port {
            Some(p) => format!("{scheme}://{host}:{p}{path}/git-upload-pack"),
            None => format!("{scheme}://{host}{path}/git-upload-pack"),
        };

        let body = request.build_body().freeze();
        let response = tokio::time::timeout(
            self.read_timeout,
            self.client
                .post(&endpoint)
                .header("User-Agent", crate::git::capability::CLIENT_AGENT)
                .header("Git-Protocol", "version=2")
                .header("Content-Type", "application/x-git-upload-pack-request")
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| CoreError::TransportTimeout(endpoint.clone()))?
        .map_err(|e| CoreError::TransportClosed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::RemoteError(format!(
                "{endpoint} responded with {}",
                response.status()
            )));
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::TransportClosed(e.to_string()))?;
        let mut reader = BytesReader { data: body_bytes, pos: 0 };

        let demux = SideBandDemux::new(sink).with_buffer_size(self.buffer_size);
        let written = demux.run(&mut reader).await?;
        sink.flush()
            .await
            .map_err(|e| CoreError::TransportClosed(e.to_string()))?;
        Ok(written)
    }
}

impl Default for FetchTransport {
    fn default() -> Self {
        Self::new()
    }
}
