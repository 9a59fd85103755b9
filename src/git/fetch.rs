//! Ties `GitUrl`, `FetchRequest`, and `FetchTransport` together behind one
//! caller-supplied argument struct. No global config: every field a fetch
//! needs travels in through `FetchArgs`.

use crate::error::CoreError;
use crate::git::negotiation::{FetchRequest, DEFAULT_HAVE_LOOKBACK};
use crate::git::sideband::DEFAULT_BUFFER_SIZE;
use crate::git::transport::FetchTransport;
use crate::git::url::GitUrl;
use std::path::PathBuf;
use tokio::io::AsyncWrite;

pub struct FetchArgs {
    /// Local repository directory the fetched pack will ultimately live
    /// under (not read by this module — object-store ingestion of the
    /// resulting pack is a separate step the caller drives).
    pub repo_path: PathBuf,
    pub repo_url: String,
    pub proxy: Option<String>,
    pub depth: Option<u32>,
    pub want: String,
    pub have_lookback: usize,
    pub buffer_size: usize,
}

impl FetchArgs {
    pub fn new(repo_path: impl Into<PathBuf>, repo_url: impl Into<String>, want: impl Into<String>) -> Self {
        FetchArgs {
            repo_path: repo_path.into(),
            repo_url: repo_url.into(),
            proxy: None,
            depth: None,
            want: want.into(),
            have_lookback: DEFAULT_HAVE_LOOKBACK,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Runs one `fetch` negotiation against `args.repo_url` and streams the
/// resulting packfile into `sink`. Returns the number of packfile bytes
/// written.
pub async fn fetch<W: AsyncWrite + Unpin>(args: &FetchArgs, haves: Vec<String>, sink: &mut W) -> Result<u64, CoreError> {
    let url = GitUrl::parse(&args.repo_url)?;

    let mut request = FetchRequest::new(vec![args.want.clone()]).with_haves(haves);
    request.have_lookback = args.have_lookback;
    if let Some(depth) = args.depth {
        request = request.with_depth(depth);
    }

    let transport = match &args.proxy {
        Some(proxy_url) => FetchTransport::with_proxy(proxy_url)?,
        None => FetchTransport::new(),
    }
    .with_buffer_size(args.buffer_size);
    transport.fetch(&url, &request, sink).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_args_defaults_match_negotiation_and_sideband_defaults() {
        let args = FetchArgs::new("/srv/repo.git", "https://example.com/repo.git", "main");
        assert_eq!(args.have_lookback, DEFAULT_HAVE_LOOKBACK);
        assert_eq!(args.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(args.proxy.is_none());
    }
}
