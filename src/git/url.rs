use crate::error::CoreError;

/// A parsed repository location. Only `Http` is ever dialed by
/// `FetchTransport`; `ScpLike` is parsed so a caller gets a clear rejection
/// instead of it being mis-read as a local path, and `LocalPath` exists to
/// build the `git://` handshake line, not to read a repository from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitUrl {
    Http {
        scheme: String,
        host: String,
        port: Option<u16>,
        path: String,
    },
    ScpLike {
        user: Option<String>,
        host: String,
        path: String,
    },
    LocalPath(String),
}

impl GitUrl {
    /// Parses one of three forms: a standard URI, an SCP-like
    /// `user@host:path` shorthand, or a bare local filesystem path.
    pub fn parse(raw: &str) -> Result<GitUrl, CoreError> {
        if let Some(rest) = raw.split_once("://") {
            return Self::parse_uri(rest.0, rest.1, raw);
        }
        if let Some(scp) = Self::parse_scp_like(raw) {
            return Ok(scp);
        }
        Ok(GitUrl::LocalPath(raw.to_string()))
    }

    fn parse_uri(scheme: &str, rest: &str, raw: &str) -> Result<GitUrl, CoreError> {
        let (authority, path) = rest
            .split_once('/')
            .map(|(a, p)| (a, format!("/{p}")))
            .unwrap_or((rest, String::new()));
        if authority.is_empty() {
            return Err(CoreError::FramingInvalid(format!("git url missing host: {raw:?}")));
        }
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse()
                    .map_err(|_| CoreError::FramingInvalid(format!("git url has non-numeric port: {raw:?}")))?;
                (host.to_string(), Some(port))
            }
            None => (authority.to_string(), None),
        };
        Ok(GitUrl::Http {
            scheme: scheme.to_string(),
            host,
            port,
            path,
        })
    }

    /// `user@host:path`, where `path` does not start with `/` (that would
    /// make it `scheme://host/path` territory, already handled above) and
    /// does not look like a Windows drive letter (`C:\...`).
    fn parse_scp_like(raw: &str) -> Option<GitUrl> {
        let (user_host, path) = raw.split_once(':')?;
        if path.starts_with('/') || path.is_empty() {
            return None;
        }
        if user_host.len() == 1 && user_host.chars().next().unwrap().is_ascii_alphabetic() {
            return None; // "C:\path" style, not scp-like
        }
        let (user, host) = match user_host.split_once('@') {
            Some((u, h)) => (Some(u.to_string()), h.to_string()),
            None => (None, user_host.to_string()),
        };
        if host.is_empty() {
            return None;
        }
        Some(GitUrl::ScpLike {
            user,
            host,
            path: path.to_string(),
        })
    }

    /// Builds the `git://` native handshake pkt-line body (without framing):
    /// `"git-upload-pack <path>\0host=<host>\0"`.
    pub fn upload_pack_handshake(&self) -> Result<String, CoreError> {
        match self {
            GitUrl::Http { host, path, .. } => Ok(format!("git-upload-pack {path}\0host={host}\0")),
            GitUrl::LocalPath(path) => Ok(format!("git-upload-pack {path}\0host=\0")),
            GitUrl::ScpLike { .. } => Err(CoreError::FramingInvalid(
                "scp-like ssh urls are parsed but not dialed".to_string(),
            )),
        }
    }
}
