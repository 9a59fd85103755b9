use std::fmt;

/// Single error type shared by the ADB and Git cores.
///
/// A flat, data-carrying enum: no `thiserror`, variants built by hand at
/// the call site with an explicit `.map_err(...)`.
#[derive(Clone, Debug, PartialEq)]
pub enum CoreError {
    /// The underlying transport (TCP socket, HTTP connection) is closed.
    TransportClosed(String),
    /// A read or write did not complete within the configured deadline.
    TransportTimeout(String),
    /// A framed message (ADB header, pkt-line, shell_v2 packet) violated
    /// its fixed shape: bad magic, length out of range, unknown command.
    FramingInvalid(String),
    /// An ADB stream was closed by the peer (`CLSE`) or locally.
    StreamClosed(u32),
    /// A blocking wait on a stream latch exceeded its deadline.
    StreamTimeout(u32),
    /// A git object's bytes do not parse as their declared type, or hash to
    /// something other than their name.
    ObjectBroken(String),
    /// A packfile or `.idx` file is structurally invalid: bad magic/version,
    /// truncated table, checksum mismatch, dangling delta base.
    PackBroken(String),
    /// The remote end (adbd, or a git server) reported an application-level
    /// failure rather than a framing problem.
    RemoteError(String),
    /// Wraps an `io::Error` from a socket, file, or HTTP body read.
    Io(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::TransportClosed(msg) => write!(f, "transport closed: {msg}"),
            CoreError::TransportTimeout(msg) => write!(f, "transport timeout: {msg}"),
            CoreError::FramingInvalid(msg) => write!(f, "invalid framing: {msg}"),
            CoreError::StreamClosed(id) => write!(f, "stream {id} closed"),
            CoreError::StreamTimeout(id) => write!(f, "stream {id} timed out"),
            CoreError::ObjectBroken(msg) => write!(f, "broken object: {msg}"),
            CoreError::PackBroken(msg) => write!(f, "broken pack: {msg}"),
            CoreError::RemoteError(msg) => write!(f, "remote error: {msg}"),
            CoreError::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
