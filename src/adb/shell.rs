//! Shell command execution, choosing `shell_v2` when the device advertises
//! it and falling back to the plain `shell:` service otherwise.

use crate::adb::connection::Connection;
use crate::error::CoreError;
use bytes::{Bytes, BytesMut};
use std::time::Duration;

const SHELL_V2_STDOUT: u8 = 1;
const SHELL_V2_STDERR: u8 = 2;
const SHELL_V2_EXIT_CODE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// Whether this result came from `shell,v2:`. When false, `stderr` is
    /// always empty — v1 has no channel to carry it, so callers must not
    /// treat an empty `stderr` as "nothing was written" in that case.
    pub shell_v2: bool,
}

impl Default for ShellResult {
    /// No `id=3` frame seen yet: the default exit code is `-1`, not `0` —
    /// a real zero exit code is only ever learned from an explicit frame.
    fn default() -> Self {
        ShellResult { stdout: Vec::new(), stderr: Vec::new(), exit_code: -1, shell_v2: true }
    }
}

impl ShellResult {
    /// Parses a `shell,v2:` response: a run of packets, each a 1-byte
    /// stream id followed by a 4-byte little-endian length and that many
    /// payload bytes. An exit-code packet's payload must be exactly one
    /// byte; anything else is a framing error rather than a short read,
    /// since the packet boundaries are still self-consistent.
    pub fn from_shell_v2(raw: &[u8]) -> Result<ShellResult, CoreError> {
        let mut result = ShellResult::default();
        let mut pos = 0;
        while pos < raw.len() {
            if pos + 5 > raw.len() {
                return Err(CoreError::FramingInvalid("truncated shell_v2 packet header".to_string()));
            }
            let id = raw[pos];
            let len = u32::from_le_bytes(raw[pos + 1..pos + 5].try_into().unwrap()) as usize;
            pos += 5;
            if pos + len > raw.len() {
                return Err(CoreError::FramingInvalid("truncated shell_v2 packet payload".to_string()));
            }
            let payload = &raw[pos..pos + len];
            pos += len;

            match id {
                SHELL_V2_STDOUT => result.stdout.extend_from_slice(payload),
                SHELL_V2_STDERR => result.stderr.extend_from_slice(payload),
                SHELL_V2_EXIT_CODE => {
                    if payload.len() != 1 {
                        return Err(CoreError::FramingInvalid(format!(
                            "exit code packet must carry exactly 1 byte, got {}",
                            payload.len()
                        )));
                    }
                    result.exit_code = payload[0] as i32;
                }
                other => {
                    tracing::warn!(id = other, "ignoring unknown shell_v2 packet id");
                }
            }
        }
        Ok(result)
    }

    /// `shell:` (v1) has no framing at all: the whole stream is stdout and
    /// there's no way to learn an exit code.
    pub fn from_shell_v1(raw: &[u8]) -> ShellResult {
        ShellResult {
            stdout: raw.to_vec(),
            stderr: Vec::new(),
            exit_code: 0,
            shell_v2: false,
        }
    }
}

/// Runs `command` over a fresh stream, picking `shell,v2:` when the
/// handshake advertised `shell_v2`, else `shell:`. Reads until the peer
/// closes the stream, then parses the accumulated bytes according to
/// whichever service was used.
pub fn shell(connection: &Connection, command: &str, read_timeout: Duration) -> Result<ShellResult, CoreError> {
    let use_v2 = connection.device_features.shell_v2();
    let service = if use_v2 {
        format!("shell,v2:{command}")
    } else {
        format!("shell:{command}")
    };

    let stream = connection.open_stream(&service)?;
    let mut buffer = BytesMut::new();
    loop {
        match stream.wait_for_data(read_timeout) {
            Ok(chunk) => buffer.extend_from_slice(&chunk),
            Err(CoreError::StreamClosed(_)) => break,
            Err(CoreError::StreamTimeout(id)) => {
                if *stream.state.lock().unwrap() == crate::adb::stream::StreamState::Closed {
                    break;
                }
                return Err(CoreError::StreamTimeout(id));
            }
            Err(e) => return Err(e),
        }
    }

    let raw: Bytes = buffer.freeze();
    if use_v2 {
        ShellResult::from_shell_v2(&raw)
    } else {
        Ok(ShellResult::from_shell_v1(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![id];
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_stdout_stderr_and_exit_code_packets() {
        let mut raw = Vec::new();
        raw.extend(packet(SHELL_V2_STDOUT, b"hello\n"));
        raw.extend(packet(SHELL_V2_STDERR, b"warn\n"));
        raw.extend(packet(SHELL_V2_EXIT_CODE, &[0]));

        let result = ShellResult::from_shell_v2(&raw).unwrap();
        assert_eq!(result.stdout, b"hello\n");
        assert_eq!(result.stderr, b"warn\n");
        assert_eq!(result.exit_code, 0);
        assert!(result.shell_v2);
    }

    #[test]
    fn rejects_multi_byte_exit_code_payload() {
        let raw = packet(SHELL_V2_EXIT_CODE, &[0, 1]);
        assert!(matches!(ShellResult::from_shell_v2(&raw), Err(CoreError::FramingInvalid(_))));
    }

    #[test]
    fn unknown_packet_id_is_skipped_not_fatal() {
        let mut raw = packet(99, b"ignored");
        raw.extend(packet(SHELL_V2_STDOUT, b"ok"));
        let result = ShellResult::from_shell_v2(&raw).unwrap();
        assert_eq!(result.stdout, b"ok");
    }

    #[test]
    fn defaults_exit_code_to_negative_one_when_no_frame_seen() {
        let raw = packet(SHELL_V2_STDOUT, b"still running");
        let result = ShellResult::from_shell_v2(&raw).unwrap();
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn shell_v1_wraps_the_whole_stream_as_stdout() {
        let result = ShellResult::from_shell_v1(b"plain output");
        assert_eq!(result.stdout, b"plain output");
        assert_eq!(result.exit_code, 0);
        assert!(!result.shell_v2);
    }
}
