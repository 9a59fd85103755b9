//! The 24-byte ADB message header and its blocking send/recv: command,
//! arg0, arg1, data_length, data_crc, magic, all little-endian `u32`s.

use crate::adb::const_::is_known_command;
use crate::error::CoreError;
use bytes::Bytes;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

pub const HEADER_LEN: usize = 24;

fn command_as_u32(command: [u8; 4]) -> u32 {
    u32::from_le_bytes(command)
}

fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

/// One framed ADB message: a 24-byte header plus an optional payload.
#[derive(Debug, Clone)]
pub struct Message {
    pub command: [u8; 4],
    pub arg0: u32,
    pub arg1: u32,
    pub data: Bytes,
}

impl Message {
    pub fn new(command: [u8; 4], arg0: u32, arg1: u32, data: Bytes) -> Self {
        Message { command, arg0, arg1, data }
    }

    /// Encodes the header + payload exactly as `message_send` packs it:
    /// `command, arg0, arg1, len(data), sum(data)&0xFFFFFFFF, command^0xFFFFFFFF`.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.data.len());
        let command = command_as_u32(self.command);
        buf.extend_from_slice(&command.to_le_bytes());
        buf.extend_from_slice(&self.arg0.to_le_bytes());
        buf.extend_from_slice(&self.arg1.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&checksum(&self.data).to_le_bytes());
        buf.extend_from_slice(&(command ^ 0xFFFF_FFFF).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

/// Blocking read of exactly `buf.len()` bytes, looping over short reads the
/// way `recv_exact` does, distinguishing a clean peer-close (`TransportClosed`)
/// from a partial read after some bytes already arrived (`FramingInvalid`).
fn recv_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), CoreError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).map_err(CoreError::from)?;
        if n == 0 {
            if filled == 0 {
                return Err(CoreError::TransportClosed("peer closed during recv".to_string()));
            }
            return Err(CoreError::FramingInvalid("connection closed mid-message".to_string()));
        }
        filled += n;
    }
    Ok(())
}

/// Sends one message. The caller is expected to hold a connection-wide send
/// mutex — the wire protocol requires a header and its payload never
/// interleave with another thread's write.
pub fn send_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), CoreError> {
    writer.write_all(&message.encode()).map_err(CoreError::from)?;
    writer.flush().map_err(CoreError::from)
}

/// Receives one message, validating the magic and the known-command set
/// before trusting the header's claimed data length.
pub fn recv_message<R: Read>(reader: &mut R) -> Result<Message, CoreError> {
    let mut header = [0u8; HEADER_LEN];
    recv_exact(reader, &mut header)?;

    let command_word = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let arg0 = u32::from_le_bytes(header[4..8].try_into().unwrap());
    let arg1 = u32::from_le_bytes(header[8..12].try_into().unwrap());
    let data_length = u32::from_le_bytes(header[12..16].try_into().unwrap());
    let data_crc = u32::from_le_bytes(header[16..20].try_into().unwrap());
    let magic = u32::from_le_bytes(header[20..24].try_into().unwrap());

    if magic != command_word ^ 0xFFFF_FFFF {
        return Err(CoreError::FramingInvalid(format!(
            "bad magic: command={command_word:#x} magic={magic:#x}"
        )));
    }
    let command = command_word.to_le_bytes();
    if !is_known_command(command) {
        return Err(CoreError::FramingInvalid(format!("unknown command {command_word:#x}")));
    }
    if data_length > crate::adb::const_::ADB_MAX_PAYLOAD {
        return Err(CoreError::FramingInvalid(format!(
            "data_length {data_length} exceeds max payload"
        )));
    }

    let mut data = vec![0u8; data_length as usize];
    if !data.is_empty() {
        recv_exact(reader, &mut data)?;
    }
    if checksum(&data) != data_crc {
        return Err(CoreError::FramingInvalid("data checksum mismatch".to_string()));
    }

    Ok(Message { command, arg0, arg1, data: Bytes::from(data) })
}

/// Like [`recv_message`], but bounded by `deadline` via repeated short reads
/// on a socket already put in non-blocking/read-timeout mode by the caller;
/// here we just track elapsed wall time around a blocking reader and
/// surface `StreamTimeout`-shaped context through `TransportTimeout`.
pub fn recv_message_with_deadline<R: Read>(reader: &mut R, timeout: Duration) -> Result<Message, CoreError> {
    let start = Instant::now();
    let result = recv_message(reader);
    if result.is_err() && start.elapsed() >= timeout {
        return Err(CoreError::TransportTimeout(format!("recv exceeded {timeout:?}")));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::const_::{CNXN, OKAY};
    use std::io::Cursor;

    #[test]
    fn round_trips_a_message_through_a_byte_buffer() {
        let message = Message::new(OKAY, 7, 9, Bytes::from_static(b"hello"));
        let mut buf = Vec::new();
        send_message(&mut buf, &message).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = recv_message(&mut cursor).unwrap();
        assert_eq!(decoded.command, OKAY);
        assert_eq!(decoded.arg0, 7);
        assert_eq!(decoded.arg1, 9);
        assert_eq!(&decoded.data[..], b"hello");
    }

    #[test]
    fn rejects_tampered_magic() {
        let message = Message::new(CNXN, 0, 0, Bytes::new());
        let mut buf = message.encode();
        buf[20] ^= 0xFF;
        let mut cursor = Cursor::new(buf);
        assert!(matches!(recv_message(&mut cursor), Err(CoreError::FramingInvalid(_))));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let message = Message::new(OKAY, 0, 0, Bytes::from_static(b"abc"));
        let mut buf = message.encode();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let mut cursor = Cursor::new(buf);
        assert!(matches!(recv_message(&mut cursor), Err(CoreError::FramingInvalid(_))));
    }

    #[test]
    fn clean_close_before_any_bytes_is_transport_closed() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(matches!(recv_message(&mut cursor), Err(CoreError::TransportClosed(_))));
    }
}
