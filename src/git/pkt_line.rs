use crate::error::CoreError;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// `0000` — ends a section without ending the connection.
pub const FLUSH_PKT: &[u8] = b"0000";
/// `0001` — separates command args from ref/capability lines in protocol v2.
pub const DELIM_PKT: &[u8] = b"0001";

/// A decoded pkt-line frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Flush,
    Delim,
    Data(Bytes),
}

/// Encodes one data frame as `"xxxx" + data`, where `xxxx` is 4 lowercase
/// hex digits giving `len(data) + 4`. Callers that want a trailing newline
/// include it in `data` themselves — this codec never appends one.
pub fn encode(data: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(data.len() + 4);
    buf.extend_from_slice(format!("{:04x}", data.len() + 4).as_bytes());
    buf.extend_from_slice(data);
    buf
}

pub fn flush() -> BytesMut {
    BytesMut::from(FLUSH_PKT)
}

pub fn delim() -> BytesMut {
    BytesMut::from(DELIM_PKT)
}

/// Reads one pkt-line frame from an async byte stream. Returns `Ok(None)` on
/// a clean EOF before any bytes of a new frame arrive.
pub async fn decode_one<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<PktLine>, CoreError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(CoreError::TransportClosed(e.to_string())),
    }

    let len_str = std::str::from_utf8(&len_buf)
        .map_err(|_| CoreError::FramingInvalid("pkt-line length is not ASCII".into()))?;
    let len = u32::from_str_radix(len_str, 16)
        .map_err(|_| CoreError::FramingInvalid(format!("pkt-line length {len_str:?} is not hex")))?;

    match len {
        0 => Ok(Some(PktLine::Flush)),
        1 => Ok(Some(PktLine::Delim)),
        n if n < 4 => Err(CoreError::FramingInvalid(format!("pkt-line length {n} below minimum frame size"))),
        n => {
            let body_len = (n - 4) as usize;
            let mut body = vec![0u8; body_len];
            reader
                .read_exact(&mut body)
                .await
                .map_err(|e| CoreError::TransportClosed(e.to_string()))?;
            Ok(Some(PktLine::Data(Bytes::from(body))))
        }
    }
}

/// Reads pkt-lines until the peer closes the connection, collecting every
/// frame in order (including flush/delim markers).
pub async fn decode_all<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<PktLine>, CoreError> {
    let mut frames = Vec::new();
    while let Some(frame) = decode_one(reader).await? {
        frames.push(frame);
    }
    Ok(frames)
}
