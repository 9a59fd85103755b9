use crate::error::CoreError;
use crate::git::pkt_line::{decode_one, PktLine};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBandChannel {
    PackData = 1,
    Progress = 2,
    Error = 3,
    Ack = 0x41,
}

impl SideBandChannel {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(SideBandChannel::PackData),
            2 => Some(SideBandChannel::Progress),
            3 => Some(SideBandChannel::Error),
            0x41 => Some(SideBandChannel::Ack),
            _ => None,
        }
    }
}

/// Demultiplexes the side-band-64k channel byte prefixed on every data
/// pkt-line of a `fetch` response, streaming channel-1 (pack) bytes to a
/// sink in `buffer_size`-sized chunks.
pub struct SideBandDemux<'a, W> {
    sink: &'a mut W,
    buffer_size: usize,
    pending: Vec<u8>,
    pub bytes_written: u64,
}

impl<'a, W: AsyncWrite + Unpin> SideBandDemux<'a, W> {
    pub fn new(sink: &'a mut W) -> Self {
        SideBandDemux {
            sink,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pending: Vec::new(),
            bytes_written: 0,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Consumes frames from `reader` until the connection closes, writing
    /// channel-1 bytes to the sink. Returns once a clean EOF is observed.
    pub async fn run<R: AsyncRead + Unpin>(mut self, reader: &mut R) -> Result<u64, CoreError> {
        while let Some(frame) = decode_one(reader).await? {
            match frame {
                PktLine::Flush | PktLine::Delim => continue,
                PktLine::Data(data) => self.handle_frame(&data).await?,
            }
        }
        self.flush_pending().await?;
        Ok(self.bytes_written)
    }

    async fn handle_frame(&mut self, data: &[u8]) -> Result<(), CoreError> {
        let Some((&channel_byte, body)) = data.split_first() else {
            return Ok(());
        };
        match SideBandChannel::from_u8(channel_byte) {
            Some(SideBandChannel::PackData) => {
                self.pending.extend_from_slice(body);
                if self.pending.len() >= self.buffer_size {
                    self.flush_pending().await?;
                }
            }
            Some(SideBandChannel::Progress) => {}
            Some(SideBandChannel::Error) => {
                let message = String::from_utf8_lossy(body).into_owned();
                return Err(CoreError::RemoteError(message));
            }
            Some(SideBandChannel::Ack) => {}
            None => {
                tracing::warn!(channel = channel_byte, "unknown side-band channel, skipping frame");
            }
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<(), CoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.sink
            .write_all(&self.pending)
            .await
            .map_err(|e| CoreError::TransportClosed(e.to_string()))?;
        self.bytes_written += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }
}
