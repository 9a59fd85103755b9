//! The single reader thread's per-message routing. One thread owns the
//! socket's read half and calls [`dispatch_message`] for every frame it
//! decodes until the connection closes or a framing error ends the loop.

use crate::adb::const_::{CLSE, OKAY, WRTE};
use crate::adb::message::{recv_message, send_message, Message};
use crate::adb::stream::{StreamState, StreamTable};
use crate::error::CoreError;
use std::io::{Read, Write};
use std::sync::Mutex;
use tracing::warn;

/// Applies one received message to the stream it targets (`arg1`, the
/// local stream id). Unknown or stream-less OKAY/WRTE/CLSE frames are
/// logged and dropped rather than treated as fatal — a slow peer can send
/// a CLSE for a stream this side already released.
pub fn dispatch_message<W: Write>(
    streams: &StreamTable,
    writer: &Mutex<W>,
    message: &Message,
) -> Result<(), CoreError> {
    let local_id = message.arg1;
    let remote_id = message.arg0;

    if message.command == OKAY {
        let Some(stream) = streams.get(local_id) else {
            warn!(local_id, "OKAY for unknown stream");
            return Ok(());
        };
        let was_opening = *stream.state.lock().unwrap() == StreamState::Opening;
        if was_opening {
            stream.signal_open(remote_id);
        } else {
            stream.signal_okay();
        }
        return Ok(());
    }

    if message.command == WRTE {
        let Some(stream) = streams.get(local_id) else {
            warn!(local_id, "WRTE for unknown stream");
            return Ok(());
        };
        stream.push_data(message.data.clone());
        let ack = Message::new(OKAY, local_id, remote_id, bytes::Bytes::new());
        send_message(&mut *writer.lock().unwrap(), &ack)?;
        return Ok(());
    }

    if message.command == CLSE {
        if let Some(stream) = streams.get(local_id) {
            stream.signal_closed();
        }
        streams.release(local_id);
        return Ok(());
    }

    warn!(command = ?message.command, "ignoring message not relevant to stream dispatch");
    Ok(())
}

/// Runs the dispatch loop until the reader hits a transport-level error,
/// which is returned to the caller so the connection can tear itself down.
pub fn run_dispatch_loop<R: Read, W: Write>(
    reader: &mut R,
    streams: &StreamTable,
    writer: &Mutex<W>,
) -> CoreError {
    let _span = tracing::info_span!("adb_dispatcher").entered();
    loop {
        match recv_message(reader) {
            Ok(message) => {
                if let Err(e) = dispatch_message(streams, writer, &message) {
                    return e;
                }
            }
            Err(e) => return e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::const_::CNXN;
    use bytes::Bytes;

    #[test]
    fn okay_while_opening_transitions_to_opened_and_records_remote_id() {
        let streams = StreamTable::new();
        let stream = streams.allocate();
        let writer = Mutex::new(Vec::new());

        let okay = Message::new(OKAY, 42, stream.local_id, Bytes::new());
        dispatch_message(&streams, &writer, &okay).unwrap();

        assert_eq!(*stream.state.lock().unwrap(), StreamState::Opened);
        assert_eq!(*stream.remote_id.lock().unwrap(), 42);
    }

    #[test]
    fn wrte_while_opened_buffers_data_and_echoes_okay() {
        let streams = StreamTable::new();
        let stream = streams.allocate();
        stream.signal_open(42);
        let writer = Mutex::new(Vec::new());

        let wrte = Message::new(WRTE, 42, stream.local_id, Bytes::from_static(b"payload"));
        dispatch_message(&streams, &writer, &wrte).unwrap();

        let received = stream.wait_for_data(std::time::Duration::from_millis(10)).unwrap();
        assert_eq!(&received[..], b"payload");
        let echoed = writer.lock().unwrap().clone();
        assert_eq!(&echoed[0..4], &u32::from_le_bytes(OKAY).to_le_bytes());
    }

    #[test]
    fn clse_releases_the_stream_regardless_of_state() {
        let streams = StreamTable::new();
        let stream = streams.allocate();
        let writer = Mutex::new(Vec::new());

        let clse = Message::new(CLSE, 0, stream.local_id, Bytes::new());
        dispatch_message(&streams, &writer, &clse).unwrap();

        assert!(streams.get(stream.local_id).is_none());
    }

    #[test]
    fn unrelated_command_is_ignored_not_fatal() {
        let streams = StreamTable::new();
        let writer = Mutex::new(Vec::new());
        let cnxn = Message::new(CNXN, 0, 0, Bytes::new());
        assert!(dispatch_message(&streams, &writer, &cnxn).is_ok());
    }
}
