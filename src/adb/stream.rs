//! Local stream bookkeeping: id allocation and the two-latch open/data
//! handshake per stream. Ids are drawn from a pool seeded `1..=8` and grown
//! by 8 on exhaustion; each stream's open and data waits are built on a
//! `Mutex` + `Condvar` pair since every stream is driven from its own OS
//! thread rather than a single-threaded event loop.

use crate::error::CoreError;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opening,
    Opened,
    Closing,
    Closed,
}

/// A single binary latch: starts either set or unset, `wait` blocks until
/// someone calls `signal`. Mirrors `asyncio.Lock` used purely as an
/// event — acquired means "not yet fired", released means "fired".
struct Latch {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl Latch {
    fn new(initially_fired: bool) -> Self {
        Latch { fired: Mutex::new(initially_fired), condvar: Condvar::new() }
    }

    fn signal(&self) {
        let mut fired = self.fired.lock().unwrap();
        *fired = true;
        self.condvar.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let fired = self.fired.lock().unwrap();
        if *fired {
            return true;
        }
        let (guard, result) = self.condvar.wait_timeout(fired, timeout).unwrap();
        let _ = guard;
        !result.timed_out()
    }

    fn reset(&self) {
        *self.fired.lock().unwrap() = false;
    }
}

/// One open (or opening/closing) logical stream multiplexed over the
/// connection. `remote_id` is learned from the peer's OKAY and is 0 until
/// then. `send_event` starts fired-as-"locked" the moment `OPEN` is sent,
/// since the service name rides on the opening write itself, not a
/// separate OKAY — mirroring the Python comment "service is sent on stream
/// opening".
pub struct Stream {
    pub local_id: u32,
    pub remote_id: Mutex<u32>,
    pub state: Mutex<StreamState>,
    send_latch: Latch,
    recv_latch: Latch,
    inbox: Mutex<VecDeque<Bytes>>,
}

impl Stream {
    fn new(local_id: u32) -> Self {
        Stream {
            local_id,
            remote_id: Mutex::new(0),
            state: Mutex::new(StreamState::Opening),
            send_latch: Latch::new(true),
            recv_latch: Latch::new(false),
            inbox: Mutex::new(VecDeque::new()),
        }
    }

    pub fn wait_for_okay(&self, timeout: Duration) -> Result<(), CoreError> {
        self.send_latch.reset();
        if self.send_latch.wait(timeout) {
            Ok(())
        } else {
            Err(CoreError::StreamTimeout(self.local_id))
        }
    }

    pub fn wait_for_data(&self, timeout: Duration) -> Result<Bytes, CoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(chunk) = self.inbox.lock().unwrap().pop_front() {
                return Ok(chunk);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.recv_latch.wait(remaining) {
                return Err(CoreError::StreamTimeout(self.local_id));
            }
            self.recv_latch.reset();
        }
    }

    pub(crate) fn push_data(&self, data: Bytes) {
        self.inbox.lock().unwrap().push_back(data);
        self.recv_latch.signal();
    }

    pub(crate) fn signal_open(&self, remote_id: u32) {
        *self.remote_id.lock().unwrap() = remote_id;
        *self.state.lock().unwrap() = StreamState::Opened;
        self.send_latch.signal();
    }

    pub(crate) fn signal_okay(&self) {
        self.send_latch.signal();
    }

    pub(crate) fn signal_closed(&self) {
        *self.state.lock().unwrap() = StreamState::Closed;
        self.send_latch.signal();
        self.recv_latch.signal();
    }
}

/// Allocates local stream ids from a growable pool, starting with
/// `1..=8` and extending by 8 more each time the pool is exhausted — the
/// same growth shape as the Python original's `set(range(1, 9))` plus
/// `pool.update(range(next, next + 8))`.
pub struct StreamTable {
    inner: Mutex<StreamTableInner>,
}

struct StreamTableInner {
    free_ids: Vec<u32>,
    next_block_start: u32,
    streams: HashMap<u32, std::sync::Arc<Stream>>,
}

impl StreamTable {
    pub fn new() -> Self {
        StreamTable {
            inner: Mutex::new(StreamTableInner {
                free_ids: (1..=8).rev().collect(),
                next_block_start: 9,
                streams: HashMap::new(),
            }),
        }
    }

    pub fn allocate(&self) -> std::sync::Arc<Stream> {
        let mut inner = self.inner.lock().unwrap();
        if inner.free_ids.is_empty() {
            let start = inner.next_block_start;
            inner.free_ids.extend((start..start + 8).rev());
            inner.next_block_start = start + 8;
        }
        let id = inner.free_ids.pop().unwrap();
        let stream = std::sync::Arc::new(Stream::new(id));
        inner.streams.insert(id, stream.clone());
        stream
    }

    pub fn get(&self, local_id: u32) -> Option<std::sync::Arc<Stream>> {
        self.inner.lock().unwrap().streams.get(&local_id).cloned()
    }

    pub fn release(&self, local_id: u32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.streams.remove(&local_id).is_some() {
            inner.free_ids.push(local_id);
        }
    }

    pub fn close_all(&self) {
        let inner = self.inner.lock().unwrap();
        for stream in inner.streams.values() {
            stream.signal_closed();
        }
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_ids_starting_at_one() {
        let table = StreamTable::new();
        let a = table.allocate();
        let b = table.allocate();
        assert_eq!(a.local_id, 1);
        assert_eq!(b.local_id, 2);
    }

    #[test]
    fn grows_the_pool_by_eight_on_exhaustion() {
        let table = StreamTable::new();
        let ids: Vec<u32> = (0..9).map(|_| table.allocate().local_id).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn released_ids_are_reused() {
        let table = StreamTable::new();
        let first = table.allocate();
        table.release(first.local_id);
        let second = table.allocate();
        assert_eq!(second.local_id, first.local_id);
    }

    #[test]
    fn wait_for_data_returns_pushed_chunks_in_order() {
        let table = StreamTable::new();
        let stream = table.allocate();
        stream.push_data(Bytes::from_static(b"one"));
        stream.push_data(Bytes::from_static(b"two"));
        assert_eq!(stream.wait_for_data(Duration::from_millis(10)).unwrap(), Bytes::from_static(b"one"));
        assert_eq!(stream.wait_for_data(Duration::from_millis(10)).unwrap(), Bytes::from_static(b"two"));
    }

    #[test]
    fn wait_for_data_times_out_with_nothing_pending() {
        let table = StreamTable::new();
        let stream = table.allocate();
        assert!(matches!(
            stream.wait_for_data(Duration::from_millis(5)),
            Err(CoreError::StreamTimeout(_))
        ));
    }
}
