//! Connection lifecycle: the CNXN handshake, the single background
//! dispatcher thread, and the stream open/write/close operations a caller
//! drives from any number of other threads.

use crate::adb::const_::{ADB_MAX_PAYLOAD, ADB_VERSION, CLIENT_FEATURES, CLSE, CNXN, OPEN, WRTE};
use crate::adb::device_features::DeviceFeatures;
use crate::adb::dispatcher::run_dispatch_loop;
use crate::adb::message::{recv_message, send_message, Message};
use crate::adb::stream::{Stream, StreamState, StreamTable};
use crate::error::CoreError;
use bytes::Bytes;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Caller-supplied dial parameters. No global config singleton — every
/// field the connection needs travels in through here.
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectOptions {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

pub struct Connection {
    writer: Arc<Mutex<TcpStream>>,
    streams: Arc<StreamTable>,
    dispatcher: Option<JoinHandle<CoreError>>,
    pub device_features: DeviceFeatures,
    /// `min(peer's advertised arg1, ADB_MAX_PAYLOAD)`, negotiated during
    /// the CNXN handshake; used to size `WRTE` chunks.
    pub max_payload: u32,
    open_timeout: Duration,
    write_timeout: Duration,
}

impl Connection {
    /// Dials `options.host:options.port` with `connect_timeout`, sets
    /// `io_timeout` as the socket's read/write deadline, then proceeds as
    /// [`Connection::connect`].
    pub fn connect_with_options(options: &ConnectOptions) -> Result<Connection, CoreError> {
        let addr = (options.host.as_str(), options.port)
            .to_socket_addrs()
            .map_err(CoreError::from)?
            .next()
            .ok_or_else(|| CoreError::TransportClosed(format!("cannot resolve {}:{}", options.host, options.port)))?;
        let socket = TcpStream::connect_timeout(&addr, options.connect_timeout).map_err(CoreError::from)?;
        socket.set_read_timeout(Some(options.io_timeout)).map_err(CoreError::from)?;
        socket.set_write_timeout(Some(options.io_timeout)).map_err(CoreError::from)?;
        Self::handshake(socket)
    }

    /// Dials `addr` with the platform default timeouts, performs the CNXN
    /// handshake, and starts the dispatcher thread. AUTH challenges are not
    /// handled — a device that requires RSA key auth is reported as a
    /// `FramingInvalid` rather than silently hanging, since this core only
    /// targets already-authorized (`adb keys` trusted) devices.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Connection, CoreError> {
        let socket = TcpStream::connect(addr).map_err(CoreError::from)?;
        Self::handshake(socket)
    }

    fn handshake(socket: TcpStream) -> Result<Connection, CoreError> {
        let mut reader = socket.try_clone().map_err(CoreError::from)?;
        let writer = Arc::new(Mutex::new(socket));

        let hello = Message::new(CNXN, ADB_VERSION, ADB_MAX_PAYLOAD, Bytes::from_static(CLIENT_FEATURES.as_bytes()));
        send_message(&mut *writer.lock().unwrap(), &hello)?;

        let reply = recv_message(&mut reader)?;
        if reply.command != CNXN {
            return Err(CoreError::FramingInvalid(format!(
                "expected CNXN reply, device requested {:?} (likely AUTH, unsupported)",
                reply.command
            )));
        }
        let banner = String::from_utf8_lossy(&reply.data);
        let device_features = DeviceFeatures::from_cnxn(&banner);
        let max_payload = reply.arg1.min(ADB_MAX_PAYLOAD);

        let streams = Arc::new(StreamTable::new());
        let dispatch_streams = streams.clone();
        let dispatch_writer = writer.clone();
        let handle = std::thread::spawn(move || run_dispatch_loop(&mut reader, &dispatch_streams, &dispatch_writer));

        Ok(Connection {
            writer,
            streams,
            dispatcher: Some(handle),
            device_features,
            max_payload,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Opens one logical stream for `service` (e.g. `"shell,v2:ls"`). The
    /// service string rides on the `OPEN` frame itself; the local stream's
    /// send latch starts "fired" (see `Stream::new`) and is reset the
    /// moment we need to wait for the peer's OKAY here.
    pub fn open_stream(&self, service: &str) -> Result<Arc<Stream>, CoreError> {
        let stream = self.streams.allocate();
        let mut data = Vec::with_capacity(service.len() + 1);
        data.extend_from_slice(service.as_bytes());
        data.push(0);

        let open = Message::new(OPEN, stream.local_id, 0, Bytes::from(data));
        send_message(&mut *self.writer.lock().unwrap(), &open)?;

        stream.wait_for_okay(self.open_timeout)?;
        if *stream.state.lock().unwrap() != StreamState::Opened {
            self.streams.release(stream.local_id);
            return Err(CoreError::StreamClosed(stream.local_id));
        }
        Ok(stream)
    }

    /// Writes `data` to an already-open stream in `ADB_MAX_PAYLOAD`-sized
    /// chunks, waiting for the peer's OKAY between chunks for flow control.
    pub fn send_to_stream(&self, stream: &Stream, data: &[u8]) -> Result<(), CoreError> {
        let remote_id = *stream.remote_id.lock().unwrap();
        for chunk in data.chunks(self.max_payload as usize) {
            let message = Message::new(WRTE, stream.local_id, remote_id, Bytes::copy_from_slice(chunk));
            send_message(&mut *self.writer.lock().unwrap(), &message)?;
            stream.wait_for_okay(self.write_timeout)?;
        }
        Ok(())
    }

    pub fn close_stream(&self, stream: &Stream) -> Result<(), CoreError> {
        let remote_id = *stream.remote_id.lock().unwrap();
        let message = Message::new(CLSE, stream.local_id, remote_id, Bytes::new());
        send_message(&mut *self.writer.lock().unwrap(), &message)?;
        stream.signal_closed();
        self.streams.release(stream.local_id);
        Ok(())
    }

    /// Tears down every open stream, shuts down the socket, and gives the
    /// dispatcher thread up to 2s to observe the resulting read error and
    /// exit before giving up on joining it.
    pub fn disconnect(&mut self) {
        self.streams.close_all();
        let _ = self.writer.lock().unwrap().shutdown(std::net::Shutdown::Both);

        if let Some(handle) = self.dispatcher.take() {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(handle.join());
            });
            let _ = rx.recv_timeout(Duration::from_secs(2));
        }
    }

    /// Returns the dispatcher thread's exit error, if it has already
    /// terminated and the handle hasn't been consumed yet.
    pub fn dispatcher_handle(&mut self) -> Option<JoinHandle<CoreError>> {
        self.dispatcher.take()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
