//! Pluggable transport for emitted datagrams.
//!
//! Keeps a trait seam for substitutability in tests, but no
//! reconnect-on-failure state machine: a connected UDP socket's `send` does
//! not require reconnection the way a stream transport would.

use std::io;
use std::net::{ToSocketAddrs, UdpSocket};

/// A sink for formatted UDP push-exporter messages.
///
/// One message is sent per call; the exporter guarantees a single task
/// ever calls `send` concurrently, so implementations need not be
/// internally synchronized for concurrent senders, only for
/// reentrancy-free sequential use.
pub trait PushBackend: Send {
    /// Sends one line-oriented message.
    fn send(&self, msg: &str) -> io::Result<()>;
}

/// The default backend: a UDP socket connected to a fixed remote address.
pub struct UdpBackend {
    socket: UdpSocket,
}

impl UdpBackend {
    /// Binds an ephemeral local UDP socket and connects it to `addr`.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(addr)?;
        Ok(Self { socket })
    }
}

impl PushBackend for UdpBackend {
    fn send(&self, msg: &str) -> io::Result<()> {
        self.socket.send(msg.as_bytes()).map(|_| ())
    }
}
