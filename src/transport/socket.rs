//! Stream sockets and byte-level I/O.
//!
//! A [`NetStream`] is a connected stream socket, either TCP or (on Unix)
//! Unix-domain. Reads and writes go through the free functions below, which
//! implement the exact-length and partial-read disciplines the protocol
//! relies on:
//!
//! - [`send_all`] - write exactly `n` bytes, looping across short writes
//! - [`recv_all`] - read exactly `n` bytes, blocking, retrying `EINTR`
//! - [`recv_partial`] - read up to `n` bytes without blocking; `0` means
//!   "no bytes currently available"
//!
//! The helpers are generic over [`Read`]/[`Write`] so unit tests can drive
//! them against in-memory streams; sessions always use a `NetStream`.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::PathBuf;

use crate::error::{ExprwireError, Result};

/// A connected stream socket.
///
/// The session owns the stream; all reads, writes, and blocking-mode
/// toggles happen on the owning thread.
#[derive(Debug)]
pub enum NetStream {
    /// TCP stream socket.
    Tcp(TcpStream),
    /// Unix-domain stream socket.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl NetStream {
    /// Toggle the socket's blocking status.
    ///
    /// Writes are performed in blocking mode so a request frame reaches the
    /// kernel buffer in one piece; reads are performed in non-blocking mode
    /// so the scheduler never stalls.
    pub fn set_blocking(&self, block: bool) -> Result<()> {
        match self {
            NetStream::Tcp(s) => s.set_nonblocking(!block)?,
            #[cfg(unix)]
            NetStream::Unix(s) => s.set_nonblocking(!block)?,
        }
        Ok(())
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            NetStream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            NetStream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            NetStream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            NetStream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            NetStream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            NetStream::Unix(s) => s.flush(),
        }
    }
}

/// A reconnectable peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP endpoint, resolved through the platform resolver at connect time.
    Tcp {
        /// Hostname or address literal.
        host: String,
        /// Service port.
        port: u16,
    },
    /// Unix-domain socket path.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// TCP endpoint from host and port.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` string.
    ///
    /// The split is at the last `:` so IPv6 address literals with a
    /// bracketed host part parse as expected.
    pub fn parse(hostport: &str) -> Result<Self> {
        let (host, port) = hostport
            .rsplit_once(':')
            .ok_or_else(|| {
                ExprwireError::Protocol(format!("failed to determine port: {hostport}"))
            })?;
        let port = port.parse::<u16>().map_err(|_| {
            ExprwireError::Protocol(format!("failed to determine port: {hostport}"))
        })?;
        Ok(Endpoint::tcp(host, port))
    }

    /// Unix-domain endpoint from a socket path.
    #[cfg(unix)]
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    /// Open a blocking stream connection to this endpoint.
    pub fn connect(&self) -> Result<NetStream> {
        match self {
            Endpoint::Tcp { host, port } => connect(host, *port),
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                Ok(NetStream::Unix(stream))
            }
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Connect to `host:port`, trying every resolved address in order.
pub fn connect(host: &str, port: u16) -> Result<NetStream> {
    let target = format!("{host}:{port}");

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ExprwireError::AddressResolution {
            target: target.clone(),
            source,
        })?;

    let mut last_err: Option<std::io::Error> = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                tracing::debug!(%target, %addr, "connected");
                return Ok(NetStream::Tcp(stream));
            }
            Err(e) => {
                tracing::warn!(%target, %addr, error = %e, "connection attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(ExprwireError::ConnectFailed {
        target,
        source: last_err
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses resolved")),
    })
}

/// Connect to a `host:port` string.
pub fn connect_hostport(hostport: &str) -> Result<NetStream> {
    Endpoint::parse(hostport)?.connect()
}

/// Connect to a Unix-domain stream socket.
#[cfg(unix)]
pub fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<NetStream> {
    Ok(NetStream::Unix(UnixStream::connect(path)?))
}

/// Write exactly `buf.len()` bytes, looping across short writes.
pub fn send_all<W: Write>(w: &mut W, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        let n = w.write(&buf[written..])?;
        if n == 0 {
            return Err(ExprwireError::Io(std::io::Error::new(
                ErrorKind::WriteZero,
                "socket accepted no bytes",
            )));
        }
        written += n;
    }
    Ok(())
}

/// Read exactly `buf.len()` bytes, blocking until all arrive.
///
/// Interrupted reads are retried transparently. An orderly remote close
/// before the buffer fills is a [`ExprwireError::PeerClosed`].
pub fn recv_all<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Err(ExprwireError::PeerClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExprwireError::Io(e)),
        }
    }
    Ok(())
}

/// Read up to `buf.len()` bytes without blocking.
///
/// Returns the number of bytes read; `0` means the socket is temporarily
/// unavailable (`EAGAIN`/`EWOULDBLOCK`) or the read was interrupted. An
/// orderly remote close is a [`ExprwireError::PeerClosed`].
pub fn recv_partial<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    match r.read(buf) {
        Ok(0) => Err(ExprwireError::PeerClosed),
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(ExprwireError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn tcp_pair() -> (NetStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (NetStream::Tcp(client), server)
    }

    #[test]
    fn test_parse_hostport() {
        let ep = Endpoint::parse("localhost:8080").unwrap();
        assert_eq!(ep, Endpoint::tcp("localhost", 8080));
    }

    #[test]
    fn test_parse_hostport_without_port_fails() {
        assert!(Endpoint::parse("localhost").is_err());
        assert!(Endpoint::parse("localhost:notaport").is_err());
    }

    #[test]
    fn test_parse_hostport_splits_at_last_colon() {
        let ep = Endpoint::parse("::1:9000").unwrap();
        assert_eq!(ep, Endpoint::tcp("::1", 9000));
    }

    #[test]
    fn test_send_all_recv_all_roundtrip() {
        let (mut client, mut server) = tcp_pair();

        send_all(&mut client, b"exact bytes").unwrap();

        let mut buf = [0u8; 11];
        recv_all(&mut server, &mut buf).unwrap();
        assert_eq!(&buf, b"exact bytes");
    }

    #[test]
    fn test_recv_all_reports_peer_close() {
        let (mut client, server) = tcp_pair();
        drop(server);

        let mut buf = [0u8; 4];
        match recv_all(&mut client, &mut buf) {
            Err(ExprwireError::PeerClosed) => {}
            other => panic!("expected PeerClosed, got {other:?}"),
        }
    }

    #[test]
    fn test_recv_partial_returns_zero_when_no_data() {
        let (client, _server) = tcp_pair();
        client.set_blocking(false).unwrap();

        let mut client = client;
        let mut buf = [0u8; 16];
        assert_eq!(recv_partial(&mut client, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_recv_partial_reads_available_bytes() {
        let (client, mut server) = tcp_pair();
        server.write_all(b"abc").unwrap();

        client.set_blocking(false).unwrap();
        let mut client = client;
        let mut buf = [0u8; 16];

        // The bytes may not be visible instantly on loopback.
        let mut got = 0;
        while got == 0 {
            got = recv_partial(&mut client, &mut buf).unwrap();
        }
        assert_eq!(&buf[..got], &b"abc"[..got]);
    }

    #[test]
    fn test_recv_partial_reports_peer_close() {
        let (client, server) = tcp_pair();
        drop(server);
        client.set_blocking(false).unwrap();

        let mut client = client;
        let mut buf = [0u8; 4];
        loop {
            match recv_partial(&mut client, &mut buf) {
                Ok(0) => continue, // close not yet visible
                Err(ExprwireError::PeerClosed) => break,
                other => panic!("expected PeerClosed, got {other:?}"),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_stream_roundtrip() {
        let (a, mut b) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut a = NetStream::Unix(a);

        send_all(&mut a, b"over unix").unwrap();
        let mut buf = [0u8; 9];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"over unix");
    }
}
