//! Transport module - stream sockets and byte-level I/O.
//!
//! This module owns the connection to the remote peer:
//! - [`NetStream`] - a connected TCP or Unix-domain stream socket
//! - [`Endpoint`] - a reconnectable address (host:port or socket path)
//! - byte-level helpers: [`send_all`], [`recv_all`], [`recv_partial`]

mod socket;

pub use socket::{
    connect, connect_hostport, recv_all, recv_partial, send_all, Endpoint, NetStream,
};
#[cfg(unix)]
pub use socket::connect_unix;
