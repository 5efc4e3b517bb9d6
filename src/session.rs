//! Session handshake and lifecycle.
//!
//! A session opens with a version exchange followed by one RPC definition
//! per declared binding, each acknowledged individually by the peer. A
//! rejected definition fails the whole session. After the handshake the
//! stream carries only INVOKE frames and their replies.

use crate::codec::Wire;
use crate::error::{ExprwireError, Result};
use crate::protocol::{
    read_len_string, write_len_bytes, write_len_str, CMD_DEFEXPR, PROTOCOL_VERSION, STATUS_FAIL,
};
use crate::transport::{recv_all, send_all, Endpoint, NetStream};

/// A client-declared binding of an expression to a numeric id and a pair
/// of type encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcDef {
    /// Non-zero id, unique within the session.
    pub id: u32,
    /// Expression evaluated by the remote process.
    pub expr: String,
    /// Canonical encoding of the record of positional argument types.
    pub input_type: Vec<u8>,
    /// Canonical encoding of the result type, or `unit` when void.
    pub output_type: Vec<u8>,
}

impl RpcDef {
    /// Build a definition from raw type encodings.
    pub fn new(id: u32, expr: impl Into<String>, input_type: Vec<u8>, output_type: Vec<u8>) -> Self {
        Self {
            id,
            expr: expr.into(),
            input_type,
            output_type,
        }
    }

    /// Build a definition from wire types: `A` is the argument tuple, `R`
    /// the result (`()` for void RPCs).
    pub fn define<A: Wire, R: Wire>(id: u32, expr: impl Into<String>) -> Self {
        Self::new(
            id,
            expr,
            A::descriptor().encode(),
            R::descriptor().encode(),
        )
    }
}

/// Perform the client-side handshake on a freshly connected stream.
///
/// Sends the version constant, then every definition in order; each is
/// acknowledged with a status byte. A `FAIL` status carries a
/// length-prefixed message and fails the session with
/// [`ExprwireError::HandshakeRejected`].
pub fn init_session(stream: &mut NetStream, defs: &[RpcDef]) -> Result<()> {
    send_all(stream, &PROTOCOL_VERSION.to_ne_bytes())?;

    for def in defs {
        send_all(stream, &[CMD_DEFEXPR])?;
        send_all(stream, &def.id.to_ne_bytes())?;
        write_len_str(stream, &def.expr)?;
        write_len_bytes(stream, &def.input_type)?;
        write_len_bytes(stream, &def.output_type)?;

        let mut status = [STATUS_FAIL];
        recv_all(stream, &mut status)?;
        if status[0] == STATUS_FAIL {
            let msg = read_len_string(stream)?;
            return Err(ExprwireError::HandshakeRejected {
                id: def.id,
                expr: def.expr.clone(),
                msg,
            });
        }
        tracing::debug!(id = def.id, expr = %def.expr, "definition accepted");
    }
    Ok(())
}

/// A connected stream plus the definitions the peer accepted.
///
/// Sessions are single-owner: one thread performs all writes, reads, and
/// scheduler steps. Dropping the session closes the socket.
#[derive(Debug)]
pub struct Session {
    stream: NetStream,
    endpoint: Option<Endpoint>,
    defs: Vec<RpcDef>,
}

impl Session {
    /// Connect to an endpoint and run the handshake.
    pub fn open(endpoint: Endpoint, defs: Vec<RpcDef>) -> Result<Session> {
        let mut stream = endpoint.connect()?;
        init_session(&mut stream, &defs)?;
        Ok(Session {
            stream,
            endpoint: Some(endpoint),
            defs,
        })
    }

    /// Run the handshake on an already connected stream.
    pub fn from_stream(mut stream: NetStream, defs: Vec<RpcDef>) -> Result<Session> {
        init_session(&mut stream, &defs)?;
        Ok(Session {
            stream,
            endpoint: None,
            defs,
        })
    }

    /// The underlying stream.
    pub fn stream_mut(&mut self) -> &mut NetStream {
        &mut self.stream
    }

    /// The accepted definitions, in declaration order.
    pub fn defs(&self) -> &[RpcDef] {
        &self.defs
    }

    /// Close the current socket (ignoring close errors) and repeat the
    /// handshake against the same endpoint with the same definitions.
    pub fn reconnect(&mut self) -> Result<()> {
        let endpoint = self.endpoint.clone().ok_or_else(|| {
            ExprwireError::Protocol("session was built from a raw stream; reconnect needs an endpoint".to_string())
        })?;
        self.reconnect_to(endpoint)
    }

    /// Close the current socket and re-run the handshake against a new
    /// endpoint, keeping the same definitions.
    pub fn reconnect_to(&mut self, endpoint: Endpoint) -> Result<()> {
        let mut stream = endpoint.connect()?;
        init_session(&mut stream, &self.defs)?;
        // The old socket closes when the previous stream drops.
        self.stream = stream;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Read the reply to the oldest outstanding request, blocking.
    pub(crate) fn read_reply<R: Wire + Default>(&mut self) -> Result<R> {
        let mut out = R::default();
        R::read(&mut self.stream, &mut out)?;
        Ok(out)
    }
}
