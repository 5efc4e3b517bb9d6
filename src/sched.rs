//! Asynchronous client and FIFO reply scheduler.
//!
//! Each outbound call writes its INVOKE frame synchronously (under a
//! momentary blocking toggle so the frame reaches the kernel buffer in one
//! piece), registers a continuation with the RPC's pending reader, and
//! returns. [`AsyncClient::step`] then drains whatever reply bytes are
//! currently available and fires completed continuations strictly in
//! request order.
//!
//! Replies arrive in the exact order requests were sent on the socket, so
//! the scheduler enforces head-of-line processing: no later reply is
//! observed until the current one has completed. A reader is enqueued once
//! per outstanding call it owns and duplicates are never coalesced.
//!
//! There is no cancellation primitive and no timeout: abandoning pending
//! work means dropping (or reconnecting) the client, which closes the
//! socket and clears both the scheduler queue and every continuation queue.

use std::any::Any;
use std::collections::{HashMap, VecDeque};

use crate::codec::Wire;
use crate::error::{ExprwireError, Result};
use crate::protocol::CMD_INVOKE;
use crate::session::{RpcDef, Session};
use crate::transport::{Endpoint, NetStream};

/// A pending reader that can be driven against a non-blocking socket.
trait AsyncReader {
    /// Make whatever progress the socket permits; on completion dispatch
    /// the head continuation and re-prepare for the next reply.
    fn read_and_finish(&mut self, stream: &mut NetStream) -> Result<bool>;

    /// Drop queued continuations and reset the read state.
    fn reset(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Reader for one RPC's replies: a result slot, the incremental read
/// state, and a FIFO queue of continuations (one per outstanding call).
struct PendingCall<R: Wire + Default> {
    out: R,
    state: R::ReadState,
    conts: VecDeque<Box<dyn FnOnce(R)>>,
}

impl<R: Wire + Default> PendingCall<R> {
    fn new() -> Self {
        let mut state = R::ReadState::default();
        R::prepare(&mut state);
        Self {
            out: R::default(),
            state,
            conts: VecDeque::new(),
        }
    }
}

impl<R: Wire + Default + 'static> AsyncReader for PendingCall<R> {
    fn read_and_finish(&mut self, stream: &mut NetStream) -> Result<bool> {
        if R::accum(stream, &mut self.state, &mut self.out)? {
            let k = self.conts.pop_front().ok_or_else(|| {
                ExprwireError::Protocol("reply with no outstanding continuation".to_string())
            })?;
            let value = std::mem::take(&mut self.out);
            self.state = R::ReadState::default();
            R::prepare(&mut self.state);
            k(value);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn reset(&mut self) {
        self.conts.clear();
        self.out = R::default();
        self.state = R::ReadState::default();
        R::prepare(&mut self.state);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One RPC declaration for an [`AsyncClient`]: the wire definition plus,
/// for non-void RPCs, the pending reader that will own its replies.
pub struct AsyncDef {
    def: RpcDef,
    reader: Option<Box<dyn AsyncReader>>,
}

impl AsyncDef {
    /// A definition whose replies are delivered to continuations.
    pub fn returning<A: Wire, R: Wire + Default + 'static>(
        id: u32,
        expr: impl Into<String>,
    ) -> AsyncDef {
        AsyncDef {
            def: RpcDef::define::<A, R>(id, expr),
            reader: Some(Box::new(PendingCall::<R>::new())),
        }
    }

    /// A void definition: the frame is written, no reader is registered.
    pub fn void<A: Wire>(id: u32, expr: impl Into<String>) -> AsyncDef {
        AsyncDef {
            def: RpcDef::define::<A, ()>(id, expr),
            reader: None,
        }
    }
}

impl std::fmt::Debug for AsyncDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDef")
            .field("def", &self.def)
            .field("void", &self.reader.is_none())
            .finish()
    }
}

/// A pipelined, FIFO-ordered RPC client over one non-blocking session.
pub struct AsyncClient {
    session: Session,
    readers: HashMap<u32, Box<dyn AsyncReader>>,
    queue: VecDeque<u32>,
}

impl AsyncClient {
    /// Connect to an endpoint, run the handshake, and leave the socket in
    /// non-blocking mode.
    pub fn connect(endpoint: Endpoint, defs: Vec<AsyncDef>) -> Result<AsyncClient> {
        let (rpc_defs, readers) = Self::split_defs(defs);
        let session = Session::open(endpoint, rpc_defs)?;
        Self::finish(session, readers)
    }

    /// Run the handshake on an already connected stream.
    pub fn from_stream(stream: NetStream, defs: Vec<AsyncDef>) -> Result<AsyncClient> {
        let (rpc_defs, readers) = Self::split_defs(defs);
        let session = Session::from_stream(stream, rpc_defs)?;
        Self::finish(session, readers)
    }

    fn split_defs(defs: Vec<AsyncDef>) -> (Vec<RpcDef>, HashMap<u32, Box<dyn AsyncReader>>) {
        let mut rpc_defs = Vec::with_capacity(defs.len());
        let mut readers = HashMap::new();
        for d in defs {
            if let Some(reader) = d.reader {
                readers.insert(d.def.id, reader);
            }
            rpc_defs.push(d.def);
        }
        (rpc_defs, readers)
    }

    fn finish(
        session: Session,
        readers: HashMap<u32, Box<dyn AsyncReader>>,
    ) -> Result<AsyncClient> {
        let mut client = AsyncClient {
            session,
            readers,
            queue: VecDeque::new(),
        };
        client.session.stream_mut().set_blocking(false)?;
        Ok(client)
    }

    /// Invoke an RPC, registering `k` to receive its reply.
    ///
    /// The INVOKE frame is written under a momentary blocking toggle; the
    /// continuation fires from a later [`step`](Self::step) call once the
    /// whole reply has arrived.
    pub fn invoke<A, R>(&mut self, id: u32, args: &A, k: impl FnOnce(R) + 'static) -> Result<()>
    where
        A: Wire,
        R: Wire + Default + 'static,
    {
        let pending = self
            .readers
            .get_mut(&id)
            .ok_or_else(|| {
                ExprwireError::Protocol(format!("no reader registered for rpc id {id}"))
            })?
            .as_any_mut()
            .downcast_mut::<PendingCall<R>>()
            .ok_or_else(|| {
                ExprwireError::Protocol(format!("mismatched result type for rpc id {id}"))
            })?;

        let stream = self.session.stream_mut();
        stream.set_blocking(true)?;
        <u8 as Wire>::write(stream, &CMD_INVOKE)?;
        <u32 as Wire>::write(stream, &id)?;
        A::write(stream, args)?;
        stream.set_blocking(false)?;

        pending.conts.push_back(Box::new(k));
        self.queue.push_back(id);
        tracing::debug!(id, pending = self.queue.len(), "request enqueued");
        Ok(())
    }

    /// Invoke a void RPC: write the frame under the blocking toggle,
    /// register nothing.
    pub fn invoke_void<A: Wire>(&mut self, id: u32, args: &A) -> Result<()> {
        let stream = self.session.stream_mut();
        stream.set_blocking(true)?;
        <u8 as Wire>::write(stream, &CMD_INVOKE)?;
        <u32 as Wire>::write(stream, &id)?;
        A::write(stream, args)?;
        stream.set_blocking(false)?;
        Ok(())
    }

    /// Drain whatever reply bytes are currently available.
    ///
    /// Completed replies dispatch their continuations in request order;
    /// returns once the head reader can make no further progress.
    pub fn step(&mut self) -> Result<()> {
        while let Some(&id) = self.queue.front() {
            let reader = self.readers.get_mut(&id).ok_or_else(|| {
                ExprwireError::Protocol(format!("no reader registered for rpc id {id}"))
            })?;
            if reader.read_and_finish(self.session.stream_mut())? {
                tracing::debug!(id, "reply dispatched");
                self.queue.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Number of outstanding readers in the scheduler queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The accepted definitions, in declaration order.
    pub fn defs(&self) -> &[RpcDef] {
        self.session.defs()
    }

    /// Abandon all pending work, close the socket, and repeat the
    /// handshake against the original endpoint.
    pub fn reconnect(&mut self) -> Result<()> {
        self.clear_pending();
        self.session.reconnect()?;
        self.session.stream_mut().set_blocking(false)
    }

    /// Abandon all pending work and reconnect to a new endpoint.
    pub fn reconnect_to(&mut self, endpoint: Endpoint) -> Result<()> {
        self.clear_pending();
        self.session.reconnect_to(endpoint)?;
        self.session.stream_mut().set_blocking(false)
    }

    fn clear_pending(&mut self) {
        self.queue.clear();
        for reader in self.readers.values_mut() {
            reader.reset();
        }
    }
}

impl std::fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncClient")
            .field("session", &self.session)
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Declare a typed asynchronous client.
///
/// Rows with a result type generate a method taking a continuation; rows
/// without one are void RPCs. Ids are assigned from declaration order
/// starting at 1.
///
/// ```ignore
/// use exprwire::async_rpc_client;
///
/// async_rpc_client! {
///     pub struct CalcAsync {
///         fn add(x: i32, y: i32) -> i64 = "\\x y -> x + y";
///         fn log(msg: String) = "putStrLn";
///     }
/// }
///
/// let mut calc = CalcAsync::connect(endpoint)?;
/// calc.add(7, 8, |sum| println!("{sum}"))?;
/// while calc.pending() > 0 {
///     calc.step()?;
/// }
/// ```
#[macro_export]
macro_rules! async_rpc_client {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident {
            $( fn $method:ident ( $( $arg:ident : $aty:ty ),* ) $( -> $ret:ty )? = $expr:literal ; )+
        }
    ) => {
        $(#[$meta])*
        $vis struct $Name {
            client: $crate::AsyncClient,
        }

        impl $Name {
            /// The RPC declarations for this client, ids assigned from
            /// declaration order starting at 1.
            pub fn defs() -> Vec<$crate::AsyncDef> {
                let mut defs = Vec::new();
                let mut id = 0u32;
                $(
                    id += 1;
                    defs.push($crate::async_rpc_client!(@def id, $expr ;
                        ( $( $aty, )* ) $( -> $ret )?));
                )+
                defs
            }

            /// Connect to an endpoint and run the handshake.
            pub fn connect(endpoint: $crate::Endpoint) -> $crate::Result<Self> {
                Ok(Self {
                    client: $crate::AsyncClient::connect(endpoint, Self::defs())?,
                })
            }

            /// Connect to a `host:port` string.
            pub fn connect_hostport(hostport: &str) -> $crate::Result<Self> {
                Self::connect($crate::Endpoint::parse(hostport)?)
            }

            /// Run the handshake on an already connected stream.
            pub fn from_stream(stream: $crate::NetStream) -> $crate::Result<Self> {
                Ok(Self {
                    client: $crate::AsyncClient::from_stream(stream, Self::defs())?,
                })
            }

            /// Drain available reply bytes, firing continuations in order.
            pub fn step(&mut self) -> $crate::Result<()> {
                self.client.step()
            }

            /// Number of outstanding replies.
            pub fn pending(&self) -> usize {
                self.client.pending()
            }

            /// Abandon pending work and repeat the handshake.
            pub fn reconnect(&mut self) -> $crate::Result<()> {
                self.client.reconnect()
            }

            /// Abandon pending work and reconnect elsewhere.
            pub fn reconnect_to(&mut self, endpoint: $crate::Endpoint) -> $crate::Result<()> {
                self.client.reconnect_to(endpoint)
            }

            $crate::async_rpc_client!(@methods () ;
                $( fn $method ( $( $arg : $aty ),* ) $( -> $ret )? = $expr ; )+
            );
        }
    };

    (@def $id:ident, $expr:literal ; ( $($aty:ty,)* ) -> $ret:ty) => {
        $crate::AsyncDef::returning::<( $($aty,)* ), $ret>($id, $expr)
    };
    (@def $id:ident, $expr:literal ; ( $($aty:ty,)* )) => {
        $crate::AsyncDef::void::<( $($aty,)* )>($id, $expr)
    };

    (@methods ( $($done:ident)* ) ; ) => {};
    (@methods ( $($done:ident)* ) ;
        fn $method:ident ( $( $arg:ident : $aty:ty ),* ) -> $ret:ty = $expr:literal ;
        $($rest:tt)*
    ) => {
        pub fn $method(
            &mut self,
            $( $arg : $aty, )*
            k: impl FnOnce($ret) + 'static,
        ) -> $crate::Result<()> {
            const ID: u32 = 1 $( + { stringify!($done); 1 } )*;
            self.client.invoke::<( $( $aty, )* ), $ret>(ID, &( $( $arg, )* ), k)
        }

        $crate::async_rpc_client!(@methods ( $($done)* $method ) ; $($rest)*);
    };
    (@methods ( $($done:ident)* ) ;
        fn $method:ident ( $( $arg:ident : $aty:ty ),* ) = $expr:literal ;
        $($rest:tt)*
    ) => {
        pub fn $method(&mut self, $( $arg : $aty ),*) -> $crate::Result<()> {
            const ID: u32 = 1 $( + { stringify!($done); 1 } )*;
            self.client.invoke_void::<( $( $aty, )* )>(ID, &( $( $arg, )* ))
        }

        $crate::async_rpc_client!(@methods ( $($done)* $method ) ; $($rest)*);
    };
}
