//! Synchronous client: one blocking request/reply exchange per call.
//!
//! A [`Client`] performs the session handshake at construction. Each call
//! writes an INVOKE frame (command byte, RPC id, arguments in positional
//! order) and, for non-void RPCs, block-reads the reply. Failures propagate
//! unrecovered; [`Client::reconnect`] closes the socket and repeats the
//! handshake with the same definitions.
//!
//! The [`rpc_client!`](crate::rpc_client) macro wraps a `Client` in a
//! struct with one typed method per declared RPC:
//!
//! ```ignore
//! use exprwire::{rpc_client, Endpoint};
//!
//! rpc_client! {
//!     pub struct CalcClient {
//!         fn add(x: i32, y: i32) -> i64 = "\\x y -> x + y";
//!         fn log(msg: String) = "putStrLn";
//!     }
//! }
//!
//! let mut calc = CalcClient::connect(Endpoint::parse("calc-host:8080")?)?;
//! let sum = calc.add(7, 8)?;
//! calc.log("done".to_string())?;
//! ```

use crate::codec::Wire;
use crate::error::Result;
use crate::protocol::CMD_INVOKE;
use crate::session::{RpcDef, Session};
use crate::transport::{Endpoint, NetStream};

/// A synchronous RPC client over one session.
#[derive(Debug)]
pub struct Client {
    session: Session,
}

impl Client {
    /// Connect to an endpoint and run the handshake.
    pub fn connect(endpoint: Endpoint, defs: Vec<RpcDef>) -> Result<Client> {
        Ok(Client {
            session: Session::open(endpoint, defs)?,
        })
    }

    /// Run the handshake on an already connected stream.
    pub fn from_stream(stream: NetStream, defs: Vec<RpcDef>) -> Result<Client> {
        Ok(Client {
            session: Session::from_stream(stream, defs)?,
        })
    }

    /// Invoke an RPC and block for its reply.
    ///
    /// `A` is the argument tuple, `R` the declared result type; for void
    /// RPCs `R = ()` and no reply bytes are read.
    pub fn call<A: Wire, R: Wire + Default>(&mut self, id: u32, args: &A) -> Result<R> {
        let stream = self.session.stream_mut();
        <u8 as Wire>::write(stream, &CMD_INVOKE)?;
        <u32 as Wire>::write(stream, &id)?;
        A::write(stream, args)?;
        self.session.read_reply::<R>()
    }

    /// Invoke a void RPC: write the frame, read nothing.
    pub fn call_void<A: Wire>(&mut self, id: u32, args: &A) -> Result<()> {
        self.call::<A, ()>(id, args)
    }

    /// The accepted definitions, in declaration order.
    pub fn defs(&self) -> &[RpcDef] {
        self.session.defs()
    }

    /// Close the socket (ignoring close errors) and repeat the handshake
    /// against the original endpoint.
    pub fn reconnect(&mut self) -> Result<()> {
        self.session.reconnect()
    }

    /// Close the socket and repeat the handshake against a new endpoint.
    pub fn reconnect_to(&mut self, endpoint: Endpoint) -> Result<()> {
        self.session.reconnect_to(endpoint)
    }
}

/// Declare a typed synchronous client.
///
/// Each row declares one RPC: a method name, its positional arguments, an
/// optional result type (omitted or `()` for void), and the expression the
/// peer will bind. Ids are assigned from declaration order starting at 1.
#[macro_export]
macro_rules! rpc_client {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident {
            $( fn $method:ident ( $( $arg:ident : $aty:ty ),* ) $( -> $ret:ty )? = $expr:literal ; )+
        }
    ) => {
        $(#[$meta])*
        $vis struct $Name {
            client: $crate::Client,
        }

        impl $Name {
            /// The RPC definitions this client declares during the
            /// handshake, ids assigned from declaration order starting at 1.
            pub fn defs() -> Vec<$crate::RpcDef> {
                let mut defs = Vec::new();
                let mut id = 0u32;
                $(
                    id += 1;
                    defs.push($crate::RpcDef::define::<
                        ( $( $aty, )* ),
                        $crate::rpc_client!(@ret $( $ret )?),
                    >(id, $expr));
                )+
                defs
            }

            /// Connect to an endpoint and run the handshake.
            pub fn connect(endpoint: $crate::Endpoint) -> $crate::Result<Self> {
                Ok(Self {
                    client: $crate::Client::connect(endpoint, Self::defs())?,
                })
            }

            /// Connect to a `host:port` string.
            pub fn connect_hostport(hostport: &str) -> $crate::Result<Self> {
                Self::connect($crate::Endpoint::parse(hostport)?)
            }

            /// Run the handshake on an already connected stream.
            pub fn from_stream(stream: $crate::NetStream) -> $crate::Result<Self> {
                Ok(Self {
                    client: $crate::Client::from_stream(stream, Self::defs())?,
                })
            }

            /// Close the socket and repeat the handshake.
            pub fn reconnect(&mut self) -> $crate::Result<()> {
                self.client.reconnect()
            }

            /// Close the socket and repeat the handshake elsewhere.
            pub fn reconnect_to(&mut self, endpoint: $crate::Endpoint) -> $crate::Result<()> {
                self.client.reconnect_to(endpoint)
            }

            $crate::rpc_client!(@methods () ;
                $( fn $method ( $( $arg : $aty ),* ) $( -> $ret )? = $expr ; )+
            );
        }
    };

    (@ret) => { () };
    (@ret $ret:ty) => { $ret };

    (@methods ( $($done:ident)* ) ; ) => {};
    (@methods ( $($done:ident)* ) ;
        fn $method:ident ( $( $arg:ident : $aty:ty ),* ) $( -> $ret:ty )? = $expr:literal ;
        $($rest:tt)*
    ) => {
        pub fn $method(
            &mut self,
            $( $arg : $aty ),*
        ) -> $crate::Result<$crate::rpc_client!(@ret $( $ret )?)> {
            const ID: u32 = 1 $( + { stringify!($done); 1 } )*;
            self.client
                .call::<( $( $aty, )* ), $crate::rpc_client!(@ret $( $ret )?)>(ID, &( $( $arg, )* ))
        }

        $crate::rpc_client!(@methods ( $($done)* $method ) ; $($rest)*);
    };
}
