//! # exprwire
//!
//! Session-oriented, type-directed RPC client for remote expression
//! evaluation engines.
//!
//! A session opens with a handshake that declares *expression bindings*:
//! each binding names a numeric id, a text expression the peer will
//! compile, and canonical encodings of the argument and result types. The
//! peer accepts or rejects each binding; afterwards every call is a small
//! INVOKE frame whose arguments and reply travel in the types' raw
//! native-endian wire forms.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`]): TCP or Unix-domain stream sockets with
//!   exact-length blocking I/O, non-blocking partial reads, and the
//!   blocking-mode toggle the async client relies on.
//! - **Protocol** ([`protocol`]): session constants, length framing, and
//!   the algebraic [`TypeDesc`] model with its canonical encoding.
//! - **Codecs** ([`codec`]): the [`Wire`] trait - per-shape descriptor,
//!   blocking writer/reader, and a resumable reader whose state composes
//!   structurally through products, sums, and containers.
//! - **Clients**: the blocking [`Client`], the pipelined [`AsyncClient`]
//!   with its FIFO `step` scheduler, and the [`rpc_client!`] /
//!   [`async_rpc_client!`] macros that generate typed wrappers.
//!
//! ## Quick start
//!
//! ```ignore
//! use exprwire::{rpc_client, Endpoint};
//!
//! rpc_client! {
//!     pub struct Calc {
//!         fn add(x: i32, y: i32) -> i64 = "\\x y -> x + y";
//!         fn note(msg: String) = "putStrLn";
//!     }
//! }
//!
//! fn main() -> exprwire::Result<()> {
//!     let mut calc = Calc::connect(Endpoint::parse("calc-host:8080")?)?;
//!     println!("sum: {}", calc.add(7, 8)?);
//!     calc.note("done".to_string())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Compatibility notes
//!
//! Wire values use *native byte order*; peers of different endianness are
//! not supported. Signed and unsigned integers of one width share a
//! descriptor name (`short`, `int`, `long`), so a signedness mismatch
//! between peers is silent. Length prefixes are always 64-bit.
//!
//! Sessions are single-owner: one thread performs all writes, reads, and
//! `step` calls.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;

mod client;
mod sched;
mod session;

pub use client::Client;
pub use codec::Wire;
pub use error::{ExprwireError, Result};
pub use protocol::TypeDesc;
pub use sched::{AsyncClient, AsyncDef};
pub use session::{init_session, RpcDef, Session};
pub use transport::{Endpoint, NetStream};
