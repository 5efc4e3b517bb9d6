//! Codec module - type-directed serialization in blocking and resumable forms.
//!
//! Every value shape that can cross the wire implements [`Wire`]: a type
//! descriptor computed at binding time, a blocking writer and reader, and a
//! resumable reader split into a *preparation* step and an *accumulation*
//! step. Accumulation consumes whatever bytes the socket currently has and
//! reports whether the value is complete, so a reply can be reassembled one
//! socket read at a time.
//!
//! Codec states compose structurally: a tuple's state is the index of the
//! field being read plus the per-field states, a variant's state is a tag
//! reader plus the per-constructor payload states, an array's state is an
//! element index (or a byte offset on the bulk path) plus one element state.
//!
//! # Declaring application types
//!
//! ```ignore
//! use exprwire::{wire_record, wire_variant};
//!
//! wire_record! {
//!     pub struct Quote {
//!         0 => symbol: String,
//!         1 => price: f64,
//!     }
//! }
//!
//! wire_variant! {
//!     pub enum Side {
//!         0 => Bid(Quote),
//!         1 => Ask(Quote),
//!     }
//! }
//! ```

mod composite;
mod containers;
mod macros;
mod primitives;

pub use composite::{EnumReadState, TupleReadState, VariantReadState};
pub use containers::{MapPhase, MapReadState, StringReadState, VecReadState};
pub use primitives::PrimReadState;

use std::io::{Read, Write};

use crate::error::Result;
use crate::protocol::TypeDesc;

/// Incremental state for reading a slice of `T`.
///
/// The iterating path tracks `(idx, elem)`; the bulk path for byte-copyable
/// primitives tracks `bytes` into the destination region instead.
#[derive(Debug, Default)]
pub struct SliceReadState<S> {
    /// Next element to fill (iterating path).
    pub idx: usize,
    /// Bytes already copied (bulk path).
    pub bytes: usize,
    /// State of the element currently being read (iterating path).
    pub elem: S,
}

/// A codec for one value shape.
///
/// `prepare` must be called before the first `accum` and again before any
/// reuse of a completed state. `accum` never blocks and must tolerate
/// returning zero progress any number of times.
pub trait Wire: Sized {
    /// True when an in-memory value occupies a contiguous region identical
    /// to its wire form, with a compile-time-constant width.
    const BYTE_COPYABLE: bool;

    /// Incremental reader state, a structural mirror of the type's shape.
    type ReadState: Default + 'static;

    /// The type descriptor exchanged during the handshake.
    fn descriptor() -> TypeDesc;

    /// Write a value in full.
    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()>;

    /// Read a value in full, blocking.
    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()>;

    /// Reset an incremental state to its start position.
    fn prepare(state: &mut Self::ReadState);

    /// Consume whatever bytes are available; true once `out` is complete.
    fn accum<R: Read>(r: &mut R, state: &mut Self::ReadState, out: &mut Self) -> Result<bool>;

    /// Write a slice of values; byte-copyable primitives override this with
    /// a single bulk transfer.
    fn write_slice<W: Write>(w: &mut W, vals: &[Self]) -> Result<()> {
        for v in vals {
            Self::write(w, v)?;
        }
        Ok(())
    }

    /// Read into a pre-sized slice; byte-copyable primitives override this
    /// with a single bulk transfer.
    fn read_slice<R: Read>(r: &mut R, out: &mut [Self]) -> Result<()> {
        for v in out.iter_mut() {
            Self::read(r, v)?;
        }
        Ok(())
    }

    /// Reset a slice state to its start position.
    fn prepare_slice(state: &mut SliceReadState<Self::ReadState>) {
        state.idx = 0;
        state.bytes = 0;
        state.elem = Self::ReadState::default();
        Self::prepare(&mut state.elem);
    }

    /// Incrementally fill a pre-sized slice; true once every element is
    /// complete.
    fn accum_slice<R: Read>(
        r: &mut R,
        state: &mut SliceReadState<Self::ReadState>,
        out: &mut [Self],
    ) -> Result<bool> {
        if state.idx >= out.len() {
            return Ok(true);
        }
        if Self::accum(r, &mut state.elem, &mut out[state.idx])? {
            state.idx += 1;
            state.elem = Self::ReadState::default();
            Self::prepare(&mut state.elem);
        }
        Ok(state.idx == out.len())
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::io::{Error, ErrorKind};

    /// A reader that hands out at most `chunk` bytes per read and reports
    /// `WouldBlock` on every other call, imitating a non-blocking socket
    /// that keeps running dry.
    pub struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        starve: bool,
    }

    impl ChunkedReader {
        pub fn new(data: Vec<u8>, chunk: usize) -> Self {
            assert!(chunk > 0);
            Self {
                data,
                pos: 0,
                chunk,
                starve: true,
            }
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.starve = !self.starve;
            if self.starve {
                return Err(Error::new(ErrorKind::WouldBlock, "no bytes yet"));
            }
            if self.pos == self.data.len() {
                return Ok(0); // orderly close once drained
            }
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Encode `v` with the blocking writer, then reassemble it through the
    /// incremental reader `chunk` bytes at a time.
    pub fn reassemble<T: Wire + Default>(v: &T, chunk: usize) -> T {
        let mut wire = Vec::new();
        T::write(&mut wire, v).unwrap();
        decode_chunked(&wire, chunk)
    }

    /// Drive `accum` over `wire` delivered `chunk` bytes at a time until
    /// the value completes.
    pub fn decode_chunked<T: Wire + Default>(wire: &[u8], chunk: usize) -> T {
        let mut r = ChunkedReader::new(wire.to_vec(), chunk);
        let mut state = T::ReadState::default();
        T::prepare(&mut state);

        let mut out = T::default();
        let mut spins = 0;
        loop {
            if T::accum(&mut r, &mut state, &mut out).unwrap() {
                return out;
            }
            spins += 1;
            assert!(spins < 1_000_000, "incremental reader made no progress");
        }
    }

    /// Blocking write-then-read round trip through an in-memory buffer.
    pub fn roundtrip<T: Wire + Default>(v: &T) -> T {
        let mut wire = Vec::new();
        T::write(&mut wire, v).unwrap();

        let mut cursor = &wire[..];
        let mut out = T::default();
        T::read(&mut cursor, &mut out).unwrap();
        assert!(cursor.is_empty(), "reader left {} wire bytes", cursor.len());
        out
    }
}
