//! Codecs for fixed arrays, vectors, strings, and maps.
//!
//! Variable-length shapes are framed as a `u64` length followed by their
//! elements. Incremental readers resize the destination to exactly the
//! declared length before any element bytes are stored.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::codec::{PrimReadState, SliceReadState, Wire};
use crate::error::{ExprwireError, Result};
use crate::protocol::{read_len, write_len, TypeDesc};
use crate::transport::{recv_all, recv_partial, send_all};

impl<T: Wire, const N: usize> Wire for [T; N] {
    const BYTE_COPYABLE: bool = false;
    type ReadState = SliceReadState<T::ReadState>;

    fn descriptor() -> TypeDesc {
        TypeDesc::fixed_array(T::descriptor(), N as u64)
    }

    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
        T::write_slice(w, v)
    }

    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
        T::read_slice(r, out)
    }

    fn prepare(state: &mut Self::ReadState) {
        T::prepare_slice(state);
    }

    fn accum<R: Read>(r: &mut R, state: &mut Self::ReadState, out: &mut Self) -> Result<bool> {
        T::accum_slice(r, state, out)
    }
}

/// Incremental state for a variable-length array: length first, then the
/// elements of the freshly resized destination.
#[derive(Debug, Default)]
pub struct VecReadState<S> {
    /// Still reading the length prefix.
    pub read_len: bool,
    /// Length-reader state.
    pub len_state: PrimReadState,
    /// Declared element count once known.
    pub len: u64,
    /// Element progress.
    pub slice: SliceReadState<S>,
}

impl<T: Wire + Default> Wire for Vec<T> {
    const BYTE_COPYABLE: bool = false;
    type ReadState = VecReadState<T::ReadState>;

    fn descriptor() -> TypeDesc {
        TypeDesc::array(T::descriptor())
    }

    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
        write_len(w, v.len())?;
        T::write_slice(w, v)
    }

    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
        let n = read_len(r)?;
        out.clear();
        out.resize_with(n, T::default);
        T::read_slice(r, out)
    }

    fn prepare(state: &mut Self::ReadState) {
        state.read_len = true;
        <u64 as Wire>::prepare(&mut state.len_state);
    }

    fn accum<R: Read>(r: &mut R, state: &mut Self::ReadState, out: &mut Self) -> Result<bool> {
        if state.read_len {
            if !<u64 as Wire>::accum(r, &mut state.len_state, &mut state.len)? {
                return Ok(false);
            }
            state.read_len = false;
            let n = usize::try_from(state.len).map_err(|_| {
                ExprwireError::Protocol(format!("array length {} exceeds address space", state.len))
            })?;
            out.clear();
            out.resize_with(n, T::default);
            T::prepare_slice(&mut state.slice);
        }
        T::accum_slice(r, &mut state.slice, out)
    }
}

/// Incremental state for a string: length first, then raw bytes staged
/// until the final UTF-8 conversion.
#[derive(Debug, Default)]
pub struct StringReadState {
    /// Still reading the length prefix.
    pub read_len: bool,
    /// Length-reader state.
    pub len_state: PrimReadState,
    /// Declared byte count once known.
    pub len: u64,
    /// Staged bytes, sized exactly to the declared length.
    pub buf: Vec<u8>,
    /// Bytes received so far.
    pub filled: usize,
}

impl Wire for String {
    const BYTE_COPYABLE: bool = false;
    type ReadState = StringReadState;

    fn descriptor() -> TypeDesc {
        TypeDesc::array(TypeDesc::prim("char"))
    }

    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
        write_len(w, v.len())?;
        if !v.is_empty() {
            send_all(w, v.as_bytes())?;
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
        let n = read_len(r)?;
        let mut buf = vec![0u8; n];
        if n > 0 {
            recv_all(r, &mut buf)?;
        }
        *out = String::from_utf8(buf)
            .map_err(|_| ExprwireError::Protocol("invalid utf-8 in string".to_string()))?;
        Ok(())
    }

    fn prepare(state: &mut Self::ReadState) {
        state.read_len = true;
        <u64 as Wire>::prepare(&mut state.len_state);
        state.buf.clear();
        state.filled = 0;
    }

    fn accum<R: Read>(r: &mut R, state: &mut Self::ReadState, out: &mut Self) -> Result<bool> {
        if state.read_len {
            if !<u64 as Wire>::accum(r, &mut state.len_state, &mut state.len)? {
                return Ok(false);
            }
            state.read_len = false;
            let n = usize::try_from(state.len).map_err(|_| {
                ExprwireError::Protocol(format!("string length {} exceeds address space", state.len))
            })?;
            state.buf = vec![0u8; n];
            state.filled = 0;
        }
        if state.filled < state.buf.len() {
            state.filled += recv_partial(r, &mut state.buf[state.filled..])?;
        }
        if state.filled == state.buf.len() {
            let bytes = std::mem::take(&mut state.buf);
            *out = String::from_utf8(bytes)
                .map_err(|_| ExprwireError::Protocol("invalid utf-8 in string".to_string()))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Phase of the map reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapPhase {
    /// Reading the entry count.
    #[default]
    Len,
    /// Reading the next key.
    Key,
    /// Reading the value for the staged key.
    Val,
}

/// Incremental state for a map: a {LEN, KEY, VAL} machine with a
/// decrementing remaining count and staging slots for the pair in flight.
#[derive(Debug, Default)]
pub struct MapReadState<K: Wire, V: Wire> {
    /// Current phase.
    pub phase: MapPhase,
    /// Length-reader state.
    pub len_state: PrimReadState,
    /// Entries still expected.
    pub remaining: u64,
    /// Key-reader state.
    pub key_state: K::ReadState,
    /// Key staging slot.
    pub key: K,
    /// Value-reader state.
    pub val_state: V::ReadState,
    /// Value staging slot.
    pub val: V,
}

impl<K, V> Wire for BTreeMap<K, V>
where
    K: Wire + Default + Ord + 'static,
    V: Wire + Default + 'static,
{
    const BYTE_COPYABLE: bool = false;
    type ReadState = MapReadState<K, V>;

    fn descriptor() -> TypeDesc {
        <Vec<(K, V)> as Wire>::descriptor()
    }

    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
        write_len(w, v.len())?;
        for (key, val) in v {
            K::write(w, key)?;
            V::write(w, val)?;
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
        let n = read_len(r)?;
        for _ in 0..n {
            let mut key = K::default();
            K::read(r, &mut key)?;
            let mut val = V::default();
            V::read(r, &mut val)?;
            out.insert(key, val);
        }
        Ok(())
    }

    fn prepare(state: &mut Self::ReadState) {
        state.phase = MapPhase::Len;
        state.remaining = 0;
        <u64 as Wire>::prepare(&mut state.len_state);
    }

    fn accum<R: Read>(r: &mut R, state: &mut Self::ReadState, out: &mut Self) -> Result<bool> {
        match state.phase {
            MapPhase::Len => {
                if <u64 as Wire>::accum(r, &mut state.len_state, &mut state.remaining)? {
                    state.phase = MapPhase::Key;
                    K::prepare(&mut state.key_state);
                }
            }
            MapPhase::Key => {
                if K::accum(r, &mut state.key_state, &mut state.key)? {
                    state.phase = MapPhase::Val;
                    V::prepare(&mut state.val_state);
                }
            }
            MapPhase::Val => {
                if V::accum(r, &mut state.val_state, &mut state.val)? {
                    out.insert(
                        std::mem::take(&mut state.key),
                        std::mem::take(&mut state.val),
                    );
                    state.remaining -= 1;
                    state.phase = MapPhase::Key;
                    K::prepare(&mut state.key_state);
                }
            }
        }
        Ok(state.phase != MapPhase::Len && state.remaining == 0)
    }
}
