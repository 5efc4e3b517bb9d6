//! Codecs for fixed-width primitives, `bool`, and `unit`.
//!
//! Fixed-width primitives are written and read as raw native-endian bytes
//! and are byte-copyable, so slices of them move through single bulk
//! transfers. `bool` shares the wire shape but is decoded by value (any
//! nonzero byte is true), so its slices go element by element.

use std::io::{Read, Write};

use zerocopy::IntoBytes;

use crate::codec::{SliceReadState, Wire};
use crate::error::Result;
use crate::protocol::TypeDesc;
use crate::transport::{recv_all, recv_partial, send_all};

/// Byte-offset state for a value of at most eight wire bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimReadState {
    /// Bytes received so far.
    pub off: u8,
    /// Staging area for the wire bytes.
    pub buf: [u8; 8],
}

macro_rules! wire_fixed_prim {
    ($ty:ty, $name:literal) => {
        impl Wire for $ty {
            const BYTE_COPYABLE: bool = true;
            type ReadState = PrimReadState;

            fn descriptor() -> TypeDesc {
                TypeDesc::prim($name)
            }

            fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
                send_all(w, &v.to_ne_bytes())
            }

            fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                recv_all(r, &mut buf)?;
                *out = <$ty>::from_ne_bytes(buf);
                Ok(())
            }

            fn prepare(state: &mut PrimReadState) {
                state.off = 0;
            }

            fn accum<R: Read>(r: &mut R, state: &mut PrimReadState, out: &mut Self) -> Result<bool> {
                const NEED: usize = std::mem::size_of::<$ty>();
                let n = recv_partial(r, &mut state.buf[state.off as usize..NEED])?;
                state.off += n as u8;
                if state.off as usize == NEED {
                    let mut buf = [0u8; NEED];
                    buf.copy_from_slice(&state.buf[..NEED]);
                    *out = <$ty>::from_ne_bytes(buf);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }

            fn write_slice<W: Write>(w: &mut W, vals: &[Self]) -> Result<()> {
                send_all(w, IntoBytes::as_bytes(vals))
            }

            fn read_slice<R: Read>(r: &mut R, out: &mut [Self]) -> Result<()> {
                recv_all(r, IntoBytes::as_mut_bytes(out))
            }

            fn prepare_slice(state: &mut SliceReadState<PrimReadState>) {
                state.idx = 0;
                state.bytes = 0;
            }

            fn accum_slice<R: Read>(
                r: &mut R,
                state: &mut SliceReadState<PrimReadState>,
                out: &mut [Self],
            ) -> Result<bool> {
                let buf = IntoBytes::as_mut_bytes(out);
                state.bytes += recv_partial(r, &mut buf[state.bytes..])?;
                Ok(state.bytes == buf.len())
            }
        }
    };
}

wire_fixed_prim!(u8, "byte");
wire_fixed_prim!(i8, "char");
wire_fixed_prim!(i16, "short");
wire_fixed_prim!(u16, "short");
wire_fixed_prim!(i32, "int");
wire_fixed_prim!(u32, "int");
wire_fixed_prim!(i64, "long");
wire_fixed_prim!(u64, "long");
wire_fixed_prim!(f32, "float");
wire_fixed_prim!(f64, "double");

// Decoded by value rather than bit pattern, so no bulk slice path.
impl Wire for bool {
    const BYTE_COPYABLE: bool = true;
    type ReadState = PrimReadState;

    fn descriptor() -> TypeDesc {
        TypeDesc::prim("bool")
    }

    fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
        send_all(w, &[*v as u8])
    }

    fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
        let mut buf = [0u8; 1];
        recv_all(r, &mut buf)?;
        *out = buf[0] != 0;
        Ok(())
    }

    fn prepare(state: &mut PrimReadState) {
        state.off = 0;
    }

    fn accum<R: Read>(r: &mut R, state: &mut PrimReadState, out: &mut Self) -> Result<bool> {
        let n = recv_partial(r, &mut state.buf[state.off as usize..1])?;
        state.off += n as u8;
        if state.off == 1 {
            *out = state.buf[0] != 0;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

// `unit` occupies no wire bytes and always completes immediately.
impl Wire for () {
    const BYTE_COPYABLE: bool = false;
    type ReadState = ();

    fn descriptor() -> TypeDesc {
        TypeDesc::unit()
    }

    fn write<W: Write>(_w: &mut W, _v: &Self) -> Result<()> {
        Ok(())
    }

    fn read<R: Read>(_r: &mut R, _out: &mut Self) -> Result<()> {
        Ok(())
    }

    fn prepare(_state: &mut ()) {}

    fn accum<R: Read>(_r: &mut R, _state: &mut (), _out: &mut Self) -> Result<bool> {
        Ok(true)
    }
}
