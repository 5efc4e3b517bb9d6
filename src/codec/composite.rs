//! Codecs for tuples, plus the shared state types behind the declarative
//! record/variant/enum macros.
//!
//! Tuples are wire records with synthetic field names `.f0`, `.f1`, ...;
//! their wire form is the positional concatenation of the fields. The
//! incremental state is the index of the field currently being read
//! together with the per-field states; completion occurs when the final
//! field finishes.

use std::io::{Read, Write};

use crate::codec::{PrimReadState, Wire};
use crate::error::Result;
use crate::protocol::TypeDesc;

/// Incremental state for a product shape: the index of the field being
/// read plus every field's nested state.
#[derive(Debug, Default)]
pub struct TupleReadState<S> {
    /// Field currently being read.
    pub idx: u32,
    /// Per-field states.
    pub states: S,
}

/// Incremental state for a sum shape: the tag reader, the tag once known,
/// and every constructor's payload state.
#[derive(Debug, Default)]
pub struct VariantReadState<P> {
    /// Still reading the tag.
    pub read_tag: bool,
    /// Tag-reader state.
    pub tag_state: PrimReadState,
    /// Constructor tag once known.
    pub tag: u32,
    /// Per-constructor payload states.
    pub payloads: P,
}

/// Incremental state for an enumeration: the representation value and its
/// reader state.
#[derive(Debug, Default)]
pub struct EnumReadState<Rep: Wire> {
    /// Decoded representation value staged for conversion.
    pub rep: Rep,
    /// Representation-reader state.
    pub state: Rep::ReadState,
}

macro_rules! wire_tuple_impl {
    ($len:literal; $( $idx:tt : $T:ident ),+) => {
        impl<$($T: Wire),+> Wire for ($($T,)+) {
            const BYTE_COPYABLE: bool = false;
            type ReadState = TupleReadState<($($T::ReadState,)+)>;

            fn descriptor() -> TypeDesc {
                TypeDesc::tuple_of(vec![$($T::descriptor()),+])
            }

            fn write<W: Write>(w: &mut W, v: &Self) -> Result<()> {
                $( $T::write(w, &v.$idx)?; )+
                Ok(())
            }

            fn read<R: Read>(r: &mut R, out: &mut Self) -> Result<()> {
                $( $T::read(r, &mut out.$idx)?; )+
                Ok(())
            }

            fn prepare(state: &mut Self::ReadState) {
                state.idx = 0;
                $( $T::prepare(&mut state.states.$idx); )+
            }

            fn accum<R: Read>(
                r: &mut R,
                state: &mut Self::ReadState,
                out: &mut Self,
            ) -> Result<bool> {
                match state.idx {
                    $( $idx => {
                        if $T::accum(r, &mut state.states.$idx, &mut out.$idx)? {
                            state.idx += 1;
                        }
                    } )+
                    _ => return Ok(true),
                }
                Ok(state.idx == $len)
            }
        }
    };
}

wire_tuple_impl!(1; 0: A);
wire_tuple_impl!(2; 0: A, 1: B);
wire_tuple_impl!(3; 0: A, 1: B, 2: C);
wire_tuple_impl!(4; 0: A, 1: B, 2: C, 3: D);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testutil::{reassemble, roundtrip};
    use crate::protocol::Field;

    #[test]
    fn test_pair_descriptor_has_synthetic_names() {
        assert_eq!(
            <(u32, String)>::descriptor(),
            TypeDesc::record(vec![
                Field {
                    name: ".f0".to_string(),
                    offset: -1,
                    ty: TypeDesc::prim("int"),
                },
                Field {
                    name: ".f1".to_string(),
                    offset: -1,
                    ty: TypeDesc::array(TypeDesc::prim("char")),
                },
            ])
        );
    }

    #[test]
    fn test_pair_wire_form_is_positional() {
        let mut wire = Vec::new();
        <(u8, u8)>::write(&mut wire, &(1, 2)).unwrap();
        assert_eq!(wire, [1, 2]);
    }

    #[test]
    fn test_tuple_roundtrip() {
        assert_eq!(roundtrip(&(7u32,)), (7,));
        assert_eq!(
            roundtrip(&(1i32, "two".to_string(), 3.0f64)),
            (1, "two".to_string(), 3.0)
        );
    }

    #[test]
    fn test_tuple_incremental_one_byte_at_a_time() {
        let v = (0x01020304u32, "hello".to_string(), vec![1u16, 2, 3]);
        assert_eq!(reassemble(&v, 1), v);
    }

    #[test]
    fn test_four_field_tuple_roundtrip() {
        let v = (true, 7i16, "mid".to_string(), [1u8, 2]);
        assert_eq!(roundtrip(&v), v);
        assert_eq!(reassemble(&v, 1), v);
    }

    #[test]
    fn test_record_with_interior_variable_field() {
        // A variable-length field followed by another field must not
        // swallow its successor's bytes.
        let v = (vec![1u8, 2, 3], 0xAABBCCDDu32);
        assert_eq!(roundtrip(&v), v);
        assert_eq!(reassemble(&v, 1), v);
        assert_eq!(reassemble(&v, 2), v);
    }
}
