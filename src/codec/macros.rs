//! Declarative macros for wire-enabled application types.
//!
//! These generate the type together with its [`Wire`](crate::Wire)
//! implementation, enumerating fields or constructors in declaration order
//! exactly as the descriptor will present them to the peer:
//!
//! - [`wire_record!`] - a struct whose wire form is the tuple of its fields
//! - [`wire_variant!`] - an enum written as a `u32` tag then the payload
//! - [`wire_enum!`] - named constants over an integer representation
//! - [`wire_alias!`] - a newtype carrying its own descriptor name
//!
//! Field and constructor rows carry explicit positions (`0 => ...`),
//! consecutive from zero; for variants the position is also the wire tag.

/// Declare a struct whose wire form is the tuple of its fields.
///
/// ```ignore
/// wire_record! {
///     pub struct Quote {
///         0 => symbol: String,
///         1 => price: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident {
            $( $idx:tt => $field:ident : $T:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        $vis struct $Name {
            $( pub $field: $T, )+
        }

        impl $crate::Wire for $Name {
            const BYTE_COPYABLE: bool = false;
            type ReadState =
                $crate::codec::TupleReadState<( $( <$T as $crate::Wire>::ReadState, )+ )>;

            fn descriptor() -> $crate::TypeDesc {
                $crate::TypeDesc::record(vec![
                    $( $crate::protocol::Field {
                        name: stringify!($field).to_string(),
                        offset: -1,
                        ty: <$T as $crate::Wire>::descriptor(),
                    }, )+
                ])
            }

            fn write<W: ::std::io::Write>(w: &mut W, v: &Self) -> $crate::Result<()> {
                $( <$T as $crate::Wire>::write(w, &v.$field)?; )+
                Ok(())
            }

            fn read<R: ::std::io::Read>(r: &mut R, out: &mut Self) -> $crate::Result<()> {
                $( <$T as $crate::Wire>::read(r, &mut out.$field)?; )+
                Ok(())
            }

            fn prepare(state: &mut Self::ReadState) {
                state.idx = 0;
                $( <$T as $crate::Wire>::prepare(&mut state.states.$idx); )+
            }

            fn accum<R: ::std::io::Read>(
                r: &mut R,
                state: &mut Self::ReadState,
                out: &mut Self,
            ) -> $crate::Result<bool> {
                const FIELDS: u32 = 0 $( + { stringify!($field); 1 } )+;
                match state.idx {
                    $( $idx => {
                        if <$T as $crate::Wire>::accum(r, &mut state.states.$idx, &mut out.$field)? {
                            state.idx += 1;
                        }
                    } )+
                    _ => return Ok(true),
                }
                Ok(state.idx == FIELDS)
            }
        }
    };
}

/// Declare an enum written as a `u32` constructor tag then the payload.
///
/// The row position doubles as the wire tag and must be consecutive from
/// zero. Constructor names default to the variant identifiers; give
/// explicit name strings for anonymous variants:
///
/// ```ignore
/// wire_variant! {
///     pub enum Reply {
///         0 => Num(i64),
///         1 => Text(String),
///     }
/// }
///
/// wire_variant! {
///     pub enum IntOrStr {
///         0 => F0(".f0", i32),
///         1 => F1(".f1", String),
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_variant {
    (
        $(#[$meta:meta])*
        $vis:vis enum $Name:ident {
            $( $idx:tt => $Ctor:ident ( $name:literal, $T:ty ) ),+ $(,)?
        }
    ) => {
        $crate::wire_variant!(@impl
            $(#[$meta])* $vis enum $Name { $( $idx => $Ctor ( $name, $T ) ),+ }
        );
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $Name:ident {
            $( $idx:tt => $Ctor:ident ( $T:ty ) ),+ $(,)?
        }
    ) => {
        $crate::wire_variant!(@impl
            $(#[$meta])* $vis enum $Name { $( $idx => $Ctor ( stringify!($Ctor), $T ) ),+ }
        );
    };
    (@impl
        $(#[$meta:meta])*
        $vis:vis enum $Name:ident {
            $( $idx:tt => $Ctor:ident ( $name:expr, $T:ty ) ),+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $Name {
            $( $Ctor($T), )+
        }

        impl Default for $Name {
            fn default() -> Self {
                $crate::wire_variant!(@first $Name; $( $Ctor($T) ),+)
            }
        }

        impl $crate::Wire for $Name {
            const BYTE_COPYABLE: bool = false;
            type ReadState =
                $crate::codec::VariantReadState<( $( <$T as $crate::Wire>::ReadState, )+ )>;

            fn descriptor() -> $crate::TypeDesc {
                $crate::TypeDesc::variant(vec![
                    $( $crate::protocol::Ctor {
                        name: ($name).to_string(),
                        tag: $idx,
                        ty: <$T as $crate::Wire>::descriptor(),
                    }, )+
                ])
            }

            fn write<W: ::std::io::Write>(w: &mut W, v: &Self) -> $crate::Result<()> {
                match v {
                    $( $Name::$Ctor(payload) => {
                        <u32 as $crate::Wire>::write(w, &$idx)?;
                        <$T as $crate::Wire>::write(w, payload)
                    } )+
                }
            }

            fn read<R: ::std::io::Read>(r: &mut R, out: &mut Self) -> $crate::Result<()> {
                let mut tag = 0u32;
                <u32 as $crate::Wire>::read(r, &mut tag)?;
                match tag {
                    $( $idx => {
                        let mut payload = <$T as Default>::default();
                        <$T as $crate::Wire>::read(r, &mut payload)?;
                        *out = $Name::$Ctor(payload);
                        Ok(())
                    } )+
                    other => Err($crate::ExprwireError::Protocol(format!(
                        "unknown constructor tag {} for {}",
                        other,
                        stringify!($Name),
                    ))),
                }
            }

            fn prepare(state: &mut Self::ReadState) {
                state.read_tag = true;
                state.tag = 0;
                <u32 as $crate::Wire>::prepare(&mut state.tag_state);
                $( <$T as $crate::Wire>::prepare(&mut state.payloads.$idx); )+
            }

            fn accum<R: ::std::io::Read>(
                r: &mut R,
                state: &mut Self::ReadState,
                out: &mut Self,
            ) -> $crate::Result<bool> {
                if state.read_tag {
                    if <u32 as $crate::Wire>::accum(r, &mut state.tag_state, &mut state.tag)? {
                        state.read_tag = false;
                        match state.tag {
                            $( $idx => *out = $Name::$Ctor(<$T as Default>::default()), )+
                            other => {
                                return Err($crate::ExprwireError::Protocol(format!(
                                    "unknown constructor tag {} for {}",
                                    other,
                                    stringify!($Name),
                                )))
                            }
                        }
                    }
                    Ok(false)
                } else {
                    match out {
                        $( $Name::$Ctor(payload) =>
                            <$T as $crate::Wire>::accum(r, &mut state.payloads.$idx, payload), )+
                    }
                }
            }
        }
    };
    (@first $Name:ident; $Ctor:ident($T:ty) $(, $RCtor:ident($RT:ty) )*) => {
        $Name::$Ctor(<$T as Default>::default())
    };
}

/// Declare named constants over an integer representation; the wire form
/// is exactly the representation's.
///
/// ```ignore
/// wire_enum! {
///     pub enum Venue: u16 {
///         Floor = 0,
///         Electronic = 1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $Name:ident : $Rep:ty {
            $( $Const:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $Name {
            $( $Const = $value, )+
        }

        impl Default for $Name {
            fn default() -> Self {
                $crate::wire_enum!(@first $Name; $( $Const ),+)
            }
        }

        impl $Name {
            /// Convert a decoded representation value back to a constant.
            fn from_rep(v: $Rep) -> $crate::Result<Self> {
                match v {
                    $( x if x == $Name::$Const as $Rep => Ok($Name::$Const), )+
                    other => Err($crate::ExprwireError::Protocol(format!(
                        "unknown {} value: {}",
                        stringify!($Name),
                        other,
                    ))),
                }
            }
        }

        impl $crate::Wire for $Name {
            const BYTE_COPYABLE: bool = true;
            type ReadState = $crate::codec::EnumReadState<$Rep>;

            fn descriptor() -> $crate::TypeDesc {
                $crate::TypeDesc::enumdef(
                    <$Rep as $crate::Wire>::descriptor(),
                    vec![ $( (stringify!($Const).to_string(), $value as i64), )+ ],
                )
            }

            fn write<W: ::std::io::Write>(w: &mut W, v: &Self) -> $crate::Result<()> {
                <$Rep as $crate::Wire>::write(w, &(*v as $Rep))
            }

            fn read<R: ::std::io::Read>(r: &mut R, out: &mut Self) -> $crate::Result<()> {
                let mut rep = <$Rep as Default>::default();
                <$Rep as $crate::Wire>::read(r, &mut rep)?;
                *out = Self::from_rep(rep)?;
                Ok(())
            }

            fn prepare(state: &mut Self::ReadState) {
                <$Rep as $crate::Wire>::prepare(&mut state.state);
            }

            fn accum<R: ::std::io::Read>(
                r: &mut R,
                state: &mut Self::ReadState,
                out: &mut Self,
            ) -> $crate::Result<bool> {
                if <$Rep as $crate::Wire>::accum(r, &mut state.state, &mut state.rep)? {
                    *out = Self::from_rep(::std::mem::take(&mut state.rep))?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    };
    (@first $Name:ident; $Const:ident $(, $RConst:ident )*) => {
        $Name::$Const
    };
}

/// Declare a newtype alias: its own descriptor name over the underlying
/// type's wire form.
///
/// ```ignore
/// wire_alias!(pub struct OrderId("orderId") = u64);
/// ```
#[macro_export]
macro_rules! wire_alias {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident ( $name:literal ) = $T:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        $vis struct $Name(pub $T);

        impl $crate::Wire for $Name {
            const BYTE_COPYABLE: bool = <$T as $crate::Wire>::BYTE_COPYABLE;
            type ReadState = <$T as $crate::Wire>::ReadState;

            fn descriptor() -> $crate::TypeDesc {
                $crate::TypeDesc::prim_alias($name, <$T as $crate::Wire>::descriptor())
            }

            fn write<W: ::std::io::Write>(w: &mut W, v: &Self) -> $crate::Result<()> {
                <$T as $crate::Wire>::write(w, &v.0)
            }

            fn read<R: ::std::io::Read>(r: &mut R, out: &mut Self) -> $crate::Result<()> {
                <$T as $crate::Wire>::read(r, &mut out.0)
            }

            fn prepare(state: &mut Self::ReadState) {
                <$T as $crate::Wire>::prepare(state);
            }

            fn accum<R: ::std::io::Read>(
                r: &mut R,
                state: &mut Self::ReadState,
                out: &mut Self,
            ) -> $crate::Result<bool> {
                <$T as $crate::Wire>::accum(r, state, &mut out.0)
            }
        }
    };
}
