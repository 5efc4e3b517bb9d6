//! Type descriptors and their canonical byte encoding.
//!
//! A [`TypeDesc`] is the algebraic description of a wire type, exchanged
//! during the handshake so client and peer agree on argument and result
//! shapes. The peer resolves descriptors against its own type system; the
//! client only needs the encoding to be *stable*: two descriptors are equal
//! if and only if their encodings are byte-equal.
//!
//! Encoding: one tag byte per node followed by the node payload. All
//! integers internal to the encoding are fixed-width little-endian, so the
//! same descriptor encodes identically on every platform (wire *values*
//! remain native-endian; the descriptor is a comparison artifact).

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ExprwireError, Result};

/// Node tags for the canonical encoding.
const TAG_PRIM: u8 = 0x00;
const TAG_ENUM: u8 = 0x01;
const TAG_FIXED_ARRAY: u8 = 0x02;
const TAG_ARRAY: u8 = 0x03;
const TAG_RECORD: u8 = 0x04;
const TAG_VARIANT: u8 = 0x05;

/// A named record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name; tuples use synthetic names `.f0`, `.f1`, ...
    pub name: String,
    /// Declared byte offset, `-1` when unspecified.
    pub offset: i64,
    /// Field type.
    pub ty: TypeDesc,
}

/// A named, tagged variant constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctor {
    /// Constructor name; anonymous variants use `.f0`, `.f1`, ...
    pub name: String,
    /// Constructor tag, unique within the variant.
    pub tag: u32,
    /// Payload type.
    pub ty: TypeDesc,
}

/// An algebraic description of a wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    /// A named primitive, optionally an alias over an underlying type.
    Prim {
        /// Primitive name (`bool`, `byte`, `char`, `short`, `int`, `long`,
        /// `float`, `double`, `unit`, `void`, or an alias name).
        name: String,
        /// Underlying type when the primitive is an alias.
        alias: Option<Box<TypeDesc>>,
    },
    /// A set of named constants over a representation type.
    Enum {
        /// Representation type.
        rep: Box<TypeDesc>,
        /// Ordered (name, value) pairs.
        constants: Vec<(String, i64)>,
    },
    /// A fixed-length array.
    FixedArray {
        /// Element type.
        elem: Box<TypeDesc>,
        /// Number of elements.
        len: u64,
    },
    /// A variable-length array.
    Array {
        /// Element type.
        elem: Box<TypeDesc>,
    },
    /// A record with named fields.
    Record {
        /// Ordered fields; names are unique within the record.
        fields: Vec<Field>,
    },
    /// A variant with named, tagged constructors.
    Variant {
        /// Ordered constructors; tags are unique within the variant.
        ctors: Vec<Ctor>,
    },
}

impl TypeDesc {
    /// A primitive type.
    pub fn prim(name: impl Into<String>) -> TypeDesc {
        TypeDesc::Prim {
            name: name.into(),
            alias: None,
        }
    }

    /// A named alias carrying its underlying type.
    pub fn prim_alias(name: impl Into<String>, underlying: TypeDesc) -> TypeDesc {
        TypeDesc::Prim {
            name: name.into(),
            alias: Some(Box::new(underlying)),
        }
    }

    /// An enumeration over a representation type.
    pub fn enumdef(rep: TypeDesc, constants: Vec<(String, i64)>) -> TypeDesc {
        TypeDesc::Enum {
            rep: Box::new(rep),
            constants,
        }
    }

    /// A fixed-length array.
    pub fn fixed_array(elem: TypeDesc, len: u64) -> TypeDesc {
        TypeDesc::FixedArray {
            elem: Box::new(elem),
            len,
        }
    }

    /// A variable-length array.
    pub fn array(elem: TypeDesc) -> TypeDesc {
        TypeDesc::Array {
            elem: Box::new(elem),
        }
    }

    /// A record with the given fields.
    pub fn record(fields: Vec<Field>) -> TypeDesc {
        TypeDesc::Record { fields }
    }

    /// A variant with the given constructors.
    pub fn variant(ctors: Vec<Ctor>) -> TypeDesc {
        TypeDesc::Variant { ctors }
    }

    /// A tuple: a record with synthetic field names `.f0`, `.f1`, ...
    ///
    /// The empty tuple is the `unit` primitive.
    pub fn tuple_of(elems: Vec<TypeDesc>) -> TypeDesc {
        if elems.is_empty() {
            return TypeDesc::unit();
        }
        TypeDesc::record(
            elems
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Field {
                    name: format!(".f{i}"),
                    offset: -1,
                    ty,
                })
                .collect(),
        )
    }

    /// The zero-field record primitive.
    pub fn unit() -> TypeDesc {
        TypeDesc::prim("unit")
    }

    /// The empty variant primitive.
    pub fn void() -> TypeDesc {
        TypeDesc::prim("void")
    }

    /// Canonical byte encoding.
    ///
    /// Deterministic and injective: equal descriptors produce equal bytes
    /// and vice versa.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            TypeDesc::Prim { name, alias } => {
                buf.put_u8(TAG_PRIM);
                put_name(buf, name);
                match alias {
                    Some(underlying) => {
                        buf.put_u8(1);
                        underlying.encode_into(buf);
                    }
                    None => buf.put_u8(0),
                }
            }
            TypeDesc::Enum { rep, constants } => {
                buf.put_u8(TAG_ENUM);
                rep.encode_into(buf);
                buf.put_u32_le(constants.len() as u32);
                for (name, value) in constants {
                    put_name(buf, name);
                    buf.put_i64_le(*value);
                }
            }
            TypeDesc::FixedArray { elem, len } => {
                buf.put_u8(TAG_FIXED_ARRAY);
                elem.encode_into(buf);
                buf.put_u64_le(*len);
            }
            TypeDesc::Array { elem } => {
                buf.put_u8(TAG_ARRAY);
                elem.encode_into(buf);
            }
            TypeDesc::Record { fields } => {
                buf.put_u8(TAG_RECORD);
                buf.put_u32_le(fields.len() as u32);
                for field in fields {
                    put_name(buf, &field.name);
                    buf.put_i64_le(field.offset);
                    field.ty.encode_into(buf);
                }
            }
            TypeDesc::Variant { ctors } => {
                buf.put_u8(TAG_VARIANT);
                buf.put_u32_le(ctors.len() as u32);
                for ctor in ctors {
                    put_name(buf, &ctor.name);
                    buf.put_u32_le(ctor.tag);
                    ctor.ty.encode_into(buf);
                }
            }
        }
    }

    /// Decode a canonical encoding, consuming the whole input.
    pub fn decode(bytes: &[u8]) -> Result<TypeDesc> {
        let mut cursor = bytes;
        let desc = Self::decode_node(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(ExprwireError::Protocol(format!(
                "{} trailing bytes after type descriptor",
                cursor.len()
            )));
        }
        Ok(desc)
    }

    fn decode_node(cursor: &mut &[u8]) -> Result<TypeDesc> {
        let tag = take_u8(cursor)?;
        match tag {
            TAG_PRIM => {
                let name = take_name(cursor)?;
                let alias = match take_u8(cursor)? {
                    0 => None,
                    1 => Some(Box::new(Self::decode_node(cursor)?)),
                    b => {
                        return Err(ExprwireError::Protocol(format!(
                            "invalid alias marker: {b:#04x}"
                        )))
                    }
                };
                Ok(TypeDesc::Prim { name, alias })
            }
            TAG_ENUM => {
                let rep = Box::new(Self::decode_node(cursor)?);
                let count = take_u32(cursor)?;
                let mut constants = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = take_name(cursor)?;
                    let value = take_i64(cursor)?;
                    constants.push((name, value));
                }
                Ok(TypeDesc::Enum { rep, constants })
            }
            TAG_FIXED_ARRAY => {
                let elem = Box::new(Self::decode_node(cursor)?);
                let len = take_u64(cursor)?;
                Ok(TypeDesc::FixedArray { elem, len })
            }
            TAG_ARRAY => Ok(TypeDesc::Array {
                elem: Box::new(Self::decode_node(cursor)?),
            }),
            TAG_RECORD => {
                let count = take_u32(cursor)?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = take_name(cursor)?;
                    let offset = take_i64(cursor)?;
                    let ty = Self::decode_node(cursor)?;
                    fields.push(Field { name, offset, ty });
                }
                Ok(TypeDesc::Record { fields })
            }
            TAG_VARIANT => {
                let count = take_u32(cursor)?;
                let mut ctors = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = take_name(cursor)?;
                    let tag = take_u32(cursor)?;
                    let ty = Self::decode_node(cursor)?;
                    ctors.push(Ctor { name, tag, ty });
                }
                Ok(TypeDesc::Variant { ctors })
            }
            b => Err(ExprwireError::Protocol(format!(
                "invalid descriptor tag: {b:#04x}"
            ))),
        }
    }
}

fn put_name(buf: &mut BytesMut, name: &str) {
    buf.put_u32_le(name.len() as u32);
    buf.put_slice(name.as_bytes());
}

fn take_u8(cursor: &mut &[u8]) -> Result<u8> {
    if cursor.remaining() < 1 {
        return Err(truncated());
    }
    Ok(cursor.get_u8())
}

fn take_u32(cursor: &mut &[u8]) -> Result<u32> {
    if cursor.remaining() < 4 {
        return Err(truncated());
    }
    Ok(cursor.get_u32_le())
}

fn take_u64(cursor: &mut &[u8]) -> Result<u64> {
    if cursor.remaining() < 8 {
        return Err(truncated());
    }
    Ok(cursor.get_u64_le())
}

fn take_i64(cursor: &mut &[u8]) -> Result<i64> {
    if cursor.remaining() < 8 {
        return Err(truncated());
    }
    Ok(cursor.get_i64_le())
}

fn take_name(cursor: &mut &[u8]) -> Result<String> {
    let n = take_u32(cursor)? as usize;
    if cursor.remaining() < n {
        return Err(truncated());
    }
    let bytes = cursor[..n].to_vec();
    cursor.advance(n);
    String::from_utf8(bytes)
        .map_err(|_| ExprwireError::Protocol("invalid utf-8 in descriptor name".to_string()))
}

fn truncated() -> ExprwireError {
    ExprwireError::Protocol("truncated type descriptor".to_string())
}
