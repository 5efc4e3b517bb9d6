//! Protocol module - session constants, length framing, and type descriptors.
//!
//! This module implements the client side of the session protocol:
//! - version and command constants plus length-prefixed framing
//! - the algebraic type-descriptor model and its canonical byte encoding

mod descriptor;
mod wire_format;

pub use descriptor::{Ctor, Field, TypeDesc};
pub use wire_format::{
    read_len, read_len_bytes, read_len_string, write_len, write_len_bytes, write_len_str,
    CMD_DEFEXPR, CMD_INVOKE, CMD_RESERVED, PROTOCOL_VERSION, STATUS_FAIL,
};
