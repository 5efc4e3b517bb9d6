//! Session constants and length-prefixed framing.
//!
//! Wire grammar (all integers native byte order):
//!
//! ```text
//! Session      := u32 version=0x00010000
//!                 Frame*
//! Frame        := DefExprFrame | InvokeFrame
//! DefExprFrame := u8 cmd=0, u32 id, LenString expr,
//!                 LenBytes inputType, LenBytes outputType
//! InvokeFrame  := u8 cmd=2, u32 id, args...
//! LenString    := u64 n, byte[n]
//! LenBytes     := u64 n, byte[n]
//! ```
//!
//! Lengths are always 64-bit, fixing the platform-word ambiguity of the
//! original protocol; 32-bit peers of the old framing are not compatible.

use std::io::{Read, Write};

use crate::error::{ExprwireError, Result};
use crate::transport::{recv_all, send_all};

/// Session version constant, sent once per connection.
pub const PROTOCOL_VERSION: u32 = 0x0001_0000;

/// Command: define an expression binding (handshake).
pub const CMD_DEFEXPR: u8 = 0;

/// Reserved command code, never emitted.
pub const CMD_RESERVED: u8 = 1;

/// Command: invoke a previously defined binding.
pub const CMD_INVOKE: u8 = 2;

/// Handshake status byte indicating rejection; any other value is success.
pub const STATUS_FAIL: u8 = 0;

/// Write a `u64` length prefix in native byte order.
pub fn write_len<W: Write>(w: &mut W, n: usize) -> Result<()> {
    send_all(w, &(n as u64).to_ne_bytes())
}

/// Read a `u64` length prefix in native byte order.
pub fn read_len<R: Read>(r: &mut R) -> Result<usize> {
    let mut buf = [0u8; 8];
    recv_all(r, &mut buf)?;
    let n = u64::from_ne_bytes(buf);
    usize::try_from(n)
        .map_err(|_| ExprwireError::Protocol(format!("length {n} exceeds address space")))
}

/// Write a length-prefixed byte sequence.
pub fn write_len_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    write_len(w, bytes.len())?;
    if !bytes.is_empty() {
        send_all(w, bytes)?;
    }
    Ok(())
}

/// Write a length-prefixed string, no terminator, no normalization.
pub fn write_len_str<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_len_bytes(w, s.as_bytes())
}

/// Read a length-prefixed byte sequence.
pub fn read_len_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let n = read_len(r)?;
    let mut bytes = vec![0u8; n];
    if n > 0 {
        recv_all(r, &mut bytes)?;
    }
    Ok(bytes)
}

/// Read a length-prefixed string.
pub fn read_len_string<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_len_bytes(r)?;
    String::from_utf8(bytes)
        .map_err(|_| ExprwireError::Protocol("invalid utf-8 in string".to_string()))
}
