//! Length-prefixed strings (u8 length + bytes)

use std::io::{self, Write};

/// Longest string a one-byte length prefix can describe
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Write a length-prefixed string, truncating to [`MAX_STRING_LEN`] bytes
pub fn write_len_string<W: Write>(w: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    let bytes = &bytes[..bytes.len().min(MAX_STRING_LEN)];
    w.write_all(&[bytes.len() as u8])?;
    w.write_all(bytes)
}

/// Read a length-prefixed string from the front of `bytes`
///
/// Returns the string and the number of bytes consumed.
pub fn read_len_string(bytes: &[u8]) -> Option<(String, usize)> {
    let len = *bytes.first()? as usize;
    let raw = bytes.get(1..1 + len)?;
    Some((String::from_utf8_lossy(raw).into_owned(), 1 + len))
}
