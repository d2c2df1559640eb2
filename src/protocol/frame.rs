//! RESP frame types.
//!
//! A Frame is one complete protocol unit: a command invocation coming in, or
//! a reply going out.

use super::responses;
use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// A RESP frame representing a complete protocol message.
///
/// Frames are cheap to clone (`Bytes` for payloads) and encode
/// deterministically: equal frames always produce identical bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    /// Status line; CR and LF are written as spaces
    Simple(String),

    /// Error line
    Error(String),

    /// 64-bit signed integer
    Integer(i64),

    /// Bulk string (binary-safe)
    Bulk(Bytes),

    /// Null bulk string
    Null,

    /// Array of frames
    Array(Vec<Frame>),
}

impl Frame {
    /// Create a simple string frame.
    #[inline]
    pub fn simple(s: impl Into<String>) -> Self {
        Self::Simple(s.into())
    }

    /// Create an error frame.
    #[inline]
    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    /// Create an integer frame.
    #[inline]
    pub fn integer(n: i64) -> Self {
        Self::Integer(n)
    }

    /// Create a bulk string frame.
    #[inline]
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Self::Bulk(data.into())
    }

    /// Create a null frame.
    #[inline]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create an array frame.
    #[inline]
    pub fn array(frames: Vec<Frame>) -> Self {
        Self::Array(frames)
    }

    /// Create an empty array frame.
    #[inline]
    pub fn empty_array() -> Self {
        Self::Array(Vec::new())
    }

    /// Create an OK response.
    #[inline]
    pub fn ok() -> Self {
        Self::Simple("OK".to_string())
    }

    /// Create a PONG response.
    #[inline]
    pub fn pong() -> Self {
        Self::Simple("PONG".to_string())
    }

    /// Build a command invocation: an array of bulk strings.
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Self::Array(parts.into_iter().map(|p| Self::Bulk(p.into())).collect())
    }

    /// Check if this is a null frame.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this is an error frame.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Try to get the frame as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Simple(s) | Self::Error(s) => Some(s),
            Self::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Try to get the frame as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Simple(s) => Some(s.as_bytes()),
            Self::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get the frame as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the frame as an array.
    pub fn as_array(&self) -> Option<&[Frame]> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Unpack a command invocation into its raw arguments.
    ///
    /// The first element is the command name. Fails unless the frame is a
    /// non-empty array whose elements are all bulk strings.
    pub fn into_command_args(self) -> Result<Vec<Bytes>, ProtocolError> {
        let Self::Array(items) = self else {
            return Err(ProtocolError::NotACommand);
        };
        if items.is_empty() {
            return Err(ProtocolError::NotACommand);
        }
        items
            .into_iter()
            .map(|item| match item {
                Self::Bulk(b) => Ok(b),
                _ => Err(ProtocolError::NotACommand),
            })
            .collect()
    }

    /// Serialize the frame to a buffer.
    ///
    /// OK, PONG, null, empty values and small integers come from
    /// pre-encoded statics.
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            Self::Simple(s) => match s.as_str() {
                "OK" => buf.put_slice(responses::OK),
                "PONG" => buf.put_slice(responses::PONG),
                _ => put_line(buf, b'+', s),
            },
            Self::Error(s) => put_line(buf, b'-', s),
            Self::Integer(n) => {
                if let Some(static_resp) = responses::integer(*n) {
                    buf.put_slice(static_resp);
                } else {
                    buf.put_u8(b':');
                    put_decimal(buf, *n);
                    buf.put_slice(b"\r\n");
                }
            }
            Self::Bulk(data) => {
                if data.is_empty() {
                    buf.put_slice(responses::EMPTY_BULK);
                } else {
                    buf.put_u8(b'$');
                    put_decimal(buf, data.len() as i64);
                    buf.put_slice(b"\r\n");
                    buf.put_slice(data);
                    buf.put_slice(b"\r\n");
                }
            }
            Self::Null => buf.put_slice(responses::NULL_BULK),
            Self::Array(frames) => {
                if frames.is_empty() {
                    buf.put_slice(responses::EMPTY_ARRAY);
                } else {
                    buf.put_u8(b'*');
                    put_decimal(buf, frames.len() as i64);
                    buf.put_slice(b"\r\n");
                    for frame in frames {
                        frame.serialize(buf);
                    }
                }
            }
        }
    }

    /// Upper bound on the serialized size of this frame.
    pub fn serialized_size(&self) -> usize {
        // sign plus 19 digits covers every i64
        const MAX_DIGITS: usize = 20;
        match self {
            Self::Simple(s) | Self::Error(s) => 1 + s.len() + 2,
            Self::Integer(_) => 1 + MAX_DIGITS + 2,
            Self::Bulk(data) => 1 + MAX_DIGITS + 2 + data.len() + 2,
            Self::Null => 5,
            Self::Array(frames) => {
                1 + MAX_DIGITS + 2 + frames.iter().map(Frame::serialized_size).sum::<usize>()
            }
        }
    }

    /// Convert to a `Vec<u8>` for convenience.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        self.serialize(&mut buf);
        buf.to_vec()
    }
}

/// Write a status or error line. CR and LF inside `text` become spaces so
/// the line cannot end early.
fn put_line(buf: &mut BytesMut, marker: u8, text: &str) {
    buf.put_u8(marker);
    if memchr::memchr2(b'\r', b'\n', text.as_bytes()).is_none() {
        buf.put_slice(text.as_bytes());
    } else {
        buf.extend(text.bytes().map(|b| match b {
            b'\r' | b'\n' => b' ',
            b => b,
        }));
    }
    buf.put_slice(b"\r\n");
}

/// Write `n` in decimal without going through a `String`.
fn put_decimal(buf: &mut BytesMut, n: i64) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    let mut rest = n.unsigned_abs();
    loop {
        i -= 1;
        digits[i] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    if n < 0 {
        i -= 1;
        digits[i] = b'-';
    }
    buf.put_slice(&digits[i..]);
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(s) => write!(f, "Simple({s:?})"),
            Self::Error(s) => write!(f, "Error({s:?})"),
            Self::Integer(n) => write!(f, "Integer({n})"),
            Self::Bulk(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "Bulk({s:?})"),
                Err(_) => write!(f, "Bulk({b:?})"),
            },
            Self::Null => write!(f, "Null"),
            Self::Array(arr) => f.debug_list().entries(arr).finish(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(s) => write!(f, "+{s}"),
            Self::Error(s) => write!(f, "-{s}"),
            Self::Integer(n) => write!(f, ":{n}"),
            Self::Bulk(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "${s}"),
                Err(_) => write!(f, "$<{} bytes>", b.len()),
            },
            Self::Null => write!(f, "(nil)"),
            Self::Array(arr) => {
                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {frame}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Frame {
    fn from(s: &str) -> Self {
        Self::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Bytes> for Frame {
    fn from(b: Bytes) -> Self {
        Self::Bulk(b)
    }
}

impl From<i64> for Frame {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<Vec<Frame>> for Frame {
    fn from(frames: Vec<Frame>) -> Self {
        Self::Array(frames)
    }
}
