//! Redis Serialization Protocol (RESP) implementation.
//!
//! [`RespParser`] decodes buffered bytes into frames, [`FrameReader`] drives
//! it over any async byte source, and [`Frame::serialize`] encodes replies.

mod frame;
mod parser;
pub mod responses;
mod stream;

pub use frame::Frame;
pub use parser::RespParser;
pub use stream::FrameReader;

/// Type markers for RESP.
pub mod markers {
    /// Simple string: +
    pub const SIMPLE_STRING: u8 = b'+';
    /// Error: -
    pub const ERROR: u8 = b'-';
    /// Integer: :
    pub const INTEGER: u8 = b':';
    /// Bulk string: $
    pub const BULK_STRING: u8 = b'$';
    /// Array: *
    pub const ARRAY: u8 = b'*';
}
