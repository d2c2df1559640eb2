//! Pre-encoded replies for the most common responses.
//!
//! The encoder writes these slices directly instead of formatting them.

/// Static OK response: +OK\r\n
pub static OK: &[u8] = b"+OK\r\n";

/// Static PONG response: +PONG\r\n
pub static PONG: &[u8] = b"+PONG\r\n";

/// Static NULL bulk string: $-1\r\n
pub static NULL_BULK: &[u8] = b"$-1\r\n";

/// Static empty bulk string: $0\r\n\r\n
pub static EMPTY_BULK: &[u8] = b"$0\r\n\r\n";

/// Static empty array: *0\r\n
pub static EMPTY_ARRAY: &[u8] = b"*0\r\n";

/// Counts and lengths below 16 cover most integer replies.
static SMALL_INTEGERS: [&[u8]; 16] = [
    b":0\r\n", b":1\r\n", b":2\r\n", b":3\r\n", b":4\r\n", b":5\r\n", b":6\r\n", b":7\r\n",
    b":8\r\n", b":9\r\n", b":10\r\n", b":11\r\n", b":12\r\n", b":13\r\n", b":14\r\n",
    b":15\r\n",
];

/// Get a pre-encoded integer response if available.
#[inline]
pub fn integer(n: i64) -> Option<&'static [u8]> {
    usize::try_from(n)
        .ok()
        .and_then(|i| SMALL_INTEGERS.get(i).copied())
}
