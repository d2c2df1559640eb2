//! RESP protocol parser.
//!
//! The parser is incremental: bytes are appended as they arrive and
//! [`RespParser::parse`] yields a frame only once every byte of it is
//! buffered. Nothing is consumed until a unit is complete, so a frame split
//! across reads decodes exactly like one that arrived whole.

use super::frame::Frame;
use super::markers;
use crate::error::ProtocolError;
use crate::{MAX_ARGUMENTS, MAX_BULK_SIZE, MAX_INLINE_SIZE, MAX_NESTING};
use bytes::{Buf, Bytes, BytesMut};
use memchr::memchr;

/// RESP protocol parser with streaming support.
///
/// # Usage
///
/// ```ignore
/// let mut parser = RespParser::new();
/// parser.extend(data);
///
/// loop {
///     match parser.parse() {
///         Ok(Some(frame)) => { /* handle frame */ }
///         Ok(None) => break, // need more bytes
///         Err(e) => { /* report e; the bad unit is already skipped */ }
///     }
/// }
/// ```
///
/// # Limits
///
/// - Maximum bulk string size: 512MB
/// - Maximum array elements: 1M
/// - Maximum header line: 64KB
/// - Maximum array nesting: 32
#[derive(Debug, Default)]
pub struct RespParser {
    buffer: BytesMut,
}

/// Why a decode attempt stopped.
enum Failure {
    /// The unit is not fully buffered yet.
    Incomplete,
    /// The unit is malformed; decoding resumes at the given offset.
    Invalid(ProtocolError, usize),
}

impl RespParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Create a parser with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Add data to the parser buffer.
    #[inline]
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Direct access to the buffer, for reading straight into it.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Check if the buffer holds no pending bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of buffered bytes not yet decoded.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to decode one complete frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was decoded
    /// - `Ok(None)` if more data is needed (nothing is consumed)
    /// - `Err(e)` if the next unit is malformed; its bytes are discarded so
    ///   the following call starts fresh on the rest of the stream
    pub fn parse(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let (result, consumed) = {
            let mut cursor = Cursor {
                buf: &self.buffer,
                pos: 0,
            };
            let result = cursor.frame(0);
            (result, cursor.pos)
        };

        match result {
            Ok(frame) => {
                self.buffer.advance(consumed);
                Ok(Some(frame))
            }
            Err(Failure::Incomplete) => Ok(None),
            Err(Failure::Invalid(err, resume)) => {
                let skip = resume.min(self.buffer.len());
                self.buffer.advance(skip);
                Err(err)
            }
        }
    }
}

/// Read position over the buffered bytes for one decode attempt.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn frame(&mut self, depth: usize) -> Result<Frame, Failure> {
        let line = self.line()?;
        let Some((&marker, body)) = line.split_first() else {
            return Err(self.invalid(ProtocolError::InvalidTypeMarker(b'\r')));
        };

        match marker {
            markers::SIMPLE_STRING => Ok(Frame::Simple(self.text(body)?)),
            markers::ERROR => Ok(Frame::Error(self.text(body)?)),
            markers::INTEGER => Ok(Frame::Integer(self.integer(body)?)),
            markers::BULK_STRING => self.bulk(body),
            markers::ARRAY => self.array(body, depth),
            _ => Err(self.invalid(ProtocolError::InvalidTypeMarker(marker))),
        }
    }

    fn bulk(&mut self, header: &[u8]) -> Result<Frame, Failure> {
        let len = self.integer(header)?;
        if len == -1 {
            return Ok(Frame::Null);
        }
        if len < -1 {
            return Err(self.invalid(ProtocolError::InvalidBulkLength(len)));
        }

        let len = len as usize;
        if len > MAX_BULK_SIZE {
            return Err(self.invalid(ProtocolError::BulkTooLarge {
                len,
                max: MAX_BULK_SIZE,
            }));
        }

        let end = self.pos + len;
        if self.buf.len() < end + 2 {
            return Err(Failure::Incomplete);
        }
        if &self.buf[end..end + 2] != b"\r\n" {
            return Err(Failure::Invalid(ProtocolError::MissingCrlf, end + 2));
        }

        let data = Bytes::copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end + 2;
        Ok(Frame::Bulk(data))
    }

    fn array(&mut self, header: &[u8], depth: usize) -> Result<Frame, Failure> {
        let len = self.integer(header)?;
        if len == -1 {
            return Ok(Frame::Null);
        }
        if len < -1 {
            return Err(self.invalid(ProtocolError::InvalidArrayLength(len)));
        }

        let len = len as usize;
        if len > MAX_ARGUMENTS {
            return Err(self.invalid(ProtocolError::TooManyElements {
                count: len,
                max: MAX_ARGUMENTS,
            }));
        }
        if len > 0 && depth >= MAX_NESTING {
            return Err(self.invalid(ProtocolError::NestingTooDeep(MAX_NESTING)));
        }

        let mut frames = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            frames.push(self.frame(depth + 1)?);
        }
        Ok(Frame::Array(frames))
    }

    /// Take the next CRLF-terminated line, without the terminator.
    fn line(&mut self) -> Result<&'a [u8], Failure> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        match find_crlf(rest) {
            Some(end) => {
                let start = self.pos;
                self.pos += end + 2;
                Ok(&buf[start..start + end])
            }
            None if rest.len() > MAX_INLINE_SIZE => Err(Failure::Invalid(
                ProtocolError::LineTooLong {
                    len: rest.len(),
                    max: MAX_INLINE_SIZE,
                },
                buf.len(),
            )),
            None => Err(Failure::Incomplete),
        }
    }

    fn text(&self, body: &[u8]) -> Result<String, Failure> {
        std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|_| self.invalid(ProtocolError::InvalidUtf8))
    }

    fn integer(&self, body: &[u8]) -> Result<i64, Failure> {
        std::str::from_utf8(body)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                self.invalid(ProtocolError::InvalidInteger(
                    String::from_utf8_lossy(body).into_owned(),
                ))
            })
    }

    /// A malformed unit whose bad line ends at the current position.
    fn invalid(&self, err: ProtocolError) -> Failure {
        Failure::Invalid(err, self.pos)
    }
}

/// Find CRLF in a byte slice.
///
/// Uses memchr for the `\r` search, then verifies `\n` follows.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while offset < buf.len().saturating_sub(1) {
        match memchr(b'\r', &buf[offset..]) {
            Some(pos) => {
                let abs_pos = offset + pos;
                if abs_pos + 1 < buf.len() && buf[abs_pos + 1] == b'\n' {
                    return Some(abs_pos);
                }
                offset = abs_pos + 1;
            }
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(data: &[u8]) -> Vec<Result<Frame, ProtocolError>> {
        let mut parser = RespParser::new();
        parser.extend(data);
        let mut out = Vec::new();
        loop {
            match parser.parse() {
                Ok(Some(frame)) => out.push(Ok(frame)),
                Ok(None) => break,
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    #[test]
    fn test_parse_scalars() {
        let frames = parse_all(b"+OK\r\n-ERR bad\r\n:42\r\n:-7\r\n$3\r\nbar\r\n$-1\r\n$0\r\n\r\n");
        assert_eq!(
            frames,
            vec![
                Ok(Frame::simple("OK")),
                Ok(Frame::error("ERR bad")),
                Ok(Frame::integer(42)),
                Ok(Frame::integer(-7)),
                Ok(Frame::bulk("bar")),
                Ok(Frame::Null),
                Ok(Frame::bulk("")),
            ]
        );
    }

    #[test]
    fn test_parse_command_array() {
        let frames = parse_all(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
        assert_eq!(frames, vec![Ok(Frame::command(["SET", "key", "value"]))]);
    }

    #[test]
    fn test_parse_empty_and_null_array() {
        let frames = parse_all(b"*0\r\n*-1\r\n");
        assert_eq!(frames, vec![Ok(Frame::empty_array()), Ok(Frame::Null)]);
    }

    #[test]
    fn test_parse_streaming() {
        let data = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        let mut parser = RespParser::new();

        for (i, byte) in data.iter().enumerate() {
            parser.extend(&[*byte]);
            let result = parser.parse().unwrap();
            if i + 1 < data.len() {
                assert!(result.is_none(), "frame completed early at byte {i}");
            } else {
                assert_eq!(result, Some(Frame::command(["ECHO", "hello"])));
            }
        }
        assert!(parser.is_empty());
    }

    #[test]
    fn test_incomplete_consumes_nothing() {
        let mut parser = RespParser::new();
        parser.extend(b"$10\r\nhello");
        assert_eq!(parser.parse(), Ok(None));
        assert_eq!(parser.len(), 10);
    }

    #[test]
    fn test_malformed_header_resets_and_continues() {
        let frames = parse_all(b"*abc\r\n*1\r\n$4\r\nPING\r\n");
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(ProtocolError::InvalidInteger(_))));
        assert_eq!(frames[1], Ok(Frame::command(["PING"])));
    }

    #[test]
    fn test_bad_element_discards_whole_array() {
        let frames = parse_all(b"*2\r\n$3\r\nGET\r\n$x\r\n:5\r\n");
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(ProtocolError::InvalidInteger(_))));
        assert_eq!(frames[1], Ok(Frame::integer(5)));
    }

    #[test]
    fn test_bulk_missing_crlf() {
        let frames = parse_all(b"$3\r\nfooXY:1\r\n");
        assert_eq!(
            frames,
            vec![Err(ProtocolError::MissingCrlf), Ok(Frame::integer(1))]
        );
    }

    #[test]
    fn test_unknown_marker() {
        let frames = parse_all(b"?what\r\n+PONG\r\n");
        assert_eq!(
            frames,
            vec![
                Err(ProtocolError::InvalidTypeMarker(b'?')),
                Ok(Frame::pong())
            ]
        );
    }

    #[test]
    fn test_bulk_too_large() {
        let frames = parse_all(b"$999999999999\r\n");
        assert!(matches!(
            frames[0],
            Err(ProtocolError::BulkTooLarge { .. })
        ));
    }

    #[test]
    fn test_negative_lengths_rejected() {
        let frames = parse_all(b"$-5\r\n*-2\r\n");
        assert_eq!(
            frames,
            vec![
                Err(ProtocolError::InvalidBulkLength(-5)),
                Err(ProtocolError::InvalidArrayLength(-2)),
            ]
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = Vec::new();
        for _ in 0..=MAX_NESTING {
            data.extend_from_slice(b"*1\r\n");
        }
        data.extend_from_slice(b":1\r\n");
        let frames = parse_all(&data);
        assert!(frames
            .iter()
            .any(|f| *f == Err(ProtocolError::NestingTooDeep(MAX_NESTING))));
    }

    #[test]
    fn test_line_too_long() {
        let mut parser = RespParser::new();
        parser.extend(&vec![b'+'; MAX_INLINE_SIZE + 10]);
        assert!(matches!(
            parser.parse(),
            Err(ProtocolError::LineTooLong { .. })
        ));
        assert!(parser.is_empty());
    }

    #[test]
    fn test_find_crlf_edge_cases() {
        assert_eq!(find_crlf(b""), None);
        assert_eq!(find_crlf(b"\r"), None);
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"a\rb\r\n"), Some(3));
        assert_eq!(find_crlf(b"abc\n"), None);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_frame() -> impl Strategy<Value = Frame> {
        let leaf = prop_oneof![
            "[a-zA-Z0-9 ]{0,40}".prop_map(Frame::Simple),
            "[a-zA-Z0-9 ]{0,40}".prop_map(Frame::Error),
            any::<i64>().prop_map(Frame::Integer),
            prop::collection::vec(any::<u8>(), 0..200).prop_map(|v| Frame::Bulk(Bytes::from(v))),
            Just(Frame::Null),
        ];
        leaf.prop_recursive(3, 32, 8, |inner| {
            prop::collection::vec(inner, 0..8).prop_map(Frame::Array)
        })
    }

    proptest! {
        /// Parser should never panic on arbitrary input.
        #[test]
        fn parser_never_panics(data: Vec<u8>) {
            let mut parser = RespParser::new();
            parser.extend(&data);
            for _ in 0..data.len() + 1 {
                if let Ok(None) = parser.parse() {
                    break;
                }
            }
        }

        /// Decoding an encoded frame yields the same frame.
        #[test]
        fn encoded_frames_decode_back(frame in arb_frame()) {
            let mut parser = RespParser::new();
            parser.extend(&frame.to_vec());
            prop_assert_eq!(parser.parse(), Ok(Some(frame)));
            prop_assert!(parser.is_empty());
        }

        /// Where the bytes are split between reads does not matter.
        #[test]
        fn split_point_is_irrelevant(frame in arb_frame(), split in any::<prop::sample::Index>()) {
            let bytes = frame.to_vec();
            let at = split.index(bytes.len() + 1);
            let mut parser = RespParser::new();
            parser.extend(&bytes[..at]);
            let early = parser.parse();
            if at < bytes.len() {
                prop_assert_eq!(early, Ok(None));
                parser.extend(&bytes[at..]);
                prop_assert_eq!(parser.parse(), Ok(Some(frame)));
            } else {
                prop_assert_eq!(early, Ok(Some(frame)));
            }
        }

        /// find_crlf should always find CRLF if present.
        #[test]
        fn find_crlf_always_finds(prefix in prop::collection::vec(any::<u8>(), 0..100),
                                  suffix in prop::collection::vec(any::<u8>(), 0..100)) {
            let prefix: Vec<u8> = prefix.into_iter()
                .filter(|&b| b != b'\r' && b != b'\n')
                .collect();

            let mut data = prefix.clone();
            data.extend_from_slice(b"\r\n");
            data.extend_from_slice(&suffix);

            prop_assert_eq!(find_crlf(&data), Some(prefix.len()));
        }
    }
}
