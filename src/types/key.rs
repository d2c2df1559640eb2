//! Keyspace key type.

use bytes::Bytes;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// A binary-safe key.
///
/// Keys are cheap to clone (`Bytes` underneath) and hash exactly like the
/// `[u8]` they borrow as, so maps keyed by `Key` can be looked up with a plain
/// byte slice.
#[derive(Clone, Default)]
pub struct Key(Bytes);

impl Key {
    /// Create a new key from bytes.
    #[inline]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Create a key from a static string.
    #[inline]
    pub const fn from_static(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }

    /// Returns the key as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the underlying `Bytes` handle.
    #[inline]
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Try to interpret the key as a UTF-8 string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Check if this key matches a glob-style pattern.
    ///
    /// Supports:
    /// - `*` matches any sequence of bytes
    /// - `?` matches any single byte
    /// - `[abc]`, `[^abc]` and `[a-z]` character classes
    /// - `\` escapes the next byte
    pub fn matches_pattern(&self, pattern: &[u8]) -> bool {
        glob_match(pattern, &self.0)
    }
}

impl Deref for Key {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Key {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Key {
    #[inline]
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "Key({s:?})"),
            None => write!(f, "Key({:?})", self.as_bytes()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => {
                for byte in self.as_bytes() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Key {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<&[u8]> for Key {
    #[inline]
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for Key {
    #[inline]
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Key> for Bytes {
    #[inline]
    fn from(key: Key) -> Self {
        key.0
    }
}

/// Glob matching with single-star backtracking.
///
/// Iterative, so hostile patterns cannot blow the stack.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern position after the last `*` and the text position it resumes at.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                star = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(b'?') => Some(1),
            Some(b'[') => match match_class(&pattern[p..], text[t]) {
                Some((true, width)) => Some(width),
                Some((false, _)) => None,
                // unterminated class: treat `[` literally
                None => (text[t] == b'[').then_some(1),
            },
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == text[t]).then_some(2),
            Some(&c) => (c == text[t]).then_some(1),
            None => None,
        };

        match (step, star) {
            (Some(width), _) => {
                p += width;
                t += 1;
            }
            (None, Some((star_p, star_t))) => {
                p = star_p;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one byte against a class like `[abc]`, `[^abc]` or `[a-z]`.
///
/// Returns whether it matched and the width of the class in the pattern,
/// or `None` if the class is not terminated.
fn match_class(pattern: &[u8], ch: u8) -> Option<(bool, usize)> {
    let mut i = 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == ch;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&ch);
            i += 3;
        } else {
            matched |= pattern[i] == ch;
            i += 1;
        }
    }

    (i < pattern.len()).then_some((matched != negate, i + 1))
}
