//! Immutable Value Container
//!
//! The cache's value type and the unit exchanged with peers.

use std::fmt;

use bytes::Bytes;

use super::lru::Weighted;

/// Immutable view over cached bytes.
///
/// Cloning is cheap (reference counted) and never exposes a mutable alias;
/// [`ByteView::to_vec`] hands callers their own copy.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Create a view holding a private copy of `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the view is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the bytes read-only
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy the bytes out
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// The underlying shared buffer, for zero-copy response bodies
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl Weighted for ByteView {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}
