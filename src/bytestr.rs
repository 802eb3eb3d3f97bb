//! Owned-or-static string values
//!
//! Every string the core stores carries its owner explicitly: either the
//! value was allocated for this request and is freed when dropped, or it
//! points at static program data and freeing it is not our business.
//! Well-known header names and the protocol version are `Static`; anything
//! copied out of the wire bytes is `Owned`.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A string that is either owned by the event or borrowed from static data.
#[derive(Debug, Clone)]
pub enum ByteStr {
    /// Heap-allocated, freed on drop
    Owned(String),
    /// Static program data, never freed
    Static(&'static str),
}

impl ByteStr {
    /// View as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            ByteStr::Owned(s) => s.as_str(),
            ByteStr::Static(s) => s,
        }
    }

    /// True when the value points at static data
    #[inline]
    pub fn is_static(&self) -> bool {
        matches!(self, ByteStr::Static(_))
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    /// True when empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

// Equality and hashing go through the string content so that
// Owned("x") and Static("x") are the same map key.

impl PartialEq for ByteStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ByteStr {}

impl PartialEq<str> for ByteStr {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl Hash for ByteStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

// Lets maps keyed by ByteStr be probed with a plain &str, so lookups
// never allocate.
impl Borrow<str> for ByteStr {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for ByteStr {
    fn from(s: String) -> Self {
        ByteStr::Owned(s)
    }
}

impl From<&'static str> for ByteStr {
    fn from(s: &'static str) -> Self {
        ByteStr::Static(s)
    }
}

impl fmt::Display for ByteStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
