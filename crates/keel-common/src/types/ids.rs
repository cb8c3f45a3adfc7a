//! Core identifier types for KeelDB.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page identifier - uniquely identifies a page in the database file.
///
/// Pages are the fundamental unit of storage in KeelDB. Each page is
/// identified by a 32-bit signed integer; the sentinel value `-1`
/// ([`PageId::INVALID`]) marks a buffer frame that holds no page.
///
/// Identifiers are handed out by the buffer pool's monotonic allocation
/// counter and are never reused, even after the page is deleted.
///
/// # Example
///
/// ```rust
/// use keel_common::types::PageId;
///
/// let page = PageId::new(42);
/// assert_eq!(page.as_i32(), 42);
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(i32);

impl PageId {
    /// Invalid page ID constant, used as a sentinel value.
    pub const INVALID: Self = Self(-1);

    /// First page ID handed out by a fresh allocation counter.
    pub const FIRST: Self = Self(0);

    /// Creates a new `PageId` from a raw i32 value.
    #[inline]
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw i32 value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns the next page ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid page ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Creates a PageId from bytes (big-endian).
    #[inline]
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(i32::from_be_bytes(bytes))
    }

    /// Converts to bytes (big-endian).
    #[inline]
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PageId(INVALID)")
        } else {
            write!(f, "PageId({})", self.0)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PageId {
    #[inline]
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<PageId> for i32 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id() {
        let page = PageId::new(42);
        assert_eq!(page.as_i32(), 42);
        assert!(page.is_valid());
        assert!(!PageId::INVALID.is_valid());

        let next = page.next();
        assert_eq!(next.as_i32(), 43);

        // Byte conversion
        let bytes = page.to_be_bytes();
        assert_eq!(PageId::from_be_bytes(bytes), page);
    }

    #[test]
    fn test_sentinel() {
        assert_eq!(PageId::INVALID.as_i32(), -1);
        assert_eq!(PageId::FIRST.as_i32(), 0);
        assert!(PageId::FIRST.is_valid());
    }

    #[test]
    fn test_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::INVALID < PageId::FIRST);
    }

    #[test]
    fn test_display() {
        assert_eq!(PageId::new(7).to_string(), "7");
        assert_eq!(format!("{:?}", PageId::INVALID), "PageId(INVALID)");
        assert_eq!(format!("{:?}", PageId::new(7)), "PageId(7)");
    }
}
