//! Core type definitions for windb.

use std::fmt;

/// Disambiguating sequence number embedded in every binary key.
///
/// Sequence numbers are 31-bit and wrap back to zero. A single counter is
/// shared by every key of a store, so the values seen for one key are
/// increasing between wraps but not dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    /// Lowest sequence number; also the lower range-bound sentinel.
    pub const ZERO: Self = Self(0);

    /// Highest sequence number; also the upper range-bound sentinel.
    pub const MAX: Self = Self(0x7FFF_FFFF);

    /// Creates a sequence number, masking to 31 bits.
    #[must_use]
    pub const fn new(seq: u32) -> Self {
        Self(seq & Self::MAX.0)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the next sequence number, wrapping from `MAX` to `ZERO`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1) & Self::MAX.0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}
