//! Binary key codec.
//!
//! Every stored record is addressed by one binary key:
//!
//! ```text
//! | user key (N) | timestamp (8, BE, sign bit flipped) | sequence (4, BE) |
//! ```
//!
//! Flipping the timestamp's sign bit makes the big-endian bytes sort the
//! same way as the signed value, so for a fixed user key the byte order of
//! binary keys equals the order of `(timestamp, sequence)`. Range scans for
//! one key are bounded by `(key, from, 0)` and `(key, to, MAX)`.

use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

/// Width of the encoded timestamp.
pub const TIMESTAMP_SIZE: usize = 8;

/// Width of the encoded sequence number.
pub const SEQNUM_SIZE: usize = 4;

/// Bytes appended after the user key.
pub const SUFFIX_SIZE: usize = TIMESTAMP_SIZE + SEQNUM_SIZE;

const SIGN_BIT: u64 = 1 << 63;

/// Builds the binary key for `(key, timestamp, seq)`.
///
/// Encoded order follows `(key, timestamp, seq)` only between keys of equal
/// length; a key that is a byte prefix of another can interleave with it,
/// so range scans must still compare the user-key part.
#[must_use]
pub fn to_binary_key(key: &[u8], timestamp: i64, seq: SequenceNumber) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + SUFFIX_SIZE);
    out.extend_from_slice(key);
    out.extend_from_slice(&((timestamp as u64) ^ SIGN_BIT).to_be_bytes());
    out.extend_from_slice(&seq.as_u32().to_be_bytes());
    out
}

/// Extracts the timestamp from a binary key.
///
/// # Errors
///
/// Returns `MalformedKey` if the key is shorter than the fixed suffix.
pub fn timestamp_from_binary_key(binary_key: &[u8]) -> CoreResult<i64> {
    let start = suffix_start(binary_key)?;
    let mut buf = [0u8; TIMESTAMP_SIZE];
    buf.copy_from_slice(&binary_key[start..start + TIMESTAMP_SIZE]);
    Ok((u64::from_be_bytes(buf) ^ SIGN_BIT) as i64)
}

/// Extracts the sequence number from a binary key.
///
/// # Errors
///
/// Returns `MalformedKey` if the key is shorter than the fixed suffix.
pub fn seqnum_from_binary_key(binary_key: &[u8]) -> CoreResult<SequenceNumber> {
    let start = suffix_start(binary_key)? + TIMESTAMP_SIZE;
    let mut buf = [0u8; SEQNUM_SIZE];
    buf.copy_from_slice(&binary_key[start..]);
    Ok(SequenceNumber::new(u32::from_be_bytes(buf)))
}

/// Returns the user-key prefix of a binary key.
///
/// # Errors
///
/// Returns `MalformedKey` if the key is shorter than the fixed suffix.
pub fn key_from_binary_key(binary_key: &[u8]) -> CoreResult<&[u8]> {
    let start = suffix_start(binary_key)?;
    Ok(&binary_key[..start])
}

fn suffix_start(binary_key: &[u8]) -> CoreResult<usize> {
    binary_key
        .len()
        .checked_sub(SUFFIX_SIZE)
        .ok_or_else(|| CoreError::malformed_key(binary_key.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout_is_key_then_suffix() {
        let binary = to_binary_key(b"ab", 1, SequenceNumber::new(2));
        assert_eq!(binary.len(), 2 + SUFFIX_SIZE);
        assert_eq!(&binary[..2], b"ab");
        assert_eq!(&binary[2..10], &[0x80, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&binary[10..], &[0, 0, 0, 2]);
    }

    #[test]
    fn decode_parts() {
        let binary = to_binary_key(b"user-7", 1_700_000_000_000, SequenceNumber::new(9));
        assert_eq!(timestamp_from_binary_key(&binary).unwrap(), 1_700_000_000_000);
        assert_eq!(seqnum_from_binary_key(&binary).unwrap(), SequenceNumber::new(9));
        assert_eq!(key_from_binary_key(&binary).unwrap(), b"user-7");
    }

    #[test]
    fn empty_user_key() {
        let binary = to_binary_key(b"", -5, SequenceNumber::MAX);
        assert_eq!(key_from_binary_key(&binary).unwrap(), b"");
        assert_eq!(timestamp_from_binary_key(&binary).unwrap(), -5);
    }

    #[test]
    fn short_key_is_malformed() {
        let result = timestamp_from_binary_key(&[0u8; SUFFIX_SIZE - 1]);
        assert!(matches!(
            result,
            Err(CoreError::MalformedKey { len }) if len == SUFFIX_SIZE - 1
        ));
    }

    #[test]
    fn sentinels_bracket_all_sequences() {
        let low = to_binary_key(b"k", 10, SequenceNumber::ZERO);
        let high = to_binary_key(b"k", 10, SequenceNumber::MAX);
        let mid = to_binary_key(b"k", 10, SequenceNumber::new(12345));
        assert!(low <= mid && mid <= high);
    }

    #[test]
    fn prefix_keys_can_interleave() {
        let short = to_binary_key(b"a", i64::MAX, SequenceNumber::ZERO);
        let long = to_binary_key(b"a\x00", 0, SequenceNumber::ZERO);
        // (b"a", MAX) sorts before (b"a\0", 0) as a tuple but not as bytes
        assert!(long < short);
        assert_eq!(key_from_binary_key(&long).unwrap(), b"a\x00");
    }

    proptest! {
        #[test]
        fn order_matches_time_and_sequence(
            key in prop::collection::vec(any::<u8>(), 0..8),
            t1 in any::<i64>(),
            t2 in any::<i64>(),
            s1 in 0u32..=0x7FFF_FFFF,
            s2 in 0u32..=0x7FFF_FFFF,
        ) {
            let a = to_binary_key(&key, t1, SequenceNumber::new(s1));
            let b = to_binary_key(&key, t2, SequenceNumber::new(s2));
            prop_assert_eq!(a.cmp(&b), (t1, s1).cmp(&(t2, s2)));
        }

        #[test]
        fn ordered_tuples_encode_ordered_for_equal_length_keys(
            k1 in prop::collection::vec(any::<u8>(), 4),
            k2 in prop::collection::vec(any::<u8>(), 4),
            t1 in any::<i64>(),
            t2 in any::<i64>(),
            s1 in 0u32..=0x7FFF_FFFF,
            s2 in 0u32..=0x7FFF_FFFF,
        ) {
            let a = to_binary_key(&k1, t1, SequenceNumber::new(s1));
            let b = to_binary_key(&k2, t2, SequenceNumber::new(s2));
            prop_assert_eq!(a.cmp(&b), (&k1, t1, s1).cmp(&(&k2, t2, s2)));
        }

        #[test]
        fn timestamp_survives_encoding(key in prop::collection::vec(any::<u8>(), 0..8), t in any::<i64>()) {
            let binary = to_binary_key(&key, t, SequenceNumber::ZERO);
            prop_assert_eq!(timestamp_from_binary_key(&binary).unwrap(), t);
        }
    }
}
