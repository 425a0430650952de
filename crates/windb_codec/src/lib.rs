//! # windb Codec
//!
//! Pluggable (de)serialization of user keys and values.
//!
//! A windowed store never interprets user data: keys are turned into
//! bytes with [`Encode`] and values round-trip through [`Encode`] and
//! [`Decode`]. Callers choose the representation by choosing the type:
//!
//! - raw bytes: `Vec<u8>` / `[u8]`
//! - text: `String` / `str` (UTF-8 checked on decode)
//! - integers: `i32`, `i64`, `u32`, `u64` as fixed-width big-endian
//! - any serde type: wrap it in [`Cbor`]
//!
//! Key encodings must be deterministic: equal keys must produce equal
//! bytes, since fetches match the encoded key exactly.
//!
//! ## Usage
//!
//! ```
//! use windb_codec::{Decode, Encode};
//!
//! let bytes = 42i64.encode().unwrap();
//! assert_eq!(bytes.len(), 8);
//! assert_eq!(i64::decode(&bytes).unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;

pub use cbor::Cbor;
pub use error::{CodecError, CodecResult};

/// Trait for types that can be turned into bytes.
pub trait Encode {
    /// Encode this value to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be rebuilt from bytes.
pub trait Decode: Sized {
    /// Decode a value from bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        (**self).encode()
    }
}

impl Encode for [u8] {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.clone())
    }
}

impl Decode for Vec<u8> {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl Encode for str {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Encode for String {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decode for String {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

macro_rules! fixed_width_int {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> CodecResult<Vec<u8>> {
                    Ok(self.to_be_bytes().to_vec())
                }
            }

            impl Decode for $ty {
                fn decode(bytes: &[u8]) -> CodecResult<Self> {
                    let array = bytes.try_into().map_err(|_| CodecError::InvalidLength {
                        expected: std::mem::size_of::<$ty>(),
                        actual: bytes.len(),
                    })?;
                    Ok(<$ty>::from_be_bytes(array))
                }
            }
        )*
    };
}

fixed_width_int!(i32, i64, u32, u64);
