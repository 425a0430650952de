//! CBOR codec for serde types.

use crate::error::{CodecError, CodecResult};
use crate::{Decode, Encode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Wraps any serde type so it is stored as CBOR.
///
/// ```
/// use windb_codec::{Cbor, Decode, Encode};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Click {
///     page: String,
///     count: u32,
/// }
///
/// let click = Cbor(Click { page: "/".into(), count: 3 });
/// let bytes = click.encode().unwrap();
/// let back = Cbor::<Click>::decode(&bytes).unwrap();
/// assert_eq!(back.0, click.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cbor<T>(pub T);

impl<T> Cbor<T> {
    /// Unwraps the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Cbor<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Serialize> Encode for Cbor<T> {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(&self.0, &mut out)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(out)
    }
}

impl<T: DeserializeOwned> Decode for Cbor<T> {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        ciborium::de::from_reader(bytes)
            .map(Cbor)
            .map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}
