//! Merging range iterator.

use crate::error::{CoreError, CoreResult};
use crate::key::{key_from_binary_key, timestamp_from_binary_key};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use windb_codec::Decode;
use windb_storage::RangeIter;

/// Ascending-time iterator over one key's records in a time range.
///
/// Per-segment cursors are drained one after another in ascending segment
/// order, which is ascending time order; no merge sort is needed.
///
/// The iterator does not borrow the store. If a segment it reads from is
/// evicted before the iterator is done, the next item is
/// `Err(Storage(Closed))` and the iterator then ends. Callers should call
/// [`close`](Self::close) (or drop the iterator) promptly and not keep it
/// across writes that may advance the retention window.
pub struct WindowStoreIter<V> {
    key: Vec<u8>,
    cursors: VecDeque<RangeIter>,
    _value: PhantomData<fn() -> V>,
}

impl<V: Decode> WindowStoreIter<V> {
    pub(crate) fn new(key: Vec<u8>, cursors: Vec<RangeIter>) -> Self {
        Self {
            key,
            cursors: cursors.into(),
            _value: PhantomData,
        }
    }

    /// Returns an iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Releases every underlying cursor. Later calls to `next` return `None`.
    pub fn close(&mut self) {
        for cursor in &mut self.cursors {
            cursor.close();
        }
        self.cursors.clear();
    }

    fn fail(&mut self, err: CoreError) -> Option<CoreResult<(i64, V)>> {
        self.close();
        Some(Err(err))
    }
}

impl<V: Decode> Iterator for WindowStoreIter<V> {
    type Item = CoreResult<(i64, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cursor = self.cursors.front_mut()?;
            let (binary_key, raw) = match cursor.next() {
                None => {
                    self.cursors.pop_front();
                    continue;
                }
                Some(Err(err)) => return self.fail(err.into()),
                Some(Ok(pair)) => pair,
            };

            match key_from_binary_key(&binary_key) {
                Ok(user_key) if user_key == self.key.as_slice() => {}
                // another key sharing our prefix
                Ok(_) => continue,
                Err(err) => return self.fail(err),
            }

            let item = timestamp_from_binary_key(&binary_key).and_then(|timestamp| {
                V::decode(&raw)
                    .map(|value| (timestamp, value))
                    .map_err(CoreError::from)
            });
            return match item {
                Ok(item) => Some(Ok(item)),
                Err(err) => self.fail(err),
            };
        }
    }
}

impl<V> fmt::Debug for WindowStoreIter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowStoreIter")
            .field("remaining_segments", &self.cursors.len())
            .finish_non_exhaustive()
    }
}
