//! Model-checking harness.
//!
//! [`ModelHarness`] applies operations to a real store and to a simple
//! reference model of the retention rules, and reports the first
//! divergence between the two.

use crate::fixtures::TestStore;
use crate::generators::WindowOp;
use std::collections::BTreeMap;
use windb_core::WindowStoreConfig;

/// A store paired with a reference model.
///
/// The model keeps every accepted write in a map keyed by
/// `(key, timestamp)` and forgets everything in segments at or below
/// `newest - num_segments`, exactly as the ring does.
pub struct ModelHarness {
    store: TestStore<[u8], u64>,
    model: BTreeMap<(Vec<u8>, i64), Vec<u64>>,
    retain_duplicates: bool,
    interval_ms: i64,
    num_segments: i64,
    newest: Option<i64>,
}

impl ModelHarness {
    /// Creates a harness over a memory-backed store.
    pub fn new(config: WindowStoreConfig) -> Self {
        let retain_duplicates = config.retain_duplicates;
        let num_segments = i64::try_from(config.num_segments).expect("num_segments fits i64");
        let interval_ms = config.segment_interval_ms();
        Self {
            store: TestStore::memory(config),
            model: BTreeMap::new(),
            retain_duplicates,
            interval_ms,
            num_segments,
            newest: None,
        }
    }

    /// Returns the store under test.
    pub fn store(&self) -> &TestStore<[u8], u64> {
        &self.store
    }

    /// Applies `op` to store and model.
    ///
    /// # Errors
    ///
    /// Returns a description of the first divergence.
    pub fn apply(&mut self, op: &WindowOp) -> Result<(), String> {
        match op {
            WindowOp::Put {
                key,
                value,
                timestamp,
            } => {
                self.store
                    .put_with_timestamp(key, value, *timestamp)
                    .map_err(|e| format!("put failed: {e}"))?;
                self.model_put(key, *value, *timestamp);
            }
            WindowOp::Fetch { key, from, to } => {
                let actual = self
                    .store
                    .fetch(key, *from, *to)
                    .map_err(|e| format!("fetch failed: {e}"))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("iteration failed: {e}"))?;
                let expected = self.model_fetch(key, *from, *to);
                if actual != expected {
                    return Err(format!(
                        "fetch({key:?}, {from}, {to}): expected {expected:?}, got {actual:?}"
                    ));
                }
            }
            WindowOp::Flush => {
                self.store.flush().map_err(|e| format!("flush failed: {e}"))?;
            }
        }
        self.check_segments()
    }

    /// Applies every operation, stopping at the first divergence.
    ///
    /// # Errors
    ///
    /// Returns the index of the failing operation and the divergence.
    pub fn run(&mut self, ops: &[WindowOp]) -> Result<(), String> {
        for (i, op) in ops.iter().enumerate() {
            self.apply(op).map_err(|e| format!("op {i} {op:?}: {e}"))?;
        }
        Ok(())
    }

    fn model_put(&mut self, key: &[u8], value: u64, timestamp: i64) {
        if timestamp < 0 {
            return;
        }
        let segment = timestamp.div_euclid(self.interval_ms);
        if !self.newest.is_some_and(|newest| segment <= newest) {
            self.newest = Some(segment);
            let interval_ms = self.interval_ms;
            let horizon = segment - self.num_segments;
            self.model
                .retain(|(_, ts), _| ts.div_euclid(interval_ms) > horizon);
        }
        if self.is_expired(segment) {
            return;
        }
        let values = self.model.entry((key.to_vec(), timestamp)).or_default();
        if !self.retain_duplicates {
            values.clear();
        }
        values.push(value);
    }

    fn model_fetch(&self, key: &[u8], from: i64, to: i64) -> Vec<(i64, u64)> {
        if to < from {
            return Vec::new();
        }
        self.model
            .range((key.to_vec(), from)..=(key.to_vec(), to))
            .flat_map(|((_, ts), values)| values.iter().map(move |v| (*ts, *v)))
            .collect()
    }

    fn is_expired(&self, segment: i64) -> bool {
        self.newest
            .is_some_and(|newest| segment <= newest - self.num_segments)
    }

    fn check_segments(&self) -> Result<(), String> {
        let ids = self.store.segment_ids();
        if ids.len() as i64 > self.num_segments {
            return Err(format!("{} live segments, capacity {}", ids.len(), self.num_segments));
        }
        let current = self.store.current_segment_id();
        if current != self.newest {
            return Err(format!(
                "current segment: expected {:?}, got {current:?}",
                self.newest
            ));
        }
        match ids.iter().find(|id| self.is_expired(**id)) {
            Some(id) => Err(format!("expired segment {id} is still live")),
            None => Ok(()),
        }
    }
}
