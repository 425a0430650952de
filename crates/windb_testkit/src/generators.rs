//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random store inputs. Keys are drawn
//! from a small alphabet so that operations collide on the same key and
//! timestamps cluster so that several records share a segment.

use proptest::prelude::*;

/// Strategy for generating user keys, including the empty key.
pub fn user_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8)
}

/// Strategy for generating one of `count` small keys (`k0`, `k1`, ..).
pub fn small_key_strategy(count: usize) -> impl Strategy<Value = Vec<u8>> {
    (0..count.max(1)).prop_map(|i| format!("k{i}").into_bytes())
}

/// Strategy for generating timestamps in `[0, horizon_ms)`.
pub fn timestamp_strategy(horizon_ms: i64) -> impl Strategy<Value = i64> {
    0..horizon_ms.max(1)
}

/// One operation against a windowed store.
#[derive(Debug, Clone)]
pub enum WindowOp {
    /// Write a value
    Put {
        /// User key
        key: Vec<u8>,
        /// Value
        value: u64,
        /// Record timestamp
        timestamp: i64,
    },
    /// Read a time range of one key
    Fetch {
        /// User key
        key: Vec<u8>,
        /// Inclusive lower bound
        from: i64,
        /// Inclusive upper bound
        to: i64,
    },
    /// Flush the store
    Flush,
}

/// Strategy for generating a single operation.
///
/// Puts dominate; fetch bounds may be inverted or reach before the epoch.
pub fn window_op_strategy(keys: usize, horizon_ms: i64) -> impl Strategy<Value = WindowOp> {
    prop_oneof![
        6 => (small_key_strategy(keys), any::<u64>(), timestamp_strategy(horizon_ms))
            .prop_map(|(key, value, timestamp)| WindowOp::Put { key, value, timestamp }),
        3 => (
            small_key_strategy(keys),
            -60_000..horizon_ms.max(1),
            -60_000..horizon_ms.max(1),
        )
            .prop_map(|(key, from, to)| WindowOp::Fetch { key, from, to }),
        1 => Just(WindowOp::Flush),
    ]
}

/// Strategy for generating a batch of operations.
pub fn window_ops_strategy(
    keys: usize,
    horizon_ms: i64,
    max_ops: usize,
) -> impl Strategy<Value = Vec<WindowOp>> {
    prop::collection::vec(window_op_strategy(keys, horizon_ms), 1..max_ops.max(2))
}

/// Strategy for generating non-decreasing timestamps, as a stream would
/// deliver them.
pub fn ordered_timestamps_strategy(
    count: usize,
    max_step_ms: i64,
) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0..max_step_ms.max(1), count).prop_map(|steps| {
        steps
            .into_iter()
            .scan(0i64, |now, step| {
                *now += step;
                Some(*now)
            })
            .collect()
    })
}
