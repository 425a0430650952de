//! Windowed store configuration.

use crate::error::{CoreError, CoreResult};

/// Smallest permitted segment width: one minute.
///
/// Bounds how often new segments (and their engines) are created.
pub const MIN_SEGMENT_INTERVAL_MS: i64 = 60 * 1000;

/// Configuration for a windowed store.
#[derive(Debug, Clone)]
pub struct WindowStoreConfig {
    /// Store name; also the name of its root directory.
    pub name: String,

    /// How long records are retained, in milliseconds.
    pub retention_period_ms: i64,

    /// Number of live segments in the ring.
    pub num_segments: usize,

    /// Whether several values may share one (key, timestamp).
    pub retain_duplicates: bool,

    /// Whether writes are forwarded to the change log.
    pub logging_enabled: bool,

    /// Number of pending change-log keys that triggers a flush.
    pub change_log_max_dirty: usize,
}

impl Default for WindowStoreConfig {
    fn default() -> Self {
        Self {
            name: "window-store".to_string(),
            retention_period_ms: 24 * 60 * 60 * 1000, // 1 day
            num_segments: 3,
            retain_duplicates: false,
            logging_enabled: false,
            change_log_max_dirty: 100,
        }
    }
}

impl WindowStoreConfig {
    /// Creates a configuration with default values and the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the retention period in milliseconds.
    #[must_use]
    pub const fn retention_period_ms(mut self, value: i64) -> Self {
        self.retention_period_ms = value;
        self
    }

    /// Sets the number of segments.
    #[must_use]
    pub const fn num_segments(mut self, value: usize) -> Self {
        self.num_segments = value;
        self
    }

    /// Sets whether duplicates are retained.
    #[must_use]
    pub const fn retain_duplicates(mut self, value: bool) -> Self {
        self.retain_duplicates = value;
        self
    }

    /// Sets whether change logging is enabled.
    #[must_use]
    pub const fn logging_enabled(mut self, value: bool) -> Self {
        self.logging_enabled = value;
        self
    }

    /// Sets the change-log flush threshold.
    #[must_use]
    pub const fn change_log_max_dirty(mut self, value: usize) -> Self {
        self.change_log_max_dirty = value;
        self
    }

    /// Returns the width of one segment in milliseconds.
    ///
    /// `max(retention / (num_segments - 1), MIN_SEGMENT_INTERVAL_MS)`.
    /// Call [`validate`](Self::validate) first: fewer than two segments
    /// has no defined interval and yields the minimum.
    #[must_use]
    pub fn segment_interval_ms(&self) -> i64 {
        let divisor = i64::try_from(self.num_segments.saturating_sub(1)).unwrap_or(i64::MAX);
        if divisor == 0 {
            return MIN_SEGMENT_INTERVAL_MS;
        }
        (self.retention_period_ms / divisor).max(MIN_SEGMENT_INTERVAL_MS)
    }

    /// Checks the configuration for values the store cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty name, fewer than two segments,
    /// a non-positive retention period, or a zero change-log threshold.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::invalid_config("store name must not be empty"));
        }
        if self.num_segments < 2 {
            return Err(CoreError::invalid_config(format!(
                "num_segments must be at least 2, got {}",
                self.num_segments
            )));
        }
        if i64::try_from(self.num_segments).is_err() {
            return Err(CoreError::invalid_config("num_segments is too large"));
        }
        if self.retention_period_ms <= 0 {
            return Err(CoreError::invalid_config(format!(
                "retention period must be positive, got {}ms",
                self.retention_period_ms
            )));
        }
        if self.change_log_max_dirty == 0 {
            return Err(CoreError::invalid_config(
                "change_log_max_dirty must be at least 1",
            ));
        }
        Ok(())
    }
}
