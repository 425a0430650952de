//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use windb_codec::{Decode, Encode};
use windb_core::{LocalContext, StoreContext, WindowStore, WindowStoreConfig};
use windb_storage::{EngineProvider, FileEngineProvider, MemoryEngineProvider};

/// Configuration used by most tests: one-minute segments, three of them,
/// two minutes of retention.
pub fn test_config(name: &str) -> WindowStoreConfig {
    WindowStoreConfig::new(name)
        .retention_period_ms(120_000)
        .num_segments(3)
}

/// An initialized store in a temporary state directory.
pub struct TestStore<K: ?Sized, V> {
    /// The store instance.
    pub store: WindowStore<K, V>,
    /// The context the store was initialized with.
    pub context: Arc<LocalContext>,
    persistent: bool,
    // kept alive to prevent cleanup
    temp_dir: TempDir,
}

impl<K, V> TestStore<K, V>
where
    K: Encode + ?Sized,
    V: Encode + Decode,
{
    /// Creates a store whose segments live in memory.
    ///
    /// The change log, if enabled, is still written to the state directory.
    pub fn memory(config: WindowStoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::open_in(temp_dir, config, false)
    }

    /// Creates a store whose segments are file engines.
    pub fn file(config: WindowStoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::open_in(temp_dir, config, true)
    }

    /// Returns the state directory.
    pub fn state_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the store's root directory.
    pub fn root_dir(&self) -> PathBuf {
        self.context.root_dir_for(self.store.name())
    }

    /// Closes the store and opens a fresh instance on the same state
    /// directory, as after a process restart. Stream time carries over.
    pub fn reopen(self) -> Self {
        self.reopen_with(|config| config)
    }

    /// Like [`reopen`](Self::reopen), with an adjusted configuration.
    pub fn reopen_with(
        self,
        adjust: impl FnOnce(WindowStoreConfig) -> WindowStoreConfig,
    ) -> Self {
        let Self {
            mut store,
            context,
            persistent,
            temp_dir,
        } = self;
        store.close().expect("Failed to close store");
        let timestamp = context.timestamp();
        let config = adjust(store.config().clone());
        drop(store);

        let reopened = Self::open_in(temp_dir, config, persistent);
        reopened.context.set_timestamp(timestamp);
        reopened
    }

    fn open_in(temp_dir: TempDir, config: WindowStoreConfig, persistent: bool) -> Self {
        let provider: Arc<dyn EngineProvider> = if persistent {
            Arc::new(FileEngineProvider)
        } else {
            Arc::new(MemoryEngineProvider)
        };
        let context = Arc::new(LocalContext::with_engine_provider(temp_dir.path(), provider));
        let mut store = WindowStore::new(config).expect("Invalid store configuration");
        store
            .init(context.clone())
            .expect("Failed to initialize store");
        Self {
            store,
            context,
            persistent,
            temp_dir,
        }
    }
}

impl<K: ?Sized, V> std::ops::Deref for TestStore<K, V> {
    type Target = WindowStore<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<K: ?Sized, V> std::ops::DerefMut for TestStore<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use windb_core::WindowStore;
/// use windb_testkit::{fetch_all, test_config, with_temp_store};
///
/// with_temp_store(test_config("clicks"), |store: &mut WindowStore<str, u64>, _| {
///     store.put_with_timestamp("k", &7, 1_000).unwrap();
///     assert_eq!(fetch_all(store, "k", 0, 2_000), vec![(1_000, 7)]);
/// });
/// ```
pub fn with_temp_store<K, V, F, R>(config: WindowStoreConfig, f: F) -> R
where
    K: Encode + ?Sized,
    V: Encode + Decode,
    F: FnOnce(&mut WindowStore<K, V>, &LocalContext) -> R,
{
    let mut test_store = TestStore::memory(config);
    f(&mut test_store.store, &test_store.context)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<K, V, F, R>(config: WindowStoreConfig, f: F) -> R
where
    K: Encode + ?Sized,
    V: Encode + Decode,
    F: FnOnce(&mut WindowStore<K, V>, &LocalContext) -> R,
{
    let mut test_store = TestStore::file(config);
    f(&mut test_store.store, &test_store.context)
}

/// Collects a fetch into a vector, panicking on any error.
pub fn fetch_all<K, V>(store: &WindowStore<K, V>, key: &K, from: i64, to: i64) -> Vec<(i64, V)>
where
    K: Encode + ?Sized,
    V: Encode + Decode,
{
    store
        .fetch(key, from, to)
        .expect("Failed to fetch")
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to read fetched records")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a memory store holding one value per minute for each key,
    /// for timestamps `0, 60_000, ..` up to `minutes` minutes.
    pub fn populated_store(keys: &[&str], minutes: i64) -> TestStore<str, i64> {
        let mut test_store = TestStore::memory(test_config("populated"));
        for minute in 0..minutes {
            for key in keys {
                test_store
                    .put_with_timestamp(*key, &minute, minute * 60_000)
                    .expect("Failed to put");
            }
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut test_store: TestStore<str, String> = TestStore::memory(test_config("t"));
        test_store
            .put_with_timestamp("k", &"v".to_string(), 10)
            .unwrap();
        assert_eq!(fetch_all(&test_store, "k", 0, 10), vec![(10, "v".to_string())]);
        assert!(test_store.root_dir().is_dir());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let mut test_store: TestStore<str, String> = TestStore::file(test_config("t"));
        test_store
            .put_with_timestamp("k", &"v".to_string(), 10)
            .unwrap();
        test_store.context.set_timestamp(99);

        let test_store = test_store.reopen();
        assert_eq!(test_store.context.timestamp(), 99);
        assert_eq!(fetch_all(&test_store, "k", 0, 10), vec![(10, "v".to_string())]);
        assert_eq!(test_store.recovery_stats().opened, 1);
    }

    #[test]
    fn test_with_temp_store() {
        let ids = with_temp_store(test_config("t"), |store: &mut WindowStore<str, u64>, _| {
            store.put_with_timestamp("k", &1, 0).unwrap();
            store.put_with_timestamp("k", &2, 60_000).unwrap();
            store.segment_ids()
        });
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_populated_scenario() {
        let test_store = scenarios::populated_store(&["a", "b"], 3);
        assert_eq!(fetch_all(&test_store, "b", 0, 200_000).len(), 3);
    }
}
