//! Host processing context.
//!
//! A store does not manage directories, clocks or recovery on its own; it
//! asks the context it is initialized with. [`LocalContext`] is a complete
//! single-process context backed by a state directory.

use crate::changelog::{read_records, ChangeLogSink, FileChangeLog};
use crate::error::CoreResult;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;
use windb_storage::{EngineProvider, FileEngineProvider};

/// Replay callback handed to [`StoreContext::register`].
///
/// Invoked once per recovered `(binary key, raw value)` record, in log order.
pub type RestoreFn<'a> = dyn FnMut(&[u8], &[u8]) -> CoreResult<()> + 'a;

/// Services a store consumes from its host.
pub trait StoreContext: Send + Sync {
    /// Returns the root directory of the named store.
    fn root_dir_for(&self, store_name: &str) -> PathBuf;

    /// Returns the current stream time, used when a put has no timestamp.
    fn timestamp(&self) -> i64;

    /// Registers a store and replays its change log through `restore`.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be read or `restore` fails.
    fn register(
        &self,
        store_name: &str,
        logging_enabled: bool,
        restore: &mut RestoreFn<'_>,
    ) -> CoreResult<()>;

    /// Returns the sink the store's change logger writes to.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be opened.
    fn change_log_sink(&self, store_name: &str) -> CoreResult<Box<dyn ChangeLogSink>>;

    /// Returns the provider of per-segment engines.
    fn engine_provider(&self) -> Arc<dyn EngineProvider>;
}

/// Single-process context rooted at a state directory.
///
/// Stores live under `<state_dir>/<name>/` and their change logs at
/// `<state_dir>/<name>.changelog`. Stream time is set by the caller.
pub struct LocalContext {
    state_dir: PathBuf,
    clock: AtomicI64,
    provider: Arc<dyn EngineProvider>,
    registered: Mutex<Vec<String>>,
}

impl LocalContext {
    /// Creates a context using file engines.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self::with_engine_provider(state_dir, Arc::new(FileEngineProvider))
    }

    /// Creates a context using the given engine provider.
    pub fn with_engine_provider(
        state_dir: impl Into<PathBuf>,
        provider: Arc<dyn EngineProvider>,
    ) -> Self {
        Self {
            state_dir: state_dir.into(),
            clock: AtomicI64::new(0),
            provider,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Returns the state directory.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Sets the stream time.
    pub fn set_timestamp(&self, timestamp: i64) {
        self.clock.store(timestamp, Ordering::SeqCst);
    }

    /// Returns the change log path of the named store.
    #[must_use]
    pub fn change_log_path(&self, store_name: &str) -> PathBuf {
        self.state_dir.join(format!("{store_name}.changelog"))
    }

    /// Returns the names of registered stores, in registration order.
    #[must_use]
    pub fn registered_stores(&self) -> Vec<String> {
        self.registered.lock().clone()
    }
}

impl StoreContext for LocalContext {
    fn root_dir_for(&self, store_name: &str) -> PathBuf {
        self.state_dir.join(store_name)
    }

    fn timestamp(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn register(
        &self,
        store_name: &str,
        logging_enabled: bool,
        restore: &mut RestoreFn<'_>,
    ) -> CoreResult<()> {
        self.registered.lock().push(store_name.to_string());
        if !logging_enabled {
            return Ok(());
        }

        let records = read_records(&self.change_log_path(store_name))?;
        for record in &records {
            restore(&record.key, &record.value)?;
        }
        debug!(store = store_name, records = records.len(), "replayed change log");
        Ok(())
    }

    fn change_log_sink(&self, store_name: &str) -> CoreResult<Box<dyn ChangeLogSink>> {
        Ok(Box::new(FileChangeLog::open(
            self.change_log_path(store_name),
        )?))
    }

    fn engine_provider(&self) -> Arc<dyn EngineProvider> {
        Arc::clone(&self.provider)
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("state_dir", &self.state_dir)
            .field("timestamp", &self.timestamp())
            .finish_non_exhaustive()
    }
}
