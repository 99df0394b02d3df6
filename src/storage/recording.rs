use std::io;
use std::sync::Mutex;

use super::{MemoryStore, Store, StoreError, StoreResult};

/// In-memory store that logs every write and remove as `"write <key>"` or
/// `"remove <key>"`, and can be told to fail writes to one key.
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    log: Mutex<Vec<String>>,
    failing_key: Option<&'static str>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(key: &'static str) -> Self {
        Self {
            failing_key: Some(key),
            ..Self::default()
        }
    }

    /// Everything logged since the last call.
    pub(crate) fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl Store for RecordingStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.failing_key == Some(key) {
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
        }
        self.record(format!("write {key}"));
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.record(format!("remove {key}"));
        self.inner.remove(key)
    }
}
