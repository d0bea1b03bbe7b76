//! Position persistence over a remote and a local key-value backend.
//!
//! Both backends implement [`KvBackend`]. [`PositionStore`] composes them:
//!
//! - **load**: the remote (primary) value wins when present; otherwise the
//!   local (secondary) value; otherwise absent.
//! - **save**: the local write completes before `save` returns; the remote
//!   write runs as a detached task and only logs on failure. Outside a
//!   Tokio runtime there is nothing to detach onto, so the remote write is
//!   awaited in place.
//!
//! Backend failures never reach the caller: reads degrade to "absent" and
//! writes to a no-op, so a session keeps working with no persistence at all.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::model::PersistenceRecord;

/// Asynchronous string key-value backend.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process backend. Can be switched offline to simulate an unreachable
/// store.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    entries: Mutex<HashMap<String, String>>,
    online: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty, online backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle reachability; offline backends fail every call.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Read a value directly, bypassing reachability (for inspection).
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    /// Write a value directly, bypassing reachability (for seeding).
    pub fn insert(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable(&self.name, "backend offline"))
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::io(&self.name, "poisoned lock"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::io(&self.name, "poisoned lock"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Device-local backend persisting a JSON object to one file.
///
/// File access goes through `tokio::fs`, so calls must run inside a Tokio
/// runtime.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileBackend {
    const NAME: &'static str = "file";

    /// Backend stored at `path`; the file is created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(StoreError::io(Self::NAME, err)),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| StoreError::io(Self::NAME, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(Self::NAME, e))
    }
}

#[async_trait]
impl KvBackend for FileBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = match self.read_map().await {
            Ok(map) => map,
            Err(err) => {
                log::warn!(
                    "discarding unreadable store file {}: {}",
                    self.path.display(),
                    err
                );
                BTreeMap::new()
            }
        };
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }
}

/// Backend that is never reachable (no cloud storage in this host).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableBackend;

#[async_trait]
impl KvBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::unavailable(self.name(), "no storage in this host"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::unavailable(self.name(), "no storage in this host"))
    }
}

/// Handle to a detached remote write.
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
pub struct RemoteWrite {
    state: RemoteState,
}

#[derive(Debug)]
enum RemoteState {
    Detached(JoinHandle<bool>),
    Done(bool),
}

impl RemoteWrite {
    /// Wait for the remote write; `true` if the backend accepted it.
    pub async fn finished(self) -> bool {
        match self.state {
            RemoteState::Detached(handle) => handle.await.unwrap_or(false),
            RemoteState::Done(accepted) => accepted,
        }
    }

    /// The write has completed (successfully or not).
    pub fn is_finished(&self) -> bool {
        match &self.state {
            RemoteState::Detached(handle) => handle.is_finished(),
            RemoteState::Done(_) => true,
        }
    }
}

/// Remote writes a session has detached and not yet awaited.
///
/// Finished writes are pruned on every [`track`](Self::track).
#[derive(Debug, Default)]
pub struct RemoteWrites {
    pending: Vec<RemoteWrite>,
}

impl RemoteWrites {
    /// Keep the remote half of a save, if any.
    pub fn track(&mut self, outcome: SaveOutcome) {
        self.pending.retain(|write| !write.is_finished());
        if let Some(remote) = outcome.remote {
            self.pending.push(remote);
        }
    }

    /// Writes not yet known to be finished.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for every pending write; returns how many the backend accepted.
    pub async fn flush(&mut self) -> usize {
        let mut accepted = 0;
        for write in self.pending.drain(..) {
            if write.finished().await {
                accepted += 1;
            }
        }
        accepted
    }
}

/// What happened to a `save`.
#[derive(Debug)]
#[must_use = "dropping the outcome is fine, but the remote write may still be running"]
pub struct SaveOutcome {
    /// Local backend accepted the record.
    pub local_saved: bool,
    /// Detached remote write, when a remote backend is configured.
    pub remote: Option<RemoteWrite>,
}

/// Where a loaded record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSource {
    /// Remote (primary) backend.
    Remote,
    /// Local (secondary) backend.
    Local,
}

/// Location persistence with remote-over-local precedence.
#[derive(Clone)]
pub struct PositionStore {
    remote: Option<Arc<dyn KvBackend>>,
    local: Arc<dyn KvBackend>,
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore")
            .field("remote", &self.remote.as_ref().map(|b| b.name().to_string()))
            .field("local", &self.local.name())
            .finish()
    }
}

impl PositionStore {
    /// Store with only a local backend.
    pub fn local_only(local: Arc<dyn KvBackend>) -> Self {
        Self {
            remote: None,
            local,
        }
    }

    /// Store with a remote (primary) and a local (secondary) backend.
    pub fn new(remote: Arc<dyn KvBackend>, local: Arc<dyn KvBackend>) -> Self {
        Self {
            remote: Some(remote),
            local,
        }
    }

    /// Store that keeps everything in memory, for hosts without storage.
    pub fn in_memory() -> Self {
        Self::local_only(Arc::new(MemoryBackend::new("memory")))
    }

    /// Load the record for `key`.
    pub async fn load(&self, key: &str) -> Option<PersistenceRecord> {
        self.load_with_source(key).await.map(|(record, _)| record)
    }

    /// Load the record for `key` and report which backend supplied it.
    pub async fn load_with_source(&self, key: &str) -> Option<(PersistenceRecord, RecordSource)> {
        if let Some(remote) = &self.remote {
            if let Some(record) = read_record(remote.as_ref(), key).await {
                log::debug!("restored '{}' from remote backend '{}'", key, remote.name());
                return Some((record, RecordSource::Remote));
            }
        }
        let record = read_record(self.local.as_ref(), key).await?;
        log::debug!("restored '{}' from local backend '{}'", key, self.local.name());
        Some((record, RecordSource::Local))
    }

    /// Persist `record` under `key`.
    ///
    /// The local write is awaited; the remote write is spawned onto the
    /// current Tokio runtime and never blocks the caller. With no runtime
    /// available the remote write is awaited before returning.
    pub async fn save(&self, key: &str, record: &PersistenceRecord) -> SaveOutcome {
        let value = match record.encode() {
            Ok(value) => value,
            Err(err) => {
                log::warn!("not saving '{}': {}", key, err);
                return SaveOutcome {
                    local_saved: false,
                    remote: None,
                };
            }
        };

        let local_saved = match self.local.set(key, &value).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("local save of '{}' failed: {}", key, err);
                false
            }
        };

        let remote = match &self.remote {
            Some(remote) => {
                let remote = Arc::clone(remote);
                let key = key.to_string();
                let state = match Handle::try_current() {
                    Ok(runtime) => {
                        let task = async move { write_remote(remote.as_ref(), &key, &value).await };
                        RemoteState::Detached(runtime.spawn(task))
                    }
                    Err(_) => {
                        log::debug!("no Tokio runtime, writing '{}' to remote in place", key);
                        RemoteState::Done(write_remote(remote.as_ref(), &key, &value).await)
                    }
                };
                Some(RemoteWrite { state })
            }
            None => None,
        };

        SaveOutcome {
            local_saved,
            remote,
        }
    }
}

async fn write_remote(remote: &dyn KvBackend, key: &str, value: &str) -> bool {
    match remote.set(key, value).await {
        Ok(()) => true,
        Err(err) => {
            log::warn!("remote save of '{}' failed: {}", key, err);
            false
        }
    }
}

async fn read_record(backend: &dyn KvBackend, key: &str) -> Option<PersistenceRecord> {
    let raw = match backend.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            log::warn!("reading '{}' from '{}' failed: {}", key, backend.name(), err);
            return None;
        }
    };
    match PersistenceRecord::decode(&raw) {
        Ok(record) => Some(record),
        Err(err) => {
            log::warn!("ignoring '{}' from '{}': {}", key, backend.name(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use super::*;
    use crate::model::{Location, Settings};

    fn record(chapter: usize, page: usize) -> PersistenceRecord {
        PersistenceRecord::new(Location::Page { chapter, page }, Settings::default())
    }

    /// Drive a future that never waits on I/O, with no runtime entered.
    fn poll_without_runtime<F: Future>(fut: F) -> F::Output {
        let mut fut = pin!(fut);
        let mut cx = Context::from_waker(Waker::noop());
        for _ in 0..16 {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return out;
            }
        }
        panic!("future did not complete");
    }

    #[test]
    fn test_save_outside_runtime_writes_remote_in_place() {
        let remote = Arc::new(MemoryBackend::new("remote"));
        let local = Arc::new(MemoryBackend::new("local"));
        let store = PositionStore::new(remote.clone(), local.clone());

        let outcome = poll_without_runtime(store.save("k", &record(2, 1)));
        assert!(outcome.local_saved);
        let write = outcome.remote.expect("remote configured");
        assert!(write.is_finished());
        assert!(poll_without_runtime(write.finished()));
        assert!(remote.peek("k").is_some());
        assert_eq!(remote.peek("k"), local.peek("k"));
    }

    #[test]
    fn test_failed_remote_outside_runtime_is_reported() {
        let remote = Arc::new(MemoryBackend::new("remote"));
        remote.set_online(false);
        let store = PositionStore::new(remote, Arc::new(MemoryBackend::new("local")));

        let outcome = poll_without_runtime(store.save("k", &record(0, 3)));
        assert!(outcome.local_saved);
        let write = outcome.remote.expect("remote configured");
        assert!(!poll_without_runtime(write.finished()));
    }

    #[tokio::test]
    async fn test_memory_backend_offline_fails() {
        let backend = MemoryBackend::new("m");
        backend.set("k", "v").await.expect("online set");
        backend.set_online(false);
        assert!(matches!(
            backend.get("k").await,
            Err(StoreError::Unavailable { .. })
        ));
        assert_eq!(backend.peek("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_corrupt_remote_falls_back_to_local() {
        let remote = Arc::new(MemoryBackend::new("remote"));
        let local = Arc::new(MemoryBackend::new("local"));
        remote.insert("k", "{not json");
        local.insert("k", &record(1, 4).encode().expect("encode"));
        let store = PositionStore::new(remote, local);
        let (loaded, source) = store.load_with_source("k").await.expect("local value");
        assert_eq!(loaded, record(1, 4));
        assert_eq!(source, RecordSource::Local);
    }

    #[tokio::test]
    async fn test_save_without_any_backend_is_noop() {
        let store = PositionStore::new(
            Arc::new(UnavailableBackend),
            Arc::new(UnavailableBackend),
        );
        let outcome = store.save("k", &record(0, 0)).await;
        assert!(!outcome.local_saved);
        let remote = outcome.remote.expect("remote configured");
        assert!(!remote.finished().await);
        assert!(store.load("k").await.is_none());
    }
}
