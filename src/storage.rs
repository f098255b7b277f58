//! Storage layer for hkstate
//!
//! The shared store is a flat map of string keys to string values, each value
//! normally a JSON document. Every participant (a "context") talks to the
//! store through its own [`Backend`] handle. A backend also exposes a change
//! feed that reports writes made by *other* handles, never its own.
//!
//! Two backends ship with the crate:
//!
//! ```text
//! MemoryArea ── context() ──> MemoryBackend   # in-process, optional byte quota
//! FileBackend::open(dir)                      # one file per key, notify watcher
//!
//! <dir>/
//!   hk_tasks_v1.json
//!   hk_tasks_pulse_v1.json
//!   hk%3Aprofile.json                         # ':' and other bytes are %-encoded
//! ```
//!
//! [`KeyedStore`] wraps a backend with typed JSON access. Reads fall back to
//! a caller-supplied value on any failure and writes are best effort: a
//! rejected write is logged and swallowed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// File extension used for key files in a [`FileBackend`] directory
const KEY_FILE_EXT: &str = "json";

/// Default coalescing window for file watcher events
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 50;

/// How often an idle watcher thread checks that its backend still exists
const WATCH_IDLE_TICK: Duration = Duration::from_millis(250);

/// Identity of one participant attached to the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(String);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A change made to the shared store by another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Raw access to the shared key-value store for one context.
///
/// All collection stores go through this trait, so a transactional store can
/// replace the built-in backends without touching call sites.
pub trait Backend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;

    /// Feed of changes made through other handles on the same store.
    fn watch(&self) -> Result<Receiver<StorageChange>>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// In-memory backend
// =============================================================================

/// A shared in-process store. Each [`MemoryArea::context`] handle behaves like
/// an independent page attached to the same storage.
#[derive(Clone, Default)]
pub struct MemoryArea {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    quota: Option<usize>,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    watchers: Vec<(ContextId, Sender<StorageChange>)>,
}

impl MemoryState {
    fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    fn broadcast(&mut self, origin: &ContextId, change: StorageChange) {
        self.watchers.retain(|(id, tx)| {
            if id == origin {
                return true;
            }
            tx.send(change.clone()).is_ok()
        });
    }
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                quota: Some(bytes),
                state: Mutex::new(MemoryState::default()),
            }),
        }
    }

    /// Attach a new context to this store.
    pub fn context(&self) -> MemoryBackend {
        MemoryBackend {
            inner: Arc::clone(&self.inner),
            origin: ContextId::new(),
        }
    }

    /// Current raw value of a key, bypassing any context.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        lock(&self.inner.state).entries.get(key).cloned()
    }
}

/// One context's handle on a [`MemoryArea`].
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
    origin: ContextId,
}

impl MemoryBackend {
    pub fn id(&self) -> &ContextId {
        &self.origin
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.inner.state).entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut state = lock(&self.inner.state);

        if let Some(limit) = self.inner.quota {
            let current = state
                .entries
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let needed = state.used_bytes() - current + key.len() + value.len();
            if needed > limit {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        let old_value = state.entries.insert(key.to_string(), value.to_string());
        if old_value.as_deref() != Some(value) {
            state.broadcast(
                &self.origin,
                StorageChange {
                    key: key.to_string(),
                    old_value,
                    new_value: Some(value.to_string()),
                },
            );
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if let Some(old_value) = state.entries.remove(key) {
            state.broadcast(
                &self.origin,
                StorageChange {
                    key: key.to_string(),
                    old_value: Some(old_value),
                    new_value: None,
                },
            );
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(lock(&self.inner.state).entries.keys().cloned().collect())
    }

    fn watch(&self) -> Result<Receiver<StorageChange>> {
        let (tx, rx) = mpsc::channel();
        lock(&self.inner.state)
            .watchers
            .push((self.origin.clone(), tx));
        Ok(rx)
    }
}

// =============================================================================
// Directory backend
// =============================================================================

/// A store kept as one file per key inside a directory. Separate processes
/// opening the same directory see each other's writes through [`Backend::watch`].
pub struct FileBackend {
    root: PathBuf,
    origin: ContextId,
    debounce: Duration,
    /// Last value this handle wrote per key; used to drop self-notifications.
    own_writes: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl FileBackend {
    /// Open (creating if needed) a store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|_| Error::StoreUnavailable(root.clone()))?;
        Ok(Self {
            root,
            origin: ContextId::new(),
            debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
            own_writes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Override the window used to coalesce bursts of file events.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn id(&self) -> &ContextId {
        &self.origin
    }

    /// Path of the file holding `key`
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_key(key), KEY_FILE_EXT))
    }

    /// Write data atomically using temp file + rename
    ///
    /// Readers in other processes never observe a partially written value.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|err| Error::Io(err.error))?;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        read_key_file(&self.key_path(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.own_writes).insert(key.to_string(), Some(value.to_string()));
        self.write_atomic(&self.key_path(key), value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.own_writes).insert(key.to_string(), None);
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(key) = key_from_path(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn watch(&self) -> Result<Receiver<StorageChange>> {
        let (change_tx, change_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = event_tx.send(res);
        })?;
        watcher.watch(&self.root, RecursiveMode::NonRecursive)?;

        let mut known = HashMap::new();
        for key in self.keys()? {
            let value = self.read(&key)?;
            known.insert(key, value);
        }

        let root = self.root.clone();
        let own_writes = Arc::downgrade(&self.own_writes);
        let debounce = self.debounce;

        // The feed ends when the backend is dropped or the receiver goes away.
        thread::spawn(move || {
            let _watcher = watcher;
            let mut pending: Option<Instant> = None;
            let mut touched: Vec<PathBuf> = Vec::new();

            loop {
                let timeout = pending
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or(WATCH_IDLE_TICK);
                match event_rx.recv_timeout(timeout) {
                    Ok(Ok(event)) => {
                        touched.extend(event.paths);
                        pending.get_or_insert_with(|| Instant::now() + debounce);
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(root = %root.display(), error = %err, "store watcher error");
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let Some(own_writes) = own_writes.upgrade() else {
                            tracing::debug!(root = %root.display(), "store closed, stopping watcher");
                            return;
                        };
                        if pending.take().is_none() {
                            continue;
                        }
                        let changes = collect_changes(&root, &mut touched, &mut known, &own_writes);
                        for change in changes {
                            if change_tx.send(change).is_err() {
                                return;
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        Ok(change_rx)
    }
}

fn collect_changes(
    root: &Path,
    touched: &mut Vec<PathBuf>,
    known: &mut HashMap<String, Option<String>>,
    own_writes: &Mutex<HashMap<String, Option<String>>>,
) -> Vec<StorageChange> {
    let mut keys: Vec<String> = touched
        .drain(..)
        .filter_map(|path| key_from_path(&path))
        .collect();
    keys.sort();
    keys.dedup();

    let mut changes = Vec::new();
    for key in keys {
        let path = root.join(format!("{}.{}", encode_key(&key), KEY_FILE_EXT));
        let current = match read_key_file(&path) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "skipping unreadable key file");
                continue;
            }
        };
        let previous = known.insert(key.clone(), current.clone()).flatten();
        if previous == current {
            continue;
        }

        let mut own = lock(own_writes);
        if own.get(&key) == Some(&current) {
            continue;
        }
        own.remove(&key);
        drop(own);

        changes.push(StorageChange {
            key,
            old_value: previous,
            new_value: current,
        });
    }
    changes
}

fn read_key_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::Io(err)),
    }
}

fn key_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(KEY_FILE_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    decode_key(stem)
}

/// Encode a key into a portable file name stem.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    if out.is_empty() {
        "%".to_string()
    } else {
        out
    }
}

/// Inverse of [`encode_key`]
pub fn decode_key(stem: &str) -> Option<String> {
    if stem == "%" {
        return Some(String::new());
    }
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = stem.get(idx + 1..idx + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8(out).ok()
}

// =============================================================================
// Typed access
// =============================================================================

/// Typed JSON access to the shared store for one context.
#[derive(Clone)]
pub struct KeyedStore {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for KeyedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore").finish_non_exhaustive()
    }
}

impl KeyedStore {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Decode the value under `key`, or `fallback` when the key is absent,
    /// holds `null`, or does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(value) = self.get_value(key) else {
            return fallback;
        };
        if value.is_null() {
            return fallback;
        }
        match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(key, error = %err, "stored value has unexpected shape, using fallback");
                fallback
            }
        }
    }

    /// Raw JSON value under `key`; `None` when absent or not valid JSON.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let raw = self.get_text(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(key, error = %err, "stored value is not JSON");
                None
            }
        }
    }

    /// Unparsed value under `key`.
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key, error = %err, "store read failed");
                None
            }
        }
    }

    /// Serialize and store `value`. Failures are logged and swallowed; the
    /// returned flag only reports whether the value reached the store.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.set_text(key, &json),
            Err(err) => {
                tracing::warn!(key, error = %err, "could not serialize value, write dropped");
                false
            }
        }
    }

    /// Store a raw string value (best effort, see [`KeyedStore::set`]).
    pub fn set_text(&self, key: &str, value: &str) -> bool {
        match self.backend.write(key, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "store write failed, change not persisted");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "store remove failed");
                false
            }
        }
    }

    /// All keys currently present; empty if the listing fails.
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "store key listing failed");
            Vec::new()
        })
    }

    /// Remove every key starting with `prefix`, returning how many were removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| self.remove(key))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn get_returns_fallback_for_missing_and_malformed() {
        let area = MemoryArea::new();
        let store = KeyedStore::new(area.context());

        assert_eq!(store.get("missing", vec![1u32]), vec![1]);

        store.set_text("broken", "{not json");
        assert_eq!(store.get("broken", 7u32), 7);

        store.set_text("null", "null");
        assert_eq!(store.get("null", 3u32), 3);

        store.set_text("wrong-shape", "\"text\"");
        assert_eq!(store.get("wrong-shape", 5u32), 5);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = KeyedStore::new(MemoryArea::new().context());
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };
        assert!(store.set("data", &data));
        let read_back: Option<TestData> = store.get("data", None);
        assert_eq!(read_back, Some(data));
    }

    #[test]
    fn quota_exceeded_is_swallowed() {
        let area = MemoryArea::with_quota(16);
        let store = KeyedStore::new(area.context());

        assert!(store.set_text("k", "small"));
        assert!(!store.set_text("k2", "this value is far too large"));
        assert_eq!(store.get_text("k2"), None);
        assert_eq!(store.get_text("k").as_deref(), Some("small"));
    }

    #[test]
    fn quota_counts_replacement_not_addition() {
        let area = MemoryArea::with_quota(10);
        let store = KeyedStore::new(area.context());
        assert!(store.set_text("k", "12345678"));
        assert!(store.set_text("k", "87654321"));
    }

    #[test]
    fn memory_watch_skips_own_writes() {
        let area = MemoryArea::new();
        let first = area.context();
        let second = area.context();
        let first_feed = first.watch().unwrap();
        let second_feed = second.watch().unwrap();

        first.write("k", "1").unwrap();

        assert!(first_feed.try_recv().is_err());
        let change = second_feed.try_recv().unwrap();
        assert_eq!(change.key, "k");
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value.as_deref(), Some("1"));
    }

    #[test]
    fn memory_watch_ignores_unchanged_values() {
        let area = MemoryArea::new();
        let first = area.context();
        let second = area.context();
        let feed = second.watch().unwrap();

        first.write("k", "same").unwrap();
        first.write("k", "same").unwrap();

        assert!(feed.try_recv().is_ok());
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn remove_prefix_only_touches_matching_keys() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set_text("hk:a", "1");
        store.set_text("hk:b", "2");
        store.set_text("other", "3");

        assert_eq!(store.remove_prefix("hk:"), 2);
        assert_eq!(store.keys(), vec!["other".to_string()]);
    }

    #[test]
    fn key_encoding_roundtrips() {
        for key in ["hk_tasks_v1", "tasks-updated", "hk:profile", "a b/c", ""] {
            let encoded = encode_key(key);
            assert!(!encoded.contains(':') && !encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn file_backend_roundtrip_and_keys() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path().join("store")).unwrap();

        backend.write("hk:profile", "{\"hotelName\":\"Sea View\"}").unwrap();
        backend.write("hk_tasks_v1", "{\"tasks\":[]}").unwrap();

        assert_eq!(
            backend.read("hk:profile").unwrap().as_deref(),
            Some("{\"hotelName\":\"Sea View\"}")
        );
        assert!(backend.key_path("hk:profile").exists());
        assert_eq!(
            backend.keys().unwrap(),
            vec!["hk:profile".to_string(), "hk_tasks_v1".to_string()]
        );

        backend.remove("hk:profile").unwrap();
        backend.remove("hk:profile").unwrap();
        assert_eq!(backend.read("hk:profile").unwrap(), None);
    }

    #[test]
    fn file_feed_closes_after_backend_dropped() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path().join("store")).unwrap();
        let feed = backend.watch().unwrap();
        drop(backend);

        match feed.recv_timeout(Duration::from_secs(5)) {
            Err(mpsc::RecvTimeoutError::Disconnected) => {}
            other => panic!("feed still open: {other:?}"),
        }
    }
}
