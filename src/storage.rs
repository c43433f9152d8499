use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Handle returned by [`Storage::subscribe`].
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Persisted collection store.
///
/// One Sled key per collection, each holding the JSON-serialized array or
/// object. An in-memory mirror answers reads; writes go through to Sled and
/// then notify the listeners registered for that key.
///
/// If the medium cannot be opened, or a write-through fails, the store keeps
/// working from memory for the rest of the session and only logs a warning.
#[derive(Clone)] // Clone for sharing across REST handlers (Sled trees are cheap to clone)
pub struct Storage {
    tree: Option<sled::Tree>,
    inner: Arc<Inner>,
}

struct Inner {
    cache: RwLock<HashMap<String, Value>>,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    // One write lock per collection key; last write wins.
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_listener: AtomicU64,
    durable: AtomicBool,
    #[cfg(test)]
    medium_fault: AtomicBool,
}

impl Inner {
    fn new(durable: bool) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            durable: AtomicBool::new(durable),
            #[cfg(test)]
            medium_fault: AtomicBool::new(false),
        }
    }
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let tree = db.open_tree("collections")?;
        info!(path = %path.as_ref().display(), "opened collection store");
        Ok(Self {
            tree: Some(tree),
            inner: Arc::new(Inner::new(true)),
        })
    }

    /// Like [`Storage::open`], but degrades to a memory-only store when the
    /// medium is unavailable.
    pub fn open_or_memory(path: impl AsRef<Path>) -> Self {
        match Self::open(path.as_ref()) {
            Ok(storage) => storage,
            Err(err) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %err,
                    "collection store unavailable, keeping data in memory for this session"
                );
                Self::memory()
            }
        }
    }

    /// A store with no durable medium behind it.
    pub fn memory() -> Self {
        Self {
            tree: None,
            inner: Arc::new(Inner::new(false)),
        }
    }

    /// False once writes are only reaching the in-memory mirror.
    pub fn is_durable(&self) -> bool {
        self.tree.is_some() && self.inner.durable.load(Ordering::SeqCst)
    }

    /// Typed read. On first read of a key with no stored value the default
    /// is both returned and persisted. A failed read from the medium is an
    /// error; the stored value is left untouched.
    pub fn read<T, F>(&self, key: &str, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.cached(key) {
            return Ok(serde_json::from_value(value)?);
        }
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        self.load_locked(key, default)
    }

    /// Serialize `value`, update the mirror, write through and notify.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        {
            let lock = self.key_lock(key);
            let _guard = lock.lock();
            self.commit(key, value.clone());
        }
        self.notify(key, &value);
        Ok(())
    }

    /// Read-modify-write under the collection's write lock.
    ///
    /// `f` returns `Ok(None)` when it made no change: nothing is written and
    /// no listener runs. An error from `f` also leaves the collection as is.
    pub fn mutate<T, R, D, F>(&self, key: &str, default: D, f: F) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
        D: FnOnce() -> T,
        F: FnOnce(&mut T) -> Result<Option<R>>,
    {
        let value;
        let outcome;
        {
            let lock = self.key_lock(key);
            let _guard = lock.lock();
            let mut current: T = self.load_locked(key, default)?;
            outcome = match f(&mut current)? {
                Some(outcome) => outcome,
                None => return Ok(None),
            };
            value = serde_json::to_value(&current)?;
            self.commit(key, value.clone());
        }
        self.notify(key, &value);
        Ok(Some(outcome))
    }

    /// Drop the mirrored value and decode the key again from the medium.
    /// Returns `None` when nothing is stored durably.
    pub fn reload<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        match self.load_durable(key)? {
            Some(value) => {
                let typed = serde_json::from_value(value.clone())?;
                self.inner.cache.write().insert(key.to_string(), value);
                Ok(Some(typed))
            }
            None if self.is_durable() => {
                self.inner.cache.write().remove(key);
                Ok(None)
            }
            // Memory-only: the mirror is the only copy there is.
            None => self
                .cached(key)
                .map(serde_json::from_value::<T>)
                .transpose()
                .map_err(Into::into),
        }
    }

    /// Register a listener for one key. Listeners run synchronously on the
    /// writer's thread, after the write lock is released.
    pub fn subscribe<F>(&self, key: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .write()
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        for registered in listeners.values_mut() {
            if let Some(pos) = registered.iter().position(|(lid, _)| *lid == id) {
                registered.remove(pos);
                return true;
            }
        }
        false
    }

    /// Keys present in the mirror or on the medium.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = self.inner.cache.read().keys().cloned().collect();
        if let Some(tree) = &self.tree {
            for item in tree.iter().keys() {
                match item {
                    Ok(key) => {
                        keys.insert(String::from_utf8_lossy(&key).into_owned());
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to scan stored keys");
                        break;
                    }
                }
            }
        }
        keys.into_iter().collect()
    }

    /// Forget a collection. The next read seeds it from its default again.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        let mut existed = self.inner.cache.write().remove(key).is_some();
        if let Some(tree) = self.tree.as_ref().filter(|_| self.is_durable()) {
            existed |= tree.remove(key.as_bytes())?.is_some();
            tree.flush()?;
        }
        if existed {
            info!(key, "collection removed");
        }
        Ok(existed)
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(tree) = &self.tree {
            tree.flush()?;
        }
        Ok(())
    }

    fn cached(&self, key: &str) -> Option<Value> {
        self.inner.cache.read().get(key).cloned()
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.inner
            .key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    // Caller holds the key lock.
    fn load_locked<T, F>(&self, key: &str, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.cached(key) {
            return Ok(serde_json::from_value(value)?);
        }
        if let Some(value) = self.load_durable(key)? {
            let typed = serde_json::from_value(value.clone())?;
            self.inner.cache.write().insert(key.to_string(), value);
            return Ok(typed);
        }
        let typed = default();
        debug!(key, "seeding collection with its default");
        self.commit(key, serde_json::to_value(&typed)?);
        Ok(typed)
    }

    fn load_durable(&self, key: &str) -> Result<Option<Value>> {
        let Some(tree) = self.tree.as_ref().filter(|_| self.is_durable()) else {
            return Ok(None);
        };
        let stored = self
            .medium_fault()
            .and_then(|()| Ok(tree.get(key.as_bytes())?));
        match stored {
            Ok(Some(bytes)) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(key, error = %err, "read from collection store failed");
                Err(err)
            }
        }
    }

    // Caller holds the key lock.
    fn commit(&self, key: &str, value: Value) {
        self.persist(key, &value);
        self.inner.cache.write().insert(key.to_string(), value);
    }

    fn persist(&self, key: &str, value: &Value) {
        let Some(tree) = self.tree.as_ref().filter(|_| self.is_durable()) else {
            return;
        };
        let written = self
            .medium_fault()
            .and_then(|()| Ok(serde_json::to_vec(value)?))
            .and_then(|bytes| {
                tree.insert(key.as_bytes(), bytes)?;
                tree.flush()?;
                Ok(())
            });
        if let Err(err) = written {
            warn!(
                key,
                error = %err,
                "write-through failed, continuing in memory only"
            );
            self.inner.durable.store(false, Ordering::SeqCst);
        }
    }

    #[cfg(not(test))]
    fn medium_fault(&self) -> Result<()> {
        Ok(())
    }

    #[cfg(test)]
    fn medium_fault(&self) -> Result<()> {
        if self.inner.medium_fault.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("medium unavailable").into());
        }
        Ok(())
    }

    fn notify(&self, key: &str, value: &Value) {
        let listeners: Vec<Listener> = match self.inner.listeners.read().get(key) {
            Some(registered) => registered.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };
        debug!(key, listeners = listeners.len(), "notifying collection listeners");
        for listener in listeners {
            listener(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Stamped {
        id: String,
        #[serde(deserialize_with = "crate::timestamp::deserialize")]
        at: DateTime<Utc>,
    }

    fn stamped(id: &str, at: &str) -> Stamped {
        Stamped {
            id: id.to_string(),
            at: crate::timestamp::parse(at).unwrap(),
        }
    }

    #[test]
    fn test_first_read_persists_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).expect("Failed to open storage");

        let seeded: Vec<Stamped> = storage
            .read("items", || vec![stamped("1", "2024-01-01")])
            .unwrap();
        assert_eq!(seeded.len(), 1);

        // A later read with a different default sees the persisted seed.
        let again: Vec<Stamped> = storage.read("items", Vec::new).unwrap();
        assert_eq!(again, seeded);

        let reloaded: Option<Vec<Stamped>> = storage.reload("items").unwrap();
        assert_eq!(reloaded, Some(seeded));
    }

    #[test]
    fn test_round_trip_restores_typed_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let items = vec![
            stamped("a", "2024-12-20T10:30:00Z"),
            stamped("b", "2023-05-10"),
        ];
        storage.write("items", &items).unwrap();

        let reloaded: Vec<Stamped> = storage.reload("items").unwrap().unwrap();
        assert_eq!(reloaded, items);
        assert_eq!(reloaded[1].at, crate::timestamp::date(2023, 5, 10));
    }

    #[test]
    fn test_write_notifies_listeners_until_unsubscribed() {
        let storage = Storage::memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = storage.subscribe("items", move |value| {
            assert!(value.is_array());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        storage.write("items", &vec![1, 2, 3]).unwrap();
        storage.write("other", &vec![4]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(storage.unsubscribe(id));
        assert!(!storage.unsubscribe(id));
        storage.write("items", &vec![1]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutate_without_change_skips_write() {
        let storage = Storage::memory();
        storage.write("items", &vec![1, 2]).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        storage.subscribe("items", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let untouched: Option<()> = storage
            .mutate("items", Vec::<i32>::new, |_| Ok(None))
            .unwrap();
        assert!(untouched.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let len = storage
            .mutate("items", Vec::<i32>::new, |items| {
                items.push(3);
                Ok(Some(items.len()))
            })
            .unwrap();
        assert_eq!(len, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let items: Vec<i32> = storage.read("items", Vec::new).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_memory_store_keeps_working() {
        let storage = Storage::memory();
        assert!(!storage.is_durable());
        storage.write("settings", &serde_json::json!({"a": 1})).unwrap();
        let value: Value = storage.read("settings", || Value::Null).unwrap();
        assert_eq!(value["a"], 1);
        let reloaded: Option<Value> = storage.reload("settings").unwrap();
        assert_eq!(reloaded, Some(value));
        assert_eq!(storage.keys(), vec!["settings".to_string()]);
    }

    #[test]
    fn test_open_or_memory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"occupied").unwrap();

        let storage = Storage::open_or_memory(blocker.join("db"));
        assert!(!storage.is_durable());
        storage.write("contacts", &Vec::<i32>::new()).unwrap();
    }

    #[test]
    fn test_failed_read_keeps_stored_collection() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let tree = storage.tree.clone().unwrap();
        let stored = serde_json::to_vec(&vec![1, 2]).unwrap();
        tree.insert("items", stored).unwrap();

        storage.inner.medium_fault.store(true, Ordering::SeqCst);
        assert!(storage.read::<Vec<i32>, _>("items", || vec![9]).is_err());
        let bytes = tree.get("items").unwrap().unwrap();
        let on_disk: Vec<i32> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(on_disk, vec![1, 2]);

        storage.inner.medium_fault.store(false, Ordering::SeqCst);
        assert!(storage.is_durable());
        let items: Vec<i32> = storage.read("items", || vec![9]).unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_failed_write_through_degrades_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        storage.subscribe("items", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        storage.inner.medium_fault.store(true, Ordering::SeqCst);
        storage.write("items", &vec![1, 2, 3]).unwrap();
        assert!(!storage.is_durable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        storage.inner.medium_fault.store(false, Ordering::SeqCst);
        let items: Vec<i32> = storage.read("items", Vec::new).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
        let tree = storage.tree.as_ref().unwrap();
        assert!(tree.get("items").unwrap().is_none());

        // Later writes stay in memory for the rest of the session.
        storage.write("items", &vec![4]).unwrap();
        assert!(tree.get("items").unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_reseeds_on_next_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        storage.write("items", &vec![1, 2]).unwrap();

        assert!(storage.remove("items").unwrap());
        assert!(!storage.remove("items").unwrap());
        assert!(storage.reload::<Vec<i32>>("items").unwrap().is_none());

        let items: Vec<i32> = storage.read("items", || vec![9]).unwrap();
        assert_eq!(items, vec![9]);
    }
}
