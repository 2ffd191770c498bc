//! The core cache contract.
//!
//! [`Cache`] is object safe so managers can hand out `Arc<dyn Cache<K, V>>`.
//! Operations that need a generic result type (entry processing) go through
//! [`Cache::invoke_raw`] and are exposed with their types restored by
//! [`CacheExt`].
//!
//! Keys and values are never null: absence is always `None`, which removes
//! the ambiguity between "mapped to nothing" and "not mapped".

use crate::configuration::CompleteConfiguration;
use crate::error::{Error, Result};
use crate::event::CacheEntryListenerConfiguration;
use crate::integration::CompletionListener;
use crate::manager::CacheManager;
use crate::processor::{EntryProcessor, EntryProcessorResult, MutableEntry};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

/// A key/value pair read from or written to a cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Entry { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Entry::new(key, value)
    }
}

/// Bounds every cache key satisfies.
pub trait CacheKey: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// Bounds every cache value satisfies.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// Callback type passed to [`Cache::invoke_raw`].
pub type RawProcessor<'a, K, V> = dyn FnMut(&mut dyn MutableEntry<K, V>) -> Result<()> + 'a;

/// A named, typed cache owned by one [`CacheManager`].
///
/// Every operation on a closed cache fails with `Error::IllegalState`.
/// Failures coming out of loaders, writers, listeners and processors are
/// wrapped in their matching [`Error`] variant.
pub trait Cache<K: CacheKey, V: CacheValue>: Send + Sync {
    /// Value for `key`, reading through the configured loader on a miss.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Values for every present key in `keys`.
    fn get_all(&self, keys: &HashSet<K>) -> Result<HashMap<K, V>>;

    /// Whether `key` is mapped. Never triggers a load.
    fn contains_key(&self, key: &K) -> Result<bool>;

    /// Load `keys` through the loader, reporting completion to `listener`.
    ///
    /// Keys already present are reloaded only when `replace_existing`.
    fn load_all(
        &self,
        keys: &HashSet<K>,
        replace_existing: bool,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> Result<()>;

    fn put(&self, key: K, value: V) -> Result<()>;

    /// Store `value` and return the previous one.
    fn get_and_put(&self, key: K, value: V) -> Result<Option<V>>;

    fn put_all(&self, entries: HashMap<K, V>) -> Result<()>;

    /// Store `value` unless `key` is mapped; returns whether it was stored.
    fn put_if_absent(&self, key: K, value: V) -> Result<bool>;

    /// Remove `key`; returns whether it was mapped.
    fn remove(&self, key: &K) -> Result<bool>;

    /// Remove `key` only while it maps to `old_value`.
    fn remove_if_equals(&self, key: &K, old_value: &V) -> Result<bool>
    where
        V: PartialEq;

    fn get_and_remove(&self, key: &K) -> Result<Option<V>>;

    /// Replace only while `key` maps to `old_value`.
    fn replace_if_equals(&self, key: &K, old_value: &V, new_value: V) -> Result<bool>
    where
        V: PartialEq;

    /// Replace only if `key` is mapped; returns whether it was.
    fn replace(&self, key: &K, value: V) -> Result<bool>;

    /// Replace only if `key` is mapped; returns the previous value.
    fn get_and_replace(&self, key: &K, value: V) -> Result<Option<V>>;

    /// Remove the given keys, notifying listeners and writers.
    fn remove_keys(&self, keys: &HashSet<K>) -> Result<()>;

    /// Remove every entry, notifying listeners and writers.
    fn remove_all(&self) -> Result<()>;

    /// Remove every entry without notifying listeners or writers.
    fn clear(&self) -> Result<()>;

    /// Read-only view of the configuration the cache was created with.
    fn configuration(&self) -> Arc<dyn CompleteConfiguration<K, V>>;

    /// Run `processor` against the entry for `key` with exclusive access.
    ///
    /// Typed callers use [`CacheExt::invoke`].
    fn invoke_raw(&self, key: &K, processor: &mut RawProcessor<'_, K, V>) -> Result<()>;

    fn name(&self) -> &str;

    /// The manager that owns this cache, if it is still alive.
    fn cache_manager(&self) -> Option<Arc<dyn CacheManager>>;

    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Start delivering events to a listener.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if the same configuration is already
    /// registered.
    fn register_listener(
        &self,
        config: Arc<dyn CacheEntryListenerConfiguration<K, V>>,
    ) -> Result<()>;

    fn deregister_listener(
        &self,
        config: &Arc<dyn CacheEntryListenerConfiguration<K, V>>,
    ) -> Result<()>;

    /// Snapshot of the current entries. Iteration order is unspecified.
    fn entries(&self) -> Result<Vec<Entry<K, V>>>;

    /// Access to the implementation type.
    fn as_any(&self) -> &dyn Any;
}

/// Typed helpers for every [`Cache`].
pub trait CacheExt<K: CacheKey, V: CacheValue>: Cache<K, V> {
    /// Run an entry processor and return its output.
    ///
    /// # Errors
    ///
    /// Processor failures are wrapped as `Error::EntryProcessor`; other
    /// failures of the cache itself pass through unchanged.
    fn invoke<P>(&self, key: &K, processor: &P) -> Result<P::Output>
    where
        P: EntryProcessor<K, V> + ?Sized,
    {
        let mut output = None;
        let mut processor_error = None;
        let mut run = |entry: &mut dyn MutableEntry<K, V>| -> Result<()> {
            match processor.process(entry) {
                Ok(out) => {
                    output = Some(out);
                    Ok(())
                }
                Err(e) => {
                    let wrapped = e.into_entry_processor();
                    processor_error = Some(wrapped.clone());
                    Err(wrapped)
                }
            }
        };
        let result = self.invoke_raw(key, &mut run);
        if let Some(e) = processor_error {
            return Err(e);
        }
        result?;
        output.ok_or_else(|| {
            Error::IllegalState(format!(
                "cache {} did not run the entry processor",
                self.name()
            ))
        })
    }

    /// Run an entry processor against each key; every key maps to its own
    /// [`EntryProcessorResult`].
    fn invoke_all<P>(
        &self,
        keys: &HashSet<K>,
        processor: &P,
    ) -> HashMap<K, EntryProcessorResult<P::Output>>
    where
        P: EntryProcessor<K, V> + ?Sized,
    {
        keys.iter()
            .map(|key| (key.clone(), self.invoke(key, processor).into()))
            .collect()
    }

    /// Value for `key`, or the result of `compute` which is then stored.
    fn get_or_put_with<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        if let Some(value) = self.get(&key)? {
            return Ok(value);
        }
        let value = compute(&key)?;
        self.put(key, value.clone())?;
        Ok(value)
    }
}

impl<K: CacheKey, V: CacheValue, C: Cache<K, V> + ?Sized> CacheExt<K, V> for C {}

/// Fail with `Error::IllegalState` when `closed`; for implementations.
pub fn ensure_open(name: &str, closed: bool) -> Result<()> {
    if closed {
        return Err(Error::IllegalState(format!("Cache {} is closed", name)));
    }
    Ok(())
}
