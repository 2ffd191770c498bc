//! Entry processors: atomic, caller-supplied mutations of one entry.
//!
//! [`Cache::invoke_raw`](crate::cache::Cache::invoke_raw) hands an
//! [`EntryProcessor`] a [`MutableEntry`] for one key. Whatever the processor
//! does to the entry is applied as if it were a single get / put / remove
//! sequence executed with exclusive access.
//!
//! [`StagedEntry`] is a ready-made `MutableEntry` for implementations: it
//! starts from the current value, lets the processor read and mutate it, and
//! reports the net effect as an [`EntryOutcome`] that the cache then commits.

use crate::error::{Error, Result};
use crate::integration::CacheLoader;

/// A view of one cache entry that can be read and mutated in place.
pub trait MutableEntry<K, V> {
    fn key(&self) -> &K;

    /// Current value. May trigger a read-through load.
    fn value(&mut self) -> Option<&V>;

    fn exists(&self) -> bool;

    /// Remove the entry when the processor returns.
    fn remove(&mut self);

    /// Set the value when the processor returns.
    fn set_value(&mut self, value: V);
}

/// A mutation unit invoked against one entry.
pub trait EntryProcessor<K, V>: Send + Sync {
    type Output;

    /// Inspect and mutate `entry`.
    ///
    /// Errors are propagated to the caller wrapped as
    /// [`Error::EntryProcessor`].
    fn process(&self, entry: &mut dyn MutableEntry<K, V>) -> Result<Self::Output>;
}

impl<K, V, T, F> EntryProcessor<K, V> for F
where
    F: Fn(&mut dyn MutableEntry<K, V>) -> Result<T> + Send + Sync,
{
    type Output = T;

    fn process(&self, entry: &mut dyn MutableEntry<K, V>) -> Result<T> {
        self(entry)
    }
}

/// Per-key result of an `invoke_all` call.
#[derive(Debug, Clone)]
pub struct EntryProcessorResult<T> {
    result: Result<T>,
}

impl<T> EntryProcessorResult<T> {
    pub fn new(result: Result<T>) -> Self {
        EntryProcessorResult { result }
    }

    /// The processor's output, or the wrapped failure.
    pub fn get(self) -> Result<T> {
        self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl<T> From<Result<T>> for EntryProcessorResult<T> {
    fn from(result: Result<T>) -> Self {
        EntryProcessorResult::new(result)
    }
}

/// Net effect of running a processor against a [`StagedEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome<V> {
    /// Nothing observed or changed.
    None,
    /// The value was read; an access-based expiry should be refreshed.
    Accessed,
    /// The value was loaded through a loader and should be stored.
    Loaded(V),
    /// A new value for an entry that did not exist.
    Created(V),
    /// A new value for an existing entry.
    Updated(V),
    /// An existing entry must be removed.
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staged {
    None,
    Accessed,
    Loaded,
    Created,
    Updated,
    Removed,
}

/// A [`MutableEntry`] that records changes instead of applying them.
pub struct StagedEntry<'a, K, V> {
    key: K,
    value: Option<V>,
    existed: bool,
    state: Staged,
    loader: Option<&'a dyn CacheLoader<K, V>>,
    load_error: Option<Error>,
}

impl<'a, K, V> StagedEntry<'a, K, V> {
    /// Stage `key` with its current value (`None` if absent).
    pub fn new(key: K, current: Option<V>) -> Self {
        StagedEntry {
            key,
            existed: current.is_some(),
            value: current,
            state: Staged::None,
            loader: None,
            load_error: None,
        }
    }

    /// Read through `loader` when the processor reads a missing value.
    pub fn with_loader(mut self, loader: &'a dyn CacheLoader<K, V>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// What the cache should commit.
    ///
    /// # Errors
    ///
    /// The read-through failure, wrapped as `Error::Loader`, if loading
    /// failed while the processor ran.
    pub fn outcome(self) -> Result<EntryOutcome<V>> {
        if let Some(err) = self.load_error {
            return Err(err);
        }
        let outcome = match (self.state, self.value) {
            (Staged::None, _) => EntryOutcome::None,
            (Staged::Accessed, _) => EntryOutcome::Accessed,
            (Staged::Loaded, Some(v)) => EntryOutcome::Loaded(v),
            (Staged::Created, Some(v)) => EntryOutcome::Created(v),
            (Staged::Updated, Some(v)) => EntryOutcome::Updated(v),
            (Staged::Removed, _) => EntryOutcome::Removed,
            (_, None) => EntryOutcome::None,
        };
        Ok(outcome)
    }

    fn try_load(&mut self) {
        let Some(loader) = self.loader else {
            return;
        };
        match loader.load(&self.key) {
            Ok(Some(value)) => {
                debug!("» StagedEntry loaded missing value through read-through loader");
                self.value = Some(value);
                self.state = Staged::Loaded;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("StagedEntry read-through load failed: {}", e);
                self.load_error = Some(e.into_loader());
            }
        }
    }
}

impl<'a, K, V> MutableEntry<K, V> for StagedEntry<'a, K, V> {
    fn key(&self) -> &K {
        &self.key
    }

    fn value(&mut self) -> Option<&V> {
        if self.state == Staged::None {
            if self.value.is_some() {
                self.state = Staged::Accessed;
            } else {
                self.try_load();
            }
        }
        self.value.as_ref()
    }

    fn exists(&self) -> bool {
        self.value.is_some()
    }

    fn remove(&mut self) {
        self.state = match self.state {
            Staged::Created | Staged::Loaded => Staged::None,
            _ if self.existed => Staged::Removed,
            _ => Staged::None,
        };
        self.value = None;
    }

    fn set_value(&mut self, value: V) {
        self.state = if self.existed {
            Staged::Updated
        } else {
            Staged::Created
        };
        self.value = Some(value);
    }
}
