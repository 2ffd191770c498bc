//! Read-through and write-through integration points.
//!
//! A [`CacheLoader`] is consulted on a miss when the cache is configured for
//! read-through; a [`CacheWriter`] is called on every mutation when the cache
//! is configured for write-through. [`CompletionListener`] reports the end of
//! asynchronous work such as
//! [`Cache::load_all`](crate::cache::Cache::load_all), and
//! [`CompletionListenerFuture`] turns that callback into something a caller
//! can wait on.

use crate::cache::Entry;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Loads values from an external source of truth.
pub trait CacheLoader<K, V>: Send + Sync {
    /// Load the value for `key`.
    ///
    /// # Returns
    /// - `Ok(Some(value))` - Value found
    /// - `Ok(None)` - Nothing to cache for this key (not an error)
    ///
    /// # Errors
    /// Returns `Err` if the source is unavailable. Implementations surface
    /// this to callers as `Error::Loader`.
    fn load(&self, key: &K) -> Result<Option<V>>;

    /// Load several keys at once.
    ///
    /// Default implementation calls `load()` for each key and omits keys with
    /// no value. Override for batch efficiency.
    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>>
    where
        K: Clone + Eq + Hash,
    {
        let mut loaded = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.load(key)? {
                loaded.insert(key.clone(), value);
            }
        }
        Ok(loaded)
    }
}

/// Writes cache mutations through to an external store.
pub trait CacheWriter<K, V>: Send + Sync {
    fn write(&self, entry: &Entry<K, V>) -> Result<()>;

    /// Write a batch.
    ///
    /// On failure `entries` must hold exactly the entries that were not
    /// written. The default implementation writes one at a time and drains
    /// as it goes.
    fn write_all(&self, entries: &mut Vec<Entry<K, V>>) -> Result<()> {
        let mut written = 0;
        let result = entries.iter().try_for_each(|entry| {
            self.write(entry)?;
            written += 1;
            Ok(())
        });
        entries.drain(..written);
        result
    }

    fn delete(&self, key: &K) -> Result<()>;

    /// Delete a batch. Same partial-failure contract as [`Self::write_all`].
    fn delete_all(&self, keys: &mut Vec<K>) -> Result<()> {
        let mut deleted = 0;
        let result = keys.iter().try_for_each(|key| {
            self.delete(key)?;
            deleted += 1;
            Ok(())
        });
        keys.drain(..deleted);
        result
    }
}

pub type CacheLoaderRef<K, V> = Arc<dyn CacheLoader<K, V>>;
pub type CacheWriterRef<K, V> = Arc<dyn CacheWriter<K, V>>;

/// Notified once an asynchronous operation finishes.
pub trait CompletionListener: Send + Sync {
    fn on_completion(&self) -> Result<()>;

    fn on_exception(&self, error: Error) -> Result<()>;
}

#[derive(Debug, Clone)]
enum Completion {
    Pending,
    Completed,
    Failed(Error),
}

/// A [`CompletionListener`] that can be waited on.
///
/// One instance serves exactly one operation: a second `on_completion` or
/// `on_exception` call is rejected with `Error::IllegalState`.
///
/// ```
/// use cache_api::integration::{CompletionListener, CompletionListenerFuture};
/// use std::sync::Arc;
///
/// let future = Arc::new(CompletionListenerFuture::new());
/// let listener = Arc::clone(&future);
/// std::thread::spawn(move || listener.on_completion());
///
/// future.get().unwrap();
/// assert!(future.is_done());
/// ```
#[derive(Debug)]
pub struct CompletionListenerFuture {
    state: Mutex<Completion>,
    cond: Condvar,
    notify: Notify,
}

impl Default for CompletionListenerFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionListenerFuture {
    pub fn new() -> Self {
        CompletionListenerFuture {
            state: Mutex::new(Completion::Pending),
            cond: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Whether either callback has fired.
    pub fn is_done(&self) -> bool {
        !matches!(*self.lock(), Completion::Pending)
    }

    /// Cancellation is not supported.
    ///
    /// # Errors
    ///
    /// Always `Error::Unsupported`.
    pub fn cancel(&self, _may_interrupt: bool) -> Result<bool> {
        Err(Error::Unsupported(
            "CompletionListenerFuture cannot be cancelled".to_string(),
        ))
    }

    pub fn is_cancelled(&self) -> bool {
        false
    }

    /// Block until the operation finishes.
    ///
    /// # Errors
    ///
    /// `Error::Execution` wrapping the failure passed to `on_exception`.
    pub fn get(&self) -> Result<()> {
        let state = self.wait_untimed(self.lock());
        Self::outcome(&state)
    }

    /// Block until the operation finishes or `timeout` elapses.
    ///
    /// A timeout too large to express as a deadline waits like [`Self::get`].
    ///
    /// # Errors
    ///
    /// `Error::Timeout` if no callback fired in time, otherwise as
    /// [`Self::get`].
    pub fn get_timeout(&self, timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        if !matches!(*state, Completion::Pending) {
            return Self::outcome(&state);
        }
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            let state = self.wait_untimed(state);
            return Self::outcome(&state);
        };
        while matches!(*state, Completion::Pending) {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!(
                    "operation did not complete within {:?}",
                    timeout
                )));
            }
            let (next, _) = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = next;
        }
        Self::outcome(&state)
    }

    /// Wait for completion without blocking a tokio worker.
    pub async fn wait(&self) -> Result<()> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.lock();
                if !matches!(*state, Completion::Pending) {
                    return Self::outcome(&state);
                }
            }
            notified.await;
        }
    }

    fn wait_untimed<'a>(&self, mut state: MutexGuard<'a, Completion>) -> MutexGuard<'a, Completion> {
        while matches!(*state, Completion::Pending) {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state
    }

    fn lock(&self) -> MutexGuard<'_, Completion> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn outcome(state: &Completion) -> Result<()> {
        match state {
            Completion::Completed => Ok(()),
            Completion::Failed(e) => Err(Error::Execution(Box::new(e.clone()))),
            Completion::Pending => Err(Error::IllegalState(
                "operation has not completed".to_string(),
            )),
        }
    }

    fn finish(&self, completion: Completion) -> Result<()> {
        let mut state = self.lock();
        if !matches!(*state, Completion::Pending) {
            return Err(Error::IllegalState(
                "Attempted to use a CompletionListenerFuture instance more than once".to_string(),
            ));
        }
        *state = completion;
        drop(state);
        self.cond.notify_all();
        self.notify.notify_waiters();
        Ok(())
    }
}

impl CompletionListener for CompletionListenerFuture {
    fn on_completion(&self) -> Result<()> {
        debug!("CompletionListenerFuture completed");
        self.finish(Completion::Completed)
    }

    fn on_exception(&self, error: Error) -> Result<()> {
        debug!("CompletionListenerFuture failed: {}", error);
        self.finish(Completion::Failed(error))
    }
}
