//! Cache entry events and listeners.
//!
//! Listeners are registered through a [`CacheEntryListenerConfiguration`],
//! either up front in
//! [`MutableConfiguration`](crate::configuration::MutableConfiguration) or
//! later with [`Cache::register_listener`](crate::cache::Cache::register_listener).
//! The cache implementation builds the listener (and optional filter) from
//! the configured factories and delivers events in batches.

use crate::error::Result;
use crate::factory::{same_factory, FactoryRef};
use std::fmt;
use std::sync::Arc;

/// Kind of change an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Created,
    Updated,
    Removed,
    Expired,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Created => write!(f, "CREATED"),
            EventType::Updated => write!(f, "UPDATED"),
            EventType::Removed => write!(f, "REMOVED"),
            EventType::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A single change to one cache entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntryEvent<K, V> {
    source: String,
    event_type: EventType,
    key: K,
    value: Option<V>,
    old_value: Option<V>,
}

impl<K, V> CacheEntryEvent<K, V> {
    pub fn new(source: impl Into<String>, event_type: EventType, key: K) -> Self {
        CacheEntryEvent {
            source: source.into(),
            event_type,
            key,
            value: None,
            old_value: None,
        }
    }

    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_old_value(mut self, old_value: V) -> Self {
        self.old_value = Some(old_value);
        self
    }

    /// Name of the cache that raised the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Value after the change. For removals and expiries implementations may
    /// report the last value here.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Value before the change, when the listener asked for it.
    pub fn old_value(&self) -> Option<&V> {
        self.old_value.as_ref()
    }

    pub fn is_old_value_available(&self) -> bool {
        self.old_value.is_some()
    }
}

/// Receives batches of cache entry events.
///
/// Every hook defaults to a no-op so listeners only implement the events
/// they care about. A failing hook should be surfaced by the implementation
/// as [`Error::EntryListener`](crate::error::Error::EntryListener).
pub trait CacheEntryListener<K, V>: Send + Sync {
    fn on_created(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<()> {
        Ok(())
    }

    fn on_updated(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<()> {
        Ok(())
    }

    fn on_removed(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<()> {
        Ok(())
    }

    fn on_expired(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<()> {
        Ok(())
    }

    /// Route a batch of same-typed events to the matching hook.
    fn dispatch(&self, event_type: EventType, events: &[CacheEntryEvent<K, V>]) -> Result<()> {
        match event_type {
            EventType::Created => self.on_created(events),
            EventType::Updated => self.on_updated(events),
            EventType::Removed => self.on_removed(events),
            EventType::Expired => self.on_expired(events),
        }
    }
}

/// Decides whether an event reaches a listener.
pub trait CacheEntryEventFilter<K, V>: Send + Sync {
    fn evaluate(&self, event: &CacheEntryEvent<K, V>) -> Result<bool>;
}

impl<K, V, F> CacheEntryEventFilter<K, V> for F
where
    F: Fn(&CacheEntryEvent<K, V>) -> bool + Send + Sync,
{
    fn evaluate(&self, event: &CacheEntryEvent<K, V>) -> Result<bool> {
        Ok(self(event))
    }
}

pub type ListenerRef<K, V> = Arc<dyn CacheEntryListener<K, V>>;
pub type FilterRef<K, V> = Arc<dyn CacheEntryEventFilter<K, V>>;

/// How a listener is built and invoked.
pub trait CacheEntryListenerConfiguration<K, V>: Send + Sync {
    fn listener_factory(&self) -> FactoryRef<ListenerRef<K, V>>;

    fn filter_factory(&self) -> Option<FactoryRef<FilterRef<K, V>>>;

    /// Whether events must carry the previous value.
    fn is_old_value_required(&self) -> bool;

    /// Whether the cache operation blocks until the listener has run.
    fn is_synchronous(&self) -> bool;
}

/// Plain, clonable listener configuration.
///
/// Two configurations are equal when they share the same factories
/// (by identity) and flags, which is how caches detect duplicate
/// registrations.
pub struct MutableCacheEntryListenerConfiguration<K, V> {
    listener_factory: FactoryRef<ListenerRef<K, V>>,
    filter_factory: Option<FactoryRef<FilterRef<K, V>>>,
    old_value_required: bool,
    synchronous: bool,
}

impl<K, V> MutableCacheEntryListenerConfiguration<K, V> {
    pub fn new(listener_factory: FactoryRef<ListenerRef<K, V>>) -> Self {
        MutableCacheEntryListenerConfiguration {
            listener_factory,
            filter_factory: None,
            old_value_required: false,
            synchronous: false,
        }
    }

    /// Copy any listener configuration.
    pub fn from_configuration(config: &dyn CacheEntryListenerConfiguration<K, V>) -> Self {
        MutableCacheEntryListenerConfiguration {
            listener_factory: config.listener_factory(),
            filter_factory: config.filter_factory(),
            old_value_required: config.is_old_value_required(),
            synchronous: config.is_synchronous(),
        }
    }

    pub fn with_filter_factory(mut self, filter_factory: FactoryRef<FilterRef<K, V>>) -> Self {
        self.filter_factory = Some(filter_factory);
        self
    }

    pub fn with_old_value_required(mut self, required: bool) -> Self {
        self.old_value_required = required;
        self
    }

    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }
}

impl<K, V> Clone for MutableCacheEntryListenerConfiguration<K, V> {
    fn clone(&self) -> Self {
        MutableCacheEntryListenerConfiguration {
            listener_factory: Arc::clone(&self.listener_factory),
            filter_factory: self.filter_factory.clone(),
            old_value_required: self.old_value_required,
            synchronous: self.synchronous,
        }
    }
}

impl<K, V> PartialEq for MutableCacheEntryListenerConfiguration<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.listener_factory, &other.listener_factory)
            && same_factory(&self.filter_factory, &other.filter_factory)
            && self.old_value_required == other.old_value_required
            && self.synchronous == other.synchronous
    }
}

impl<K, V> fmt::Debug for MutableCacheEntryListenerConfiguration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableCacheEntryListenerConfiguration")
            .field("has_filter", &self.filter_factory.is_some())
            .field("old_value_required", &self.old_value_required)
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

impl<K, V> CacheEntryListenerConfiguration<K, V> for MutableCacheEntryListenerConfiguration<K, V>
where
    K: 'static,
    V: 'static,
{
    fn listener_factory(&self) -> FactoryRef<ListenerRef<K, V>> {
        Arc::clone(&self.listener_factory)
    }

    fn filter_factory(&self) -> Option<FactoryRef<FilterRef<K, V>>> {
        self.filter_factory.clone()
    }

    fn is_old_value_required(&self) -> bool {
        self.old_value_required
    }

    fn is_synchronous(&self) -> bool {
        self.synchronous
    }
}
