//! In-memory provider used by the integration tests.
//!
//! Just enough of a vendor implementation to drive the contracts end to end:
//! a DashMap-backed cache with read-through, write-through, synchronous
//! listeners, statistics and store-by-value copies.

#![allow(dead_code)]

use cache_api::annotation::DefaultCacheKey;
use cache_api::cache::{self, CacheKey, CacheValue, RawProcessor};
use cache_api::event::{FilterRef, ListenerRef};
use cache_api::integration::{CacheLoaderRef, CacheWriterRef};
use cache_api::management::{CacheStatisticsMxBean, StatisticsCounters};
use cache_api::manager::{self, ErasedCache, ErasedConfiguration, Properties};
use cache_api::processor::{EntryOutcome, StagedEntry};
use cache_api::serialization::{ReferenceCopier, SerializingCopier, ValueCopier};
use cache_api::{
    Cache, CacheEntryEvent, CacheEntryEventFilter, CacheEntryListener,
    CacheEntryListenerConfiguration, CacheManager, CachingProvider, CompleteConfiguration,
    CompletionListener, Configuration, Entry, Error, EventType, Factory, MutableConfiguration,
    OptionalFeature, ProviderScope, Result,
};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Cache
// ============================================================================

type ListenerConfigRef<K, V> = Arc<dyn CacheEntryListenerConfiguration<K, V>>;

struct RegisteredListener<K, V> {
    config: ListenerConfigRef<K, V>,
    listener: ListenerRef<K, V>,
    filter: Option<FilterRef<K, V>>,
}

pub struct MemoryCache<K: CacheKey, V: CacheValue> {
    name: String,
    manager: Weak<MemoryManager>,
    config: Arc<MutableConfiguration<K, V>>,
    store: DashMap<K, V>,
    copier: Arc<dyn ValueCopier<V>>,
    closed: AtomicBool,
    listeners: RwLock<Vec<RegisteredListener<K, V>>>,
    loader: Option<CacheLoaderRef<K, V>>,
    writer: Option<CacheWriterRef<K, V>>,
    invoke_lock: Mutex<()>,
    pub stats: StatisticsCounters,
}

impl<K: CacheKey, V: CacheValue> MemoryCache<K, V> {
    pub fn new(
        name: &str,
        manager: Weak<MemoryManager>,
        config: MutableConfiguration<K, V>,
        copier: Arc<dyn ValueCopier<V>>,
    ) -> Self {
        let loader = config.loader_factory().map(|f| f.create());
        let writer = config.writer_factory().map(|f| f.create());
        let cache = MemoryCache {
            name: name.to_string(),
            manager,
            config: Arc::new(config.clone()),
            store: DashMap::new(),
            copier,
            closed: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            loader,
            writer,
            invoke_lock: Mutex::new(()),
            stats: StatisticsCounters::new(),
        };
        for listener in config.listener_configurations() {
            let _ = cache.register_listener(Arc::new(listener));
        }
        cache
    }

    fn check(&self) -> Result<()> {
        cache::ensure_open(&self.name, self.is_closed())
    }

    fn notify(&self, event_type: EventType, key: &K, value: Option<&V>, old: Option<&V>) -> Result<()> {
        let listeners = self.listeners.read().unwrap();
        for registered in listeners.iter() {
            let mut event = CacheEntryEvent::new(self.name.clone(), event_type, key.clone());
            if let Some(v) = value {
                event = event.with_value(v.clone());
            }
            if registered.config.is_old_value_required() {
                if let Some(o) = old {
                    event = event.with_old_value(o.clone());
                }
            }
            if let Some(filter) = &registered.filter {
                if !filter.evaluate(&event)? {
                    continue;
                }
            }
            registered
                .listener
                .dispatch(event_type, std::slice::from_ref(&event))
                .map_err(Error::into_entry_listener)?;
        }
        Ok(())
    }

    fn write_through(&self, key: &K, value: &V) -> Result<()> {
        if self.config.is_write_through() {
            if let Some(writer) = &self.writer {
                writer
                    .write(&Entry::new(key.clone(), value.clone()))
                    .map_err(Error::into_writer)?;
            }
        }
        Ok(())
    }

    fn delete_through(&self, key: &K) -> Result<()> {
        if self.config.is_write_through() {
            if let Some(writer) = &self.writer {
                writer.delete(key).map_err(Error::into_writer)?;
            }
        }
        Ok(())
    }

    fn store_value(&self, key: K, value: V) -> Result<Option<V>> {
        let started = Instant::now();
        self.write_through(&key, &value)?;
        let old = self.store.insert(key.clone(), self.copier.copy(&value)?);
        self.stats.record_puts(1);
        self.stats.record_put_time(started.elapsed());
        match &old {
            Some(o) => self.notify(EventType::Updated, &key, Some(&value), Some(o))?,
            None => self.notify(EventType::Created, &key, Some(&value), None)?,
        }
        Ok(old)
    }

    fn delete_value(&self, key: &K) -> Result<Option<V>> {
        let started = Instant::now();
        self.delete_through(key)?;
        let old = self.store.remove(key).map(|(_, v)| v);
        if let Some(o) = &old {
            self.stats.record_removals(1);
            self.stats.record_remove_time(started.elapsed());
            self.notify(EventType::Removed, key, Some(o), Some(o))?;
        }
        Ok(old)
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for MemoryCache<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>> {
        self.check()?;
        let started = Instant::now();
        let hit = self.store.get(key).map(|v| self.copier.copy(v.value()));
        if let Some(v) = hit.transpose()? {
            self.stats.record_hits(1);
            self.stats.record_get_time(started.elapsed());
            return Ok(Some(v));
        }
        self.stats.record_misses(1);
        if self.config.is_read_through() {
            if let Some(loader) = &self.loader {
                let loaded = loader.load(key).map_err(Error::into_loader)?;
                if let Some(v) = &loaded {
                    self.store.insert(key.clone(), self.copier.copy(v)?);
                    self.notify(EventType::Created, key, Some(v), None)?;
                }
                self.stats.record_get_time(started.elapsed());
                return Ok(loaded);
            }
        }
        self.stats.record_get_time(started.elapsed());
        Ok(None)
    }

    fn get_all(&self, keys: &HashSet<K>) -> Result<HashMap<K, V>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(v) = self.get(key)? {
                found.insert(key.clone(), v);
            }
        }
        Ok(found)
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        self.check()?;
        Ok(self.store.contains_key(key))
    }

    fn load_all(
        &self,
        keys: &HashSet<K>,
        replace_existing: bool,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> Result<()> {
        self.check()?;
        let outcome = match &self.loader {
            Some(loader) => {
                let wanted: Vec<K> = keys
                    .iter()
                    .filter(|k| replace_existing || !self.store.contains_key(*k))
                    .cloned()
                    .collect();
                loader
                    .load_all(&wanted)
                    .map_err(Error::into_loader)
                    .and_then(|loaded| {
                        for (k, v) in loaded {
                            self.store.insert(k, self.copier.copy(&v)?);
                        }
                        Ok(())
                    })
            }
            None => Ok(()),
        };
        if let Some(listener) = listener {
            match outcome {
                Ok(()) => listener.on_completion()?,
                Err(e) => listener.on_exception(e)?,
            }
        }
        Ok(())
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        self.check()?;
        self.store_value(key, value).map(|_| ())
    }

    fn get_and_put(&self, key: K, value: V) -> Result<Option<V>> {
        self.check()?;
        self.store_value(key, value)
    }

    fn put_all(&self, entries: HashMap<K, V>) -> Result<()> {
        self.check()?;
        for (k, v) in entries {
            self.store_value(k, v)?;
        }
        Ok(())
    }

    fn put_if_absent(&self, key: K, value: V) -> Result<bool> {
        self.check()?;
        if self.store.contains_key(&key) {
            return Ok(false);
        }
        self.store_value(key, value)?;
        Ok(true)
    }

    fn remove(&self, key: &K) -> Result<bool> {
        self.check()?;
        Ok(self.delete_value(key)?.is_some())
    }

    fn remove_if_equals(&self, key: &K, old_value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.check()?;
        let matches = self.store.get(key).is_some_and(|v| *v == *old_value);
        if matches {
            self.delete_value(key)?;
        }
        Ok(matches)
    }

    fn get_and_remove(&self, key: &K) -> Result<Option<V>> {
        self.check()?;
        self.delete_value(key)
    }

    fn replace_if_equals(&self, key: &K, old_value: &V, new_value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.check()?;
        let matches = self.store.get(key).is_some_and(|v| *v == *old_value);
        if matches {
            self.store_value(key.clone(), new_value)?;
        }
        Ok(matches)
    }

    fn replace(&self, key: &K, value: V) -> Result<bool> {
        Ok(self.get_and_replace(key, value)?.is_some())
    }

    fn get_and_replace(&self, key: &K, value: V) -> Result<Option<V>> {
        self.check()?;
        if !self.store.contains_key(key) {
            return Ok(None);
        }
        self.store_value(key.clone(), value)
    }

    fn remove_keys(&self, keys: &HashSet<K>) -> Result<()> {
        self.check()?;
        for key in keys {
            self.delete_value(key)?;
        }
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        self.check()?;
        let keys: Vec<K> = self.store.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.delete_value(&key)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check()?;
        self.store.clear();
        Ok(())
    }

    fn configuration(&self) -> Arc<dyn CompleteConfiguration<K, V>> {
        Arc::clone(&self.config) as Arc<dyn CompleteConfiguration<K, V>>
    }

    fn invoke_raw(&self, key: &K, processor: &mut RawProcessor<'_, K, V>) -> Result<()> {
        self.check()?;
        let _guard = self.invoke_lock.lock().unwrap();
        let current = self
            .store
            .get(key)
            .map(|v| self.copier.copy(v.value()))
            .transpose()?;
        let mut staged = StagedEntry::new(key.clone(), current);
        if self.config.is_read_through() {
            if let Some(loader) = &self.loader {
                staged = staged.with_loader(loader.as_ref());
            }
        }
        processor(&mut staged)?;
        match staged.outcome()? {
            EntryOutcome::Created(v) | EntryOutcome::Updated(v) | EntryOutcome::Loaded(v) => {
                self.store_value(key.clone(), v)?;
            }
            EntryOutcome::Removed => {
                self.delete_value(key)?;
            }
            EntryOutcome::Accessed => self.stats.record_hits(1),
            EntryOutcome::None => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn cache_manager(&self) -> Option<Arc<dyn CacheManager>> {
        self.manager
            .upgrade()
            .map(|m| m as Arc<dyn CacheManager>)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn register_listener(&self, config: ListenerConfigRef<K, V>) -> Result<()> {
        self.check()?;
        let mut listeners = self.listeners.write().unwrap();
        if listeners.iter().any(|r| same_config(&r.config, &config)) {
            return Err(Error::InvalidArgument(
                "listener configuration already registered".to_string(),
            ));
        }
        let listener = config.listener_factory().create();
        let filter = config.filter_factory().map(|f| f.create());
        listeners.push(RegisteredListener {
            config,
            listener,
            filter,
        });
        Ok(())
    }

    fn deregister_listener(&self, config: &ListenerConfigRef<K, V>) -> Result<()> {
        self.check()?;
        self.listeners
            .write()
            .unwrap()
            .retain(|r| !same_config(&r.config, config));
        Ok(())
    }

    fn entries(&self) -> Result<Vec<Entry<K, V>>> {
        self.check()?;
        self.store
            .iter()
            .map(|e| {
                self.copier
                    .copy(e.value())
                    .map(|v| Entry::new(e.key().clone(), v))
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn same_config<K, V>(a: &ListenerConfigRef<K, V>, b: &ListenerConfigRef<K, V>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// ============================================================================
// Manager
// ============================================================================

type Constructor =
    Arc<dyn Fn(&Weak<MemoryManager>, &str, ErasedConfiguration) -> Result<ErasedCache> + Send + Sync>;

pub struct MemoryManager {
    provider: Arc<dyn CachingProvider>,
    uri: String,
    scope: ProviderScope,
    properties: Properties,
    caches: DashMap<String, ErasedCache>,
    constructors: DashMap<(TypeId, TypeId), Constructor>,
    closed: AtomicBool,
    this: Weak<MemoryManager>,
}

impl MemoryManager {
    pub fn new(
        provider: Arc<dyn CachingProvider>,
        uri: &str,
        scope: ProviderScope,
        properties: Properties,
    ) -> Arc<Self> {
        let manager = Arc::new_cyclic(|this| MemoryManager {
            provider,
            uri: uri.to_string(),
            scope,
            properties,
            caches: DashMap::new(),
            constructors: DashMap::new(),
            closed: AtomicBool::new(false),
            this: this.clone(),
        });
        manager.support_by_value::<String, String>();
        manager.support_by_value::<String, u64>();
        manager.support_by_value::<u64, String>();
        manager.support_by_value::<String, i32>();
        manager.support_by_value::<DefaultCacheKey, String>();
        manager.support_by_value::<DefaultCacheKey, u64>();
        manager.support::<DefaultCacheKey, Error>();
        manager
    }

    /// Allow caches with these key and value types, always stored by
    /// reference.
    pub fn support<K: CacheKey, V: CacheValue>(&self) {
        self.support_with::<K, V>(|_| Arc::new(ReferenceCopier) as Arc<dyn ValueCopier<V>>);
    }

    /// Allow caches with these key and value types, copying values through
    /// serialization when the configuration asks for store-by-value.
    pub fn support_by_value<K: CacheKey, V: CacheValue + Serialize + DeserializeOwned>(&self) {
        self.support_with::<K, V>(|config| {
            if config.is_store_by_value() {
                Arc::new(SerializingCopier::<V>::new()) as Arc<dyn ValueCopier<V>>
            } else {
                Arc::new(ReferenceCopier)
            }
        });
    }

    fn support_with<K: CacheKey, V: CacheValue>(
        &self,
        copier_for: fn(&MutableConfiguration<K, V>) -> Arc<dyn ValueCopier<V>>,
    ) {
        let constructor: Constructor = Arc::new(
            move |manager: &Weak<MemoryManager>, name: &str, config: ErasedConfiguration| {
                let config = config.downcast::<K, V>()?;
                let copier = copier_for(&config);
                let cache: Arc<dyn Cache<K, V>> =
                    Arc::new(MemoryCache::new(name, manager.clone(), config, copier));
                Ok(ErasedCache::new(cache))
            },
        );
        self.constructors
            .insert((TypeId::of::<K>(), TypeId::of::<V>()), constructor);
    }

    fn check(&self) -> Result<()> {
        manager::ensure_open(&self.uri, self.is_closed())
    }
}

impl CacheManager for MemoryManager {
    fn caching_provider(&self) -> Arc<dyn CachingProvider> {
        Arc::clone(&self.provider)
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn scope(&self) -> ProviderScope {
        self.scope.clone()
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn create_cache_erased(&self, name: &str, config: ErasedConfiguration) -> Result<ErasedCache> {
        self.check()?;
        if self.caches.contains_key(name) {
            return Err(Error::Cache(format!("A cache named {} already exists", name)));
        }
        let types = (config.key_type_id(), config.value_type_id());
        let constructor = self
            .constructors
            .get(&types)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| {
                Error::Unsupported(format!(
                    "caches of <{}, {}>",
                    config.key_type_name(),
                    config.value_type_name()
                ))
            })?;
        let cache = constructor(&self.this, name, config)?;
        self.caches.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    fn cache_erased(&self, name: &str) -> Result<Option<ErasedCache>> {
        self.check()?;
        Ok(self.caches.get(name).map(|c| c.value().clone()))
    }

    fn cache_names(&self) -> Result<Vec<String>> {
        self.check()?;
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn destroy_cache(&self, name: &str) -> Result<()> {
        self.check()?;
        if let Some((_, cache)) = self.caches.remove(name) {
            cache.clear()?;
            cache.close();
        }
        Ok(())
    }

    fn enable_management(&self, _name: &str, _enabled: bool) -> Result<()> {
        self.check()
    }

    fn enable_statistics(&self, _name: &str, _enabled: bool) -> Result<()> {
        self.check()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for entry in self.caches.iter() {
            entry.value().close();
        }
        self.caches.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Default)]
pub struct MemoryProvider {
    managers: DashMap<(u64, String), Arc<MemoryManager>>,
    this: RwLock<Weak<MemoryProvider>>,
}

impl MemoryProvider {
    pub fn shared() -> Arc<MemoryProvider> {
        let provider = Arc::new(MemoryProvider::default());
        *provider.this.write().unwrap() = Arc::downgrade(&provider);
        provider
    }

    fn handle(&self) -> Result<Arc<dyn CachingProvider>> {
        self.this
            .read()
            .unwrap()
            .upgrade()
            .map(|p| p as Arc<dyn CachingProvider>)
            .ok_or_else(|| Error::IllegalState("provider was not created with shared()".to_string()))
    }

    /// Register this provider in `scope` under `name`.
    pub fn register_in(scope: &ProviderScope, name: &'static str) {
        scope.register_named(name, || Ok(MemoryProvider::shared() as Arc<dyn CachingProvider>));
    }
}

impl CachingProvider for MemoryProvider {
    fn cache_manager(
        &self,
        uri: Option<&str>,
        scope: Option<&ProviderScope>,
        properties: Option<Properties>,
    ) -> Result<Arc<dyn CacheManager>> {
        let uri = uri.map(str::to_string).unwrap_or_else(|| self.default_uri());
        let scope = scope.cloned().unwrap_or_else(|| self.default_scope());
        let key = (scope.id(), uri.clone());
        if let Some(existing) = self.managers.get(&key) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing.value()) as Arc<dyn CacheManager>);
            }
        }
        let properties = properties.unwrap_or_else(|| self.default_properties());
        let manager = MemoryManager::new(self.handle()?, &uri, scope, properties);
        self.managers.insert(key, Arc::clone(&manager));
        Ok(manager as Arc<dyn CacheManager>)
    }

    fn default_uri(&self) -> String {
        "memory://default".to_string()
    }

    fn close(&self) -> Result<()> {
        for entry in self.managers.iter() {
            entry.value().close()?;
        }
        self.managers.clear();
        Ok(())
    }

    fn close_scope(&self, scope: &ProviderScope) -> Result<()> {
        let id = scope.id();
        self.managers.retain(|(scope_id, _), manager| {
            if *scope_id == id {
                let _ = manager.close();
                false
            } else {
                true
            }
        });
        Ok(())
    }

    fn close_manager(&self, uri: &str, scope: &ProviderScope) -> Result<()> {
        if let Some((_, manager)) = self.managers.remove(&(scope.id(), uri.to_string())) {
            manager.close()?;
        }
        Ok(())
    }

    fn is_supported(&self, feature: OptionalFeature) -> bool {
        matches!(feature, OptionalFeature::StoreByReference)
    }
}

/// The [`MemoryManager`] behind a manager handed out by [`MemoryProvider`].
pub fn memory_manager(manager: &Arc<dyn CacheManager>) -> &MemoryManager {
    match manager.as_any().downcast_ref::<MemoryManager>() {
        Some(memory) => memory,
        None => panic!("not a MemoryManager"),
    }
}

/// Statistics of a cache created by [`MemoryManager`].
pub fn statistics_of<K: CacheKey, V: CacheValue>(cache: &Arc<dyn Cache<K, V>>) -> &dyn CacheStatisticsMxBean {
    match cache.as_any().downcast_ref::<MemoryCache<K, V>>() {
        Some(memory) => &memory.stats,
        None => panic!("not a MemoryCache"),
    }
}
