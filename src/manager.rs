//! Cache managers.
//!
//! A [`CacheManager`] owns uniquely named caches and is identified by a URI
//! within a [`ProviderScope`]. The trait is object safe, so caches cross it
//! type-erased: [`ErasedConfiguration`] in, [`ErasedCache`] out.
//! [`CacheManagerExt`] puts the key and value types back and reports a wrong
//! guess as `Error::TypeMismatch`.
//!
//! ```ignore
//! use cache_api::{CacheManagerExt, MutableConfiguration};
//!
//! let manager = provider.default_cache_manager()?;
//! let users = manager.create_cache::<u64, String>("users", MutableConfiguration::new())?;
//! users.put(1, "alice".to_string())?;
//!
//! let again = manager.get_cache::<u64, String>("users")?.expect("cache exists");
//! assert_eq!(again.get(&1)?, Some("alice".to_string()));
//! ```

use crate::cache::{Cache, CacheKey, CacheValue};
use crate::configuration::MutableConfiguration;
use crate::error::{Error, Result};
use crate::spi::{CachingProvider, ProviderScope};
use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Vendor-specific manager and provider properties.
pub type Properties = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TypePair {
    key: TypeId,
    value: TypeId,
    key_name: &'static str,
    value_name: &'static str,
}

impl TypePair {
    fn of<K: 'static, V: 'static>() -> Self {
        TypePair {
            key: TypeId::of::<K>(),
            value: TypeId::of::<V>(),
            key_name: type_name::<K>(),
            value_name: type_name::<V>(),
        }
    }

    fn matches<K: 'static, V: 'static>(&self) -> bool {
        self.key == TypeId::of::<K>() && self.value == TypeId::of::<V>()
    }

    fn mismatch<K: 'static, V: 'static>(&self) -> Error {
        Error::TypeMismatch {
            expected: format!("<{}, {}>", type_name::<K>(), type_name::<V>()),
            found: format!("<{}, {}>", self.key_name, self.value_name),
        }
    }
}

/// A typed [`MutableConfiguration`] with its types erased.
pub struct ErasedConfiguration {
    types: TypePair,
    config: Box<dyn Any + Send + Sync>,
}

impl ErasedConfiguration {
    pub fn new<K: CacheKey, V: CacheValue>(config: MutableConfiguration<K, V>) -> Self {
        ErasedConfiguration {
            types: TypePair::of::<K, V>(),
            config: Box::new(config),
        }
    }

    pub fn is<K: CacheKey, V: CacheValue>(&self) -> bool {
        self.types.matches::<K, V>()
    }

    pub fn key_type_id(&self) -> TypeId {
        self.types.key
    }

    pub fn value_type_id(&self) -> TypeId {
        self.types.value
    }

    pub fn key_type_name(&self) -> &'static str {
        self.types.key_name
    }

    pub fn value_type_name(&self) -> &'static str {
        self.types.value_name
    }

    /// Recover the typed configuration.
    ///
    /// # Errors
    ///
    /// `Error::TypeMismatch` when `K`/`V` differ from the original types.
    pub fn downcast<K: CacheKey, V: CacheValue>(self) -> Result<MutableConfiguration<K, V>> {
        let types = self.types;
        self.config
            .downcast::<MutableConfiguration<K, V>>()
            .map(|boxed| *boxed)
            .map_err(|_| types.mismatch::<K, V>())
    }
}

impl fmt::Debug for ErasedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ErasedConfiguration<{}, {}>",
            self.types.key_name, self.types.value_name
        )
    }
}

/// Lifecycle operations that do not need the key and value types.
trait CacheHandle: Send + Sync {
    fn close(&self);
    fn is_closed(&self) -> bool;
    fn clear(&self) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

struct TypedHandle<K: CacheKey, V: CacheValue>(Arc<dyn Cache<K, V>>);

impl<K: CacheKey, V: CacheValue> CacheHandle for TypedHandle<K, V> {
    fn close(&self) {
        self.0.close()
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    fn clear(&self) -> Result<()> {
        self.0.clear()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A typed `Arc<dyn Cache<K, V>>` with its types erased.
///
/// Lifecycle operations stay available without the types, so managers can
/// close and clear caches they only hold erased.
#[derive(Clone)]
pub struct ErasedCache {
    name: String,
    types: TypePair,
    handle: Arc<dyn CacheHandle>,
}

impl ErasedCache {
    pub fn new<K: CacheKey, V: CacheValue>(cache: Arc<dyn Cache<K, V>>) -> Self {
        ErasedCache {
            name: cache.name().to_string(),
            types: TypePair::of::<K, V>(),
            handle: Arc::new(TypedHandle(cache)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is<K: CacheKey, V: CacheValue>(&self) -> bool {
        self.types.matches::<K, V>()
    }

    pub fn close(&self) {
        self.handle.close()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn clear(&self) -> Result<()> {
        self.handle.clear()
    }

    /// Recover the typed cache.
    ///
    /// # Errors
    ///
    /// `Error::TypeMismatch` when `K`/`V` differ from the cache's types.
    pub fn downcast<K: CacheKey, V: CacheValue>(&self) -> Result<Arc<dyn Cache<K, V>>> {
        self.handle
            .as_any()
            .downcast_ref::<TypedHandle<K, V>>()
            .map(|typed| Arc::clone(&typed.0))
            .ok_or_else(|| self.types.mismatch::<K, V>())
    }
}

impl fmt::Debug for ErasedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ErasedCache({}: <{}, {}>)",
            self.name, self.types.key_name, self.types.value_name
        )
    }
}

/// Owns and manages the lifecycle of named caches.
///
/// Every operation on a closed manager, apart from `close` and `is_closed`,
/// fails with `Error::IllegalState`.
pub trait CacheManager: Send + Sync {
    /// The provider that created this manager.
    fn caching_provider(&self) -> Arc<dyn CachingProvider>;

    fn uri(&self) -> &str;

    fn scope(&self) -> ProviderScope;

    fn properties(&self) -> &Properties;

    /// Create a cache.
    ///
    /// # Errors
    ///
    /// `Error::Cache` if a cache with this name exists;
    /// `Error::TypeMismatch` if the implementation cannot hold these types.
    fn create_cache_erased(&self, name: &str, config: ErasedConfiguration) -> Result<ErasedCache>;

    /// Look up a cache by name.
    fn cache_erased(&self, name: &str) -> Result<Option<ErasedCache>>;

    fn cache_names(&self) -> Result<Vec<String>>;

    /// Close and remove a cache and all of its entries.
    fn destroy_cache(&self, name: &str) -> Result<()>;

    fn enable_management(&self, name: &str, enabled: bool) -> Result<()>;

    fn enable_statistics(&self, name: &str, enabled: bool) -> Result<()>;

    /// Close every cache and release the manager's resources.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Access to the implementation type.
    fn as_any(&self) -> &dyn Any;
}

/// Typed helpers for every [`CacheManager`].
pub trait CacheManagerExt: CacheManager {
    /// Create a cache with the given key and value types.
    fn create_cache<K: CacheKey, V: CacheValue>(
        &self,
        name: &str,
        config: MutableConfiguration<K, V>,
    ) -> Result<Arc<dyn Cache<K, V>>> {
        debug!(
            "» Creating cache {} <{}, {}>",
            name,
            type_name::<K>(),
            type_name::<V>()
        );
        self.create_cache_erased(name, ErasedConfiguration::new(config))?
            .downcast::<K, V>()
    }

    /// Look up a cache with the given key and value types.
    ///
    /// # Errors
    ///
    /// `Error::TypeMismatch` if the cache exists with other types.
    fn get_cache<K: CacheKey, V: CacheValue>(&self, name: &str) -> Result<Option<Arc<dyn Cache<K, V>>>> {
        match self.cache_erased(name)? {
            Some(erased) => erased.downcast::<K, V>().map(Some),
            None => Ok(None),
        }
    }
}

impl<M: CacheManager + ?Sized> CacheManagerExt for M {}

/// Fail with `Error::IllegalState` when `closed`; for implementations.
pub fn ensure_open(uri: &str, closed: bool) -> Result<()> {
    if closed {
        return Err(Error::IllegalState(format!(
            "CacheManager {} is closed",
            uri
        )));
    }
    Ok(())
}
