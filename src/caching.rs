//! Process-wide entry point.
//!
//! [`Caching`] delegates to one lazily created [`CachingProviderRegistry`].
//! The `_in` variants take an explicit [`ProviderScope`]; the others use
//! [`Caching::default_scope`].
//!
//! ```ignore
//! use cache_api::Caching;
//!
//! let provider = Caching::caching_provider()?;
//! let manager = provider.default_cache_manager()?;
//! ```

use crate::cache::{Cache, CacheKey, CacheValue};
use crate::error::Result;
use crate::manager::CacheManagerExt;
use crate::spi::{CachingProvider, CachingProviderRegistry, ProviderScope};
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<CachingProviderRegistry> = OnceLock::new();

/// Static access to the process-wide provider registry.
pub struct Caching;

impl Caching {
    /// The shared registry, created on first use.
    pub fn registry() -> &'static CachingProviderRegistry {
        REGISTRY.get_or_init(|| {
            debug!("» Initializing process-wide CachingProviderRegistry");
            CachingProviderRegistry::new()
        })
    }

    pub fn default_scope() -> ProviderScope {
        Self::registry().default_scope()
    }

    pub fn set_default_scope(scope: Option<ProviderScope>) {
        Self::registry().set_default_scope(scope)
    }

    pub fn caching_providers() -> Result<Vec<Arc<dyn CachingProvider>>> {
        Self::caching_providers_in(&Self::default_scope())
    }

    pub fn caching_providers_in(scope: &ProviderScope) -> Result<Vec<Arc<dyn CachingProvider>>> {
        Self::registry().caching_providers(scope)
    }

    /// The single provider in the default scope.
    ///
    /// # Errors
    ///
    /// `Error::Cache` when none or several are configured.
    pub fn caching_provider() -> Result<Arc<dyn CachingProvider>> {
        Self::caching_provider_in(&Self::default_scope())
    }

    pub fn caching_provider_in(scope: &ProviderScope) -> Result<Arc<dyn CachingProvider>> {
        Self::registry().caching_provider(scope)
    }

    pub fn caching_provider_named(name: &str) -> Result<Arc<dyn CachingProvider>> {
        Self::caching_provider_named_in(name, &Self::default_scope())
    }

    pub fn caching_provider_named_in(
        name: &str,
        scope: &ProviderScope,
    ) -> Result<Arc<dyn CachingProvider>> {
        Self::registry().caching_provider_named(name, scope)
    }

    /// A cache of the default manager of the default provider.
    ///
    /// # Errors
    ///
    /// `Error::TypeMismatch` when the cache exists with other types.
    pub fn get_cache<K: CacheKey, V: CacheValue>(name: &str) -> Result<Option<Arc<dyn Cache<K, V>>>> {
        Self::caching_provider()?
            .default_cache_manager()?
            .get_cache::<K, V>(name)
    }

    /// Close every provider known to the shared registry.
    pub fn close_all() -> Result<()> {
        Self::registry().close_all()
    }
}
