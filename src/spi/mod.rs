//! Service provider interface: caching providers and their discovery.
//!
//! A [`CachingProvider`] is the top-level, discoverable factory for
//! [`CacheManager`]s, much like a database driver. Providers advertise
//! themselves by registering a constructor in a [`ProviderScope`];
//! [`CachingProviderRegistry`] discovers, instantiates and memoizes them per
//! scope.

use crate::configuration::OptionalFeature;
use crate::error::Result;
use crate::manager::{CacheManager, Properties};
use std::sync::Arc;

pub mod registry;
pub mod scope;

pub use registry::{CachingProviderRegistry, PROVIDER_OVERRIDE_ENV};
pub use scope::{ProviderConstructor, ProviderScope};

/// Factory and lifecycle owner of cache managers.
///
/// Implementations hand out one manager per `(uri, scope)` pair and return
/// the same instance until it is closed.
pub trait CachingProvider: Send + Sync {
    /// Name the provider is registered and looked up under.
    ///
    /// Defaults to the implementing type's name, which is what
    /// [`ProviderScope::register`] uses.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Manager for `uri` within `scope`, creating it if needed.
    ///
    /// `None` arguments fall back to [`Self::default_uri`],
    /// [`Self::default_scope`] and [`Self::default_properties`].
    fn cache_manager(
        &self,
        uri: Option<&str>,
        scope: Option<&ProviderScope>,
        properties: Option<Properties>,
    ) -> Result<Arc<dyn CacheManager>>;

    /// Manager for the default URI and scope.
    fn default_cache_manager(&self) -> Result<Arc<dyn CacheManager>> {
        self.cache_manager(None, None, None)
    }

    fn default_uri(&self) -> String;

    fn default_properties(&self) -> Properties {
        Properties::new()
    }

    fn default_scope(&self) -> ProviderScope {
        ProviderScope::context()
    }

    /// Close every manager this provider created.
    fn close(&self) -> Result<()>;

    /// Close the managers created for `scope`.
    fn close_scope(&self, scope: &ProviderScope) -> Result<()>;

    /// Close the manager for `uri` within `scope`, if any.
    fn close_manager(&self, uri: &str, scope: &ProviderScope) -> Result<()>;

    fn is_supported(&self, feature: OptionalFeature) -> bool;
}
