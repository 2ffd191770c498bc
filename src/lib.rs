//! # cache-api
//!
//! A typed key/value caching API. The crate defines the contracts cache
//! vendors implement and applications program against, and ships the small
//! amount of shared machinery those contracts need.
//!
//! ## Overview
//!
//! - **[`Cache`]**: a named, typed map owned by a [`CacheManager`]
//! - **[`CacheManager`]**: owns caches, identified by a URI within a [`ProviderScope`]
//! - **[`CachingProvider`]**: discoverable factory for managers
//! - **[`Caching`]**: process-wide entry point resolving providers
//! - **Integration**: [`CacheLoader`], [`CacheWriter`], entry listeners,
//!   [`EntryProcessor`]s, [`ExpiryPolicy`]s
//! - **Declarative caching**: descriptors and key generators in [`annotation`]
//! - **Management**: configuration and statistics views in [`management`]
//!
//! ## Quick Start
//!
//! A vendor registers its provider in a scope:
//!
//! ```ignore
//! use cache_api::spi::ProviderScope;
//!
//! ProviderScope::system().register::<MyCachingProvider>();
//! ```
//!
//! Applications then resolve it and work with typed caches:
//!
//! ```ignore
//! use cache_api::{Caching, CacheManagerExt, Duration, MutableConfiguration};
//! use cache_api::expiry::CreatedExpiryPolicy;
//!
//! let provider = Caching::caching_provider()?;
//! let manager = provider.default_cache_manager()?;
//!
//! let config = MutableConfiguration::<String, u64>::new()
//!     .with_expiry_policy_factory(CreatedExpiryPolicy::factory_of(Duration::ONE_HOUR))
//!     .with_statistics_enabled(true);
//! let visits = manager.create_cache("visits", config)?;
//!
//! visits.put("home".to_string(), 1)?;
//! assert_eq!(visits.get(&"home".to_string())?, Some(1));
//! ```

#[macro_use]
extern crate log;

pub mod annotation;
pub mod cache;
pub mod caching;
pub mod configuration;
pub mod duration;
pub mod error;
pub mod event;
pub mod expiry;
pub mod factory;
pub mod integration;
pub mod management;
pub mod manager;
pub mod processor;
pub mod serialization;
pub mod spi;

// Re-exports for convenience
pub use cache::{Cache, CacheExt, Entry};
pub use caching::Caching;
pub use configuration::{
    CacheSettings, CompleteConfiguration, Configuration, MutableConfiguration, OptionalFeature,
};
pub use duration::{Duration, TimeUnit};
pub use error::{Error, Result};
pub use event::{
    CacheEntryEvent, CacheEntryEventFilter, CacheEntryListener, CacheEntryListenerConfiguration,
    EventType, MutableCacheEntryListenerConfiguration,
};
pub use expiry::{ExpiryPolicy, ExpirySettings};
pub use factory::{Factory, FactoryBuilder};
pub use integration::{CacheLoader, CacheWriter, CompletionListener, CompletionListenerFuture};
pub use manager::{CacheManager, CacheManagerExt};
pub use processor::{EntryProcessor, EntryProcessorResult, MutableEntry};
pub use spi::{CachingProvider, CachingProviderRegistry, ProviderScope};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
