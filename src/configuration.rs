//! Cache configuration.
//!
//! A cache's configuration is fixed when the cache is created and is exposed
//! read-only afterwards through [`CompleteConfiguration`]. Applications build
//! one with [`MutableConfiguration`]:
//!
//! ```
//! use cache_api::configuration::{Configuration, CompleteConfiguration, MutableConfiguration};
//! use cache_api::duration::Duration;
//! use cache_api::expiry::CreatedExpiryPolicy;
//!
//! let config = MutableConfiguration::<String, u64>::new()
//!     .with_statistics_enabled(true)
//!     .with_expiry_policy_factory(CreatedExpiryPolicy::factory_of(Duration::ONE_HOUR));
//!
//! assert!(config.is_store_by_value());
//! assert!(config.is_statistics_enabled());
//! assert!(!config.is_read_through());
//! ```
//!
//! [`CacheSettings`] is the serializable subset of a configuration: flags and
//! a stock expiry policy, without any live objects.

use crate::error::{Error, Result};
use crate::event::{CacheEntryListenerConfiguration, MutableCacheEntryListenerConfiguration};
use crate::expiry::{EternalExpiryPolicy, ExpiryPolicyRef, ExpirySettings};
use crate::factory::FactoryRef;
use crate::integration::{CacheLoaderRef, CacheWriterRef};
use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Capabilities a provider may or may not support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionalFeature {
    /// Caches may hold references to keys and values instead of copies.
    StoreByReference,
}

/// Minimal configuration every cache exposes.
pub trait Configuration<K, V>: Send + Sync {
    /// Name of the key type the cache was created for.
    fn key_type(&self) -> &'static str {
        type_name::<K>()
    }

    /// Name of the value type the cache was created for.
    fn value_type(&self) -> &'static str {
        type_name::<V>()
    }

    /// Whether keys and values are copied on the way in and out.
    fn is_store_by_value(&self) -> bool;
}

/// Full configuration of a cache.
pub trait CompleteConfiguration<K, V>: Configuration<K, V> {
    fn is_read_through(&self) -> bool;

    fn is_write_through(&self) -> bool;

    fn is_statistics_enabled(&self) -> bool;

    fn is_management_enabled(&self) -> bool;

    fn listener_configurations(&self) -> Vec<MutableCacheEntryListenerConfiguration<K, V>>;

    fn loader_factory(&self) -> Option<FactoryRef<CacheLoaderRef<K, V>>>;

    fn writer_factory(&self) -> Option<FactoryRef<CacheWriterRef<K, V>>>;

    fn expiry_policy_factory(&self) -> FactoryRef<ExpiryPolicyRef>;
}

/// Builder-style configuration.
///
/// Defaults: store-by-value, eternal expiry, everything else off.
pub struct MutableConfiguration<K, V> {
    store_by_value: bool,
    read_through: bool,
    write_through: bool,
    statistics_enabled: bool,
    management_enabled: bool,
    listener_configurations: Vec<MutableCacheEntryListenerConfiguration<K, V>>,
    loader_factory: Option<FactoryRef<CacheLoaderRef<K, V>>>,
    writer_factory: Option<FactoryRef<CacheWriterRef<K, V>>>,
    expiry_policy_factory: FactoryRef<ExpiryPolicyRef>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MutableConfiguration<K, V> {
    pub fn new() -> Self {
        MutableConfiguration {
            store_by_value: true,
            read_through: false,
            write_through: false,
            statistics_enabled: false,
            management_enabled: false,
            listener_configurations: Vec::new(),
            loader_factory: None,
            writer_factory: None,
            expiry_policy_factory: EternalExpiryPolicy::factory_of(),
            _types: PhantomData,
        }
    }

    /// Copy another configuration, sharing its factories.
    pub fn from_complete(config: &dyn CompleteConfiguration<K, V>) -> Self {
        MutableConfiguration {
            store_by_value: config.is_store_by_value(),
            read_through: config.is_read_through(),
            write_through: config.is_write_through(),
            statistics_enabled: config.is_statistics_enabled(),
            management_enabled: config.is_management_enabled(),
            listener_configurations: config.listener_configurations(),
            loader_factory: config.loader_factory(),
            writer_factory: config.writer_factory(),
            expiry_policy_factory: config.expiry_policy_factory(),
            _types: PhantomData,
        }
    }

    /// Rebuild a configuration from its serializable settings.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        MutableConfiguration {
            store_by_value: settings.store_by_value,
            read_through: settings.read_through,
            write_through: settings.write_through,
            statistics_enabled: settings.statistics_enabled,
            management_enabled: settings.management_enabled,
            expiry_policy_factory: settings.expiry.factory(),
            ..MutableConfiguration::new()
        }
    }

    /// Serializable subset of this configuration.
    ///
    /// The expiry policy is not recoverable from a factory, so it is taken
    /// from `expiry`.
    pub fn settings(&self, expiry: ExpirySettings) -> CacheSettings {
        CacheSettings {
            store_by_value: self.store_by_value,
            read_through: self.read_through,
            write_through: self.write_through,
            statistics_enabled: self.statistics_enabled,
            management_enabled: self.management_enabled,
            expiry,
        }
    }

    pub fn with_store_by_value(mut self, store_by_value: bool) -> Self {
        self.store_by_value = store_by_value;
        self
    }

    pub fn with_read_through(mut self, read_through: bool) -> Self {
        self.read_through = read_through;
        self
    }

    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    pub fn with_statistics_enabled(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    pub fn with_management_enabled(mut self, enabled: bool) -> Self {
        self.management_enabled = enabled;
        self
    }

    pub fn with_loader_factory(mut self, factory: FactoryRef<CacheLoaderRef<K, V>>) -> Self {
        self.loader_factory = Some(factory);
        self
    }

    pub fn with_writer_factory(mut self, factory: FactoryRef<CacheWriterRef<K, V>>) -> Self {
        self.writer_factory = Some(factory);
        self
    }

    pub fn with_expiry_policy_factory(mut self, factory: FactoryRef<ExpiryPolicyRef>) -> Self {
        self.expiry_policy_factory = factory;
        self
    }

    /// Add a listener registration.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if an equal registration already exists.
    pub fn add_listener_configuration(
        &mut self,
        config: MutableCacheEntryListenerConfiguration<K, V>,
    ) -> Result<()> {
        if self.listener_configurations.contains(&config) {
            return Err(Error::InvalidArgument(
                "A CacheEntryListenerConfiguration can be registered only once".to_string(),
            ));
        }
        self.listener_configurations.push(config);
        Ok(())
    }

    /// Builder form of [`Self::add_listener_configuration`].
    pub fn with_listener_configuration(
        mut self,
        config: MutableCacheEntryListenerConfiguration<K, V>,
    ) -> Result<Self> {
        self.add_listener_configuration(config)?;
        Ok(self)
    }

    /// Remove a registration; returns whether it was present.
    pub fn remove_listener_configuration(
        &mut self,
        config: &MutableCacheEntryListenerConfiguration<K, V>,
    ) -> bool {
        let before = self.listener_configurations.len();
        self.listener_configurations.retain(|c| c != config);
        self.listener_configurations.len() != before
    }
}

impl<K, V> Default for MutableConfiguration<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MutableConfiguration<K, V> {
    fn clone(&self) -> Self {
        MutableConfiguration {
            store_by_value: self.store_by_value,
            read_through: self.read_through,
            write_through: self.write_through,
            statistics_enabled: self.statistics_enabled,
            management_enabled: self.management_enabled,
            listener_configurations: self.listener_configurations.clone(),
            loader_factory: self.loader_factory.clone(),
            writer_factory: self.writer_factory.clone(),
            expiry_policy_factory: Arc::clone(&self.expiry_policy_factory),
            _types: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for MutableConfiguration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableConfiguration")
            .field("key_type", &type_name::<K>())
            .field("value_type", &type_name::<V>())
            .field("store_by_value", &self.store_by_value)
            .field("read_through", &self.read_through)
            .field("write_through", &self.write_through)
            .field("statistics_enabled", &self.statistics_enabled)
            .field("management_enabled", &self.management_enabled)
            .field("listeners", &self.listener_configurations.len())
            .finish()
    }
}

impl<K, V> Configuration<K, V> for MutableConfiguration<K, V> {
    fn is_store_by_value(&self) -> bool {
        self.store_by_value
    }
}

impl<K, V> CompleteConfiguration<K, V> for MutableConfiguration<K, V> {
    fn is_read_through(&self) -> bool {
        self.read_through
    }

    fn is_write_through(&self) -> bool {
        self.write_through
    }

    fn is_statistics_enabled(&self) -> bool {
        self.statistics_enabled
    }

    fn is_management_enabled(&self) -> bool {
        self.management_enabled
    }

    fn listener_configurations(&self) -> Vec<MutableCacheEntryListenerConfiguration<K, V>> {
        self.listener_configurations.clone()
    }

    fn loader_factory(&self) -> Option<FactoryRef<CacheLoaderRef<K, V>>> {
        self.loader_factory.clone()
    }

    fn writer_factory(&self) -> Option<FactoryRef<CacheWriterRef<K, V>>> {
        self.writer_factory.clone()
    }

    fn expiry_policy_factory(&self) -> FactoryRef<ExpiryPolicyRef> {
        Arc::clone(&self.expiry_policy_factory)
    }
}

/// Transferable configuration: flags plus a stock expiry policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub store_by_value: bool,
    pub read_through: bool,
    pub write_through: bool,
    pub statistics_enabled: bool,
    pub management_enabled: bool,
    pub expiry: ExpirySettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            store_by_value: true,
            read_through: false,
            write_through: false,
            statistics_enabled: false,
            management_enabled: false,
            expiry: ExpirySettings::Eternal,
        }
    }
}

impl CacheSettings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Listener configurations registered on a cache, as trait objects.
pub fn listener_configurations_dyn<K: 'static, V: 'static>(
    config: &dyn CompleteConfiguration<K, V>,
) -> Vec<Arc<dyn CacheEntryListenerConfiguration<K, V>>> {
    config
        .listener_configurations()
        .into_iter()
        .map(|c| Arc::new(c) as Arc<dyn CacheEntryListenerConfiguration<K, V>>)
        .collect()
}
