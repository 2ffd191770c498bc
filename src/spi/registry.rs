//! Discovery and memoization of caching providers.
//!
//! The registry resolves the providers advertised by a [`ProviderScope`],
//! instantiates each once, and caches the instances per scope in
//! registration order. Scopes are held weakly: once every handle to a scope
//! is dropped, its cached providers are released on the next registry access.
//!
//! # Single-provider override
//!
//! When [`PROVIDER_OVERRIDE_ENV`] is set (or
//! [`CachingProviderRegistry::with_provider_override`] is used), discovery
//! resolves only the named provider and caches it as the sole entry.
//!
//! # Locking
//!
//! Discovery and on-demand loads for a scope serialize on that scope's own
//! load lock, so concurrent callers for the same scope wait for one
//! population. No map guard is held while constructors run: a constructor
//! may resolve providers of another scope, but not of its own.

use super::scope::{ProviderScope, ScopeInner};
use super::CachingProvider;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};

/// Environment variable naming the only provider to resolve.
pub const PROVIDER_OVERRIDE_ENV: &str = "CACHE_API_CACHING_PROVIDER";

/// Providers discovered for one scope, in insertion order.
struct ScopedProviders {
    scope: Weak<ScopeInner>,
    providers: Vec<(String, Arc<dyn CachingProvider>)>,
}

impl ScopedProviders {
    fn new(scope: &ProviderScope) -> Self {
        ScopedProviders {
            scope: scope.downgrade(),
            providers: Vec::new(),
        }
    }

    fn is_alive(&self) -> bool {
        self.scope.strong_count() > 0
    }

    fn find(&self, name: &str) -> Option<Arc<dyn CachingProvider>> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(p))
    }

    fn instances(&self) -> Vec<Arc<dyn CachingProvider>> {
        self.providers.iter().map(|(_, p)| Arc::clone(p)).collect()
    }
}

/// Resolves and caches caching providers per [`ProviderScope`].
pub struct CachingProviderRegistry {
    providers: DashMap<u64, ScopedProviders>,
    default_scope: RwLock<Option<ProviderScope>>,
    provider_override: Option<String>,
}

impl CachingProviderRegistry {
    /// Create a registry, reading the override from [`PROVIDER_OVERRIDE_ENV`].
    pub fn new() -> Self {
        let provider_override = std::env::var(PROVIDER_OVERRIDE_ENV)
            .ok()
            .filter(|name| !name.trim().is_empty());
        if let Some(name) = &provider_override {
            info!("Caching provider override set: {}", name);
        }
        Self::with_provider_override(provider_override)
    }

    /// Create a registry with an explicit override (or none).
    pub fn with_provider_override(provider_override: Option<String>) -> Self {
        CachingProviderRegistry {
            providers: DashMap::new(),
            default_scope: RwLock::new(None),
            provider_override,
        }
    }

    pub fn provider_override(&self) -> Option<&str> {
        self.provider_override.as_deref()
    }

    /// The configured default scope, else the current thread's context scope.
    pub fn default_scope(&self) -> ProviderScope {
        self.default_scope
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(ProviderScope::context)
    }

    /// Set (or clear) the process-wide default scope.
    pub fn set_default_scope(&self, scope: Option<ProviderScope>) {
        *self
            .default_scope
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = scope;
    }

    /// Every provider available in `scope`, discovering them on first use.
    ///
    /// Repeated calls return the same instances.
    ///
    /// # Errors
    ///
    /// `Error::Cache` if any advertised provider fails to load.
    pub fn caching_providers(&self, scope: &ProviderScope) -> Result<Vec<Arc<dyn CachingProvider>>> {
        self.prune();
        if let Some(scoped) = self.providers.get(&scope.id()) {
            return Ok(scoped.instances());
        }
        let _guard = scope.load_lock();
        self.providers_locked(scope)
    }

    /// The single provider available in `scope`.
    ///
    /// # Errors
    ///
    /// `Error::Cache` if no provider or more than one is available.
    pub fn caching_provider(&self, scope: &ProviderScope) -> Result<Arc<dyn CachingProvider>> {
        let mut providers = self.caching_providers(scope)?;
        match providers.len() {
            0 => Err(Error::Cache(
                "No CachingProviders have been configured".to_string(),
            )),
            1 => Ok(providers.remove(0)),
            _ => {
                let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
                Err(Error::Cache(format!(
                    "Multiple CachingProviders have been configured when only a single \
                     CachingProvider is expected: {}",
                    names.join(", ")
                )))
            }
        }
    }

    /// The provider registered under `name` in `scope`, loading it if it
    /// was not discovered.
    ///
    /// # Errors
    ///
    /// `Error::Cache` if discovery fails or `name` cannot be loaded.
    pub fn caching_provider_named(
        &self,
        name: &str,
        scope: &ProviderScope,
    ) -> Result<Arc<dyn CachingProvider>> {
        let _guard = scope.load_lock();
        self.prune();
        self.providers_locked(scope)?;

        if let Some(provider) = self.cached(name, scope) {
            return Ok(provider);
        }

        let provider = self.load_caching_provider(name, scope)?;
        self.providers
            .entry(scope.id())
            .or_insert_with(|| ScopedProviders::new(scope))
            .providers
            .push((name.to_string(), Arc::clone(&provider)));
        Ok(provider)
    }

    /// Instantiate the provider registered under `name`.
    ///
    /// Does not touch the cache.
    ///
    /// # Errors
    ///
    /// `Error::Cache` when `name` is not advertised, or its constructor
    /// fails or panics.
    pub fn load_caching_provider(
        &self,
        name: &str,
        scope: &ProviderScope,
    ) -> Result<Arc<dyn CachingProvider>> {
        let constructor = scope.load(name).ok_or_else(|| {
            Error::Cache(format!(
                "Failed to load the CachingProvider [{}]: not registered in scope {}",
                name,
                scope.label()
            ))
        })?;

        match catch_unwind(AssertUnwindSafe(|| constructor())) {
            Ok(Ok(provider)) => {
                info!("✓ Loaded CachingProvider {} in scope {}", name, scope.label());
                Ok(provider)
            }
            Ok(Err(e)) => {
                warn!("Failed to load CachingProvider {}: {}", name, e);
                Err(Error::Cache(format!(
                    "Failed to load the CachingProvider [{}]: {}",
                    name, e
                )))
            }
            Err(_) => {
                warn!("CachingProvider {} panicked during construction", name);
                Err(Error::Cache(format!(
                    "Failed to load the CachingProvider [{}]: constructor panicked",
                    name
                )))
            }
        }
    }

    /// Close and forget every cached provider.
    ///
    /// # Errors
    ///
    /// `Error::Shutdown` listing each provider whose `close` failed; the
    /// others are still closed and forgotten.
    pub fn close_all(&self) -> Result<()> {
        let ids: Vec<u64> = self.providers.iter().map(|e| *e.key()).collect();
        let mut failures = Vec::new();
        for id in ids {
            if let Some((_, scoped)) = self.providers.remove(&id) {
                close_each(scoped.providers, &mut failures);
            }
        }
        shutdown_result(failures)
    }

    /// Close and forget the providers cached for `scope`.
    pub fn close_scope(&self, scope: &ProviderScope) -> Result<()> {
        let mut failures = Vec::new();
        if let Some((_, scoped)) = self.providers.remove(&scope.id()) {
            close_each(scoped.providers, &mut failures);
        }
        shutdown_result(failures)
    }

    /// Close and forget one provider cached for `scope`.
    ///
    /// A scope left with no providers is forgotten too, so the next lookup
    /// discovers it afresh.
    pub fn close_provider(&self, name: &str, scope: &ProviderScope) -> Result<()> {
        let removed = self.providers.get_mut(&scope.id()).and_then(|mut scoped| {
            let index = scoped.providers.iter().position(|(n, _)| n == name)?;
            Some(scoped.providers.remove(index))
        });
        if removed.is_some() {
            self.providers
                .remove_if(&scope.id(), |_, scoped| scoped.providers.is_empty());
        }
        let mut failures = Vec::new();
        if let Some(entry) = removed {
            close_each(vec![entry], &mut failures);
        }
        shutdown_result(failures)
    }

    /// Number of scopes with cached providers.
    pub fn cached_scope_count(&self) -> usize {
        self.prune();
        self.providers.len()
    }

    fn cached(&self, name: &str, scope: &ProviderScope) -> Option<Arc<dyn CachingProvider>> {
        self.providers
            .get(&scope.id())
            .and_then(|scoped| scoped.find(name))
    }

    /// Cached providers for `scope`, discovering them if absent. The caller
    /// holds the scope's load lock.
    fn providers_locked(&self, scope: &ProviderScope) -> Result<Vec<Arc<dyn CachingProvider>>> {
        if let Some(scoped) = self.providers.get(&scope.id()) {
            return Ok(scoped.instances());
        }
        let discovered = self.discover(scope)?;
        let instances = discovered.instances();
        self.providers.insert(scope.id(), discovered);
        Ok(instances)
    }

    fn discover(&self, scope: &ProviderScope) -> Result<ScopedProviders> {
        let mut scoped = ScopedProviders::new(scope);
        let names = match &self.provider_override {
            Some(name) => vec![name.clone()],
            None => scope.service_names(),
        };
        debug!(
            "» Discovering {} CachingProvider(s) in scope {}",
            names.len(),
            scope.label()
        );
        for name in names {
            let provider = self.load_caching_provider(&name, scope)?;
            scoped.providers.push((name, provider));
        }
        Ok(scoped)
    }

    fn prune(&self) {
        let before = self.providers.len();
        self.providers.retain(|_, scoped| scoped.is_alive());
        let pruned = before.saturating_sub(self.providers.len());
        if pruned > 0 {
            debug!("Released providers of {} unreachable scope(s)", pruned);
        }
    }
}

impl Default for CachingProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn close_each(
    providers: Vec<(String, Arc<dyn CachingProvider>)>,
    failures: &mut Vec<(String, Error)>,
) {
    for (name, provider) in providers {
        match provider.close() {
            Ok(()) => debug!("Closed CachingProvider {}", name),
            Err(e) => {
                warn!("⚠ Closing CachingProvider {} failed: {}", name, e);
                failures.push((name, e));
            }
        }
    }
}

fn shutdown_result(failures: Vec<(String, Error)>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Shutdown { failures })
    }
}
