//! Single-provider override read from the environment.
//!
//! Kept in its own test binary: the variable is process-wide, and the
//! facade's registry reads it once on first use.

mod common;

use cache_api::spi::{CachingProviderRegistry, PROVIDER_OVERRIDE_ENV};
use cache_api::{Caching, ProviderScope};
use common::{init_logging, MemoryProvider};
use std::sync::Arc;

#[test]
fn test_override_from_environment() {
    init_logging();
    std::env::set_var(PROVIDER_OVERRIDE_ENV, "memory");

    assert_eq!(Caching::registry().provider_override(), Some("memory"));
    let registry = CachingProviderRegistry::new();
    assert_eq!(registry.provider_override(), Some("memory"));

    let scope = ProviderScope::new("env-override");
    MemoryProvider::register_in(&scope, "other");
    MemoryProvider::register_in(&scope, "memory");

    let providers = registry.caching_providers(&scope).unwrap();
    assert_eq!(providers.len(), 1);
    let again = registry.caching_providers(&scope).unwrap();
    assert!(Arc::ptr_eq(&providers[0], &again[0]));

    let single = Caching::caching_provider_in(&scope).unwrap();
    let named = Caching::caching_provider_named_in("memory", &scope).unwrap();
    assert!(Arc::ptr_eq(&single, &named));

    std::env::set_var(PROVIDER_OVERRIDE_ENV, "   ");
    assert_eq!(CachingProviderRegistry::new().provider_override(), None);

    std::env::set_var(PROVIDER_OVERRIDE_ENV, "");
    assert_eq!(CachingProviderRegistry::new().provider_override(), None);

    std::env::remove_var(PROVIDER_OVERRIDE_ENV);
    assert_eq!(CachingProviderRegistry::new().provider_override(), None);
    assert_eq!(Caching::registry().provider_override(), Some("memory"));
}
