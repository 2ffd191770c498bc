//! Declarative caching descriptors driven against a live cache manager.

mod common;

use cache_api::annotation::{
    CacheDefaults, CacheInvocationParameter, CacheKeyGenerator, CacheKeyInvocationContext,
    CacheMethodDetails, CachePut, CacheRemove, CacheRemoveAll, CacheResolver, CacheResolverFactory,
    CacheResult,
    DefaultCacheKey, DefaultCacheKeyGenerator, DefaultCacheResolverFactory, KeyParameter,
};
use cache_api::spi::ProviderScope;
use cache_api::{Cache, CacheManager, CacheManagerExt, CachingProvider, Error};
use common::{init_logging, MemoryProvider};
use std::cell::Cell;
use std::sync::Arc;

fn manager() -> Arc<dyn CacheManager> {
    init_logging();
    MemoryProvider::shared()
        .cache_manager(None, Some(&ProviderScope::new("annotations")), None)
        .unwrap()
}

fn key_for(details: &CacheMethodDetails, parameters: &[CacheInvocationParameter]) -> DefaultCacheKey {
    let context = CacheKeyInvocationContext::new(details, parameters);
    DefaultCacheKeyGenerator.generate_cache_key(&context).unwrap()
}

#[test]
fn test_cache_result_memoizes_method() {
    let manager = manager();
    let factory = DefaultCacheResolverFactory::new(manager.clone());
    let defaults = CacheDefaults::named("users");
    let details = CacheMethodDetails::new("find_user", CacheResult::default(), &defaults).unwrap();
    assert_eq!(details.cache_name(), "users");

    let resolver = CacheResolverFactory::<String>::cache_resolver(&factory, &details).unwrap();
    let cache = resolver.resolve_cache(&details).unwrap();
    let calls = Cell::new(0);
    let find_user = |id: u64| {
        let key = key_for(&details, &[CacheInvocationParameter::plain(0, "id", id)]);
        CacheResult::default().invoke(cache.as_ref(), None, &key, || {
            calls.set(calls.get() + 1);
            Ok(format!("user-{}", id))
        })
    };

    assert_eq!(find_user(1).unwrap(), "user-1");
    assert_eq!(find_user(1).unwrap(), "user-1");
    assert_eq!(find_user(2).unwrap(), "user-2");
    assert_eq!(calls.get(), 2);

    // The factory created the cache on first use; later lookups share it.
    let again = manager
        .get_cache::<DefaultCacheKey, String>("users")
        .unwrap()
        .unwrap();
    assert!(again.contains_key(&DefaultCacheKey::new(vec![KeyParameter::UInt(1)])).unwrap());
}

#[test]
fn test_cache_result_skip_get_always_runs() {
    let manager = manager();
    let cache = manager
        .create_cache::<DefaultCacheKey, u64>("counters", Default::default())
        .unwrap();
    let key = DefaultCacheKey::new(vec![KeyParameter::from("hits")]);
    let descriptor = CacheResult::named("counters").skip_get(true);

    let first = descriptor.invoke(cache.as_ref(), None, &key, || Ok(1)).unwrap();
    let second = descriptor.invoke(cache.as_ref(), None, &key, || Ok(2)).unwrap();
    assert_eq!((first, second), (1, 2));
    assert_eq!(cache.get(&key).unwrap(), Some(2));
}

#[test]
fn test_cache_result_replays_cached_failures() {
    let manager = manager();
    let factory = DefaultCacheResolverFactory::new(manager);
    let descriptor = CacheResult::named("quotes")
        .with_exception_cache("quote-failures")
        .caching_exceptions(|e| matches!(e, Error::Cache(_)));
    let details =
        CacheMethodDetails::new("quote", descriptor.clone(), &CacheDefaults::default()).unwrap();
    assert_eq!(details.exception_cache_name(), Some("quote-failures"));

    let cache = CacheResolverFactory::<u64>::cache_resolver(&factory, &details)
        .unwrap()
        .resolve_cache(&details)
        .unwrap();
    let failures = CacheResolverFactory::<u64>::exception_cache_resolver(&factory, &details)
        .unwrap()
        .resolve_cache(&details)
        .unwrap();

    let key = key_for(&details, &[CacheInvocationParameter::key(0, "symbol", "ACME")]);
    let calls = Cell::new(0);
    let quote = || {
        descriptor.invoke(cache.as_ref(), Some(failures.as_ref()), &key, || {
            calls.set(calls.get() + 1);
            Err(Error::cache("market closed"))
        })
    };

    assert!(matches!(quote(), Err(Error::Cache(msg)) if msg == "market closed"));
    assert!(matches!(quote(), Err(Error::Cache(msg)) if msg == "market closed"));
    assert_eq!(calls.get(), 1);
    assert!(cache.get(&key).unwrap().is_none());
}

#[test]
fn test_exception_resolver_requires_exception_cache() {
    let factory = DefaultCacheResolverFactory::new(manager());
    let details =
        CacheMethodDetails::new("plain", CacheResult::named("plain"), &CacheDefaults::default())
            .unwrap();
    let err = CacheResolverFactory::<String>::exception_cache_resolver(&factory, &details)
        .err()
        .unwrap();
    assert!(matches!(err, Error::AnnotationConfiguration(_)));
}

#[test]
fn test_cache_put_stores_value_parameter() {
    let manager = manager();
    let cache = manager
        .create_cache::<DefaultCacheKey, String>("profiles", Default::default())
        .unwrap();
    let details =
        CacheMethodDetails::new("save", CachePut::named("profiles"), &CacheDefaults::default())
            .unwrap();
    let parameters = [
        CacheInvocationParameter::plain(0, "id", 7u64),
        CacheInvocationParameter::value(1, "profile", "alice"),
    ];
    let context = CacheKeyInvocationContext::new(&details, &parameters);
    let key = DefaultCacheKeyGenerator.generate_cache_key(&context).unwrap();
    assert_eq!(key, DefaultCacheKey::new(vec![KeyParameter::UInt(7)]));
    assert_eq!(
        context.value_parameter().unwrap().value,
        KeyParameter::from("alice")
    );

    let put = CachePut::named("profiles");
    put.invoke(cache.as_ref(), &key, "alice".to_string(), || Ok(()))
        .unwrap();
    assert_eq!(cache.get(&key).unwrap(), Some("alice".to_string()));

    // A failed method skips the put unless the failure is listed.
    let failing = || -> cache_api::Result<()> { Err(Error::cache("disk full")) };
    assert!(put
        .invoke(cache.as_ref(), &key, "bob".to_string(), failing)
        .is_err());
    assert_eq!(cache.get(&key).unwrap(), Some("alice".to_string()));

    let lenient = CachePut::named("profiles").caching_for(|e| matches!(e, Error::Cache(_)));
    assert!(lenient
        .invoke(cache.as_ref(), &key, "carol".to_string(), failing)
        .is_err());
    assert_eq!(cache.get(&key).unwrap(), Some("carol".to_string()));

    let eager = CachePut::named("profiles").before_invocation();
    let seen = eager
        .invoke(cache.as_ref(), &key, "dave".to_string(), || {
            Ok(cache.get(&key)?)
        })
        .unwrap();
    assert_eq!(seen, Some("dave".to_string()));
}

#[test]
fn test_cache_remove_and_remove_all() {
    let manager = manager();
    let cache = manager
        .create_cache::<DefaultCacheKey, String>("sessions", Default::default())
        .unwrap();
    let a = DefaultCacheKey::new(vec![KeyParameter::from("a")]);
    let b = DefaultCacheKey::new(vec![KeyParameter::from("b")]);
    cache.put(a.clone(), "1".to_string()).unwrap();
    cache.put(b.clone(), "2".to_string()).unwrap();

    let failing = || -> cache_api::Result<()> { Err(Error::cache("boom")) };
    assert!(CacheRemove::named("sessions")
        .invoke(cache.as_ref(), &a, failing)
        .is_err());
    assert!(cache.contains_key(&a).unwrap());

    CacheRemove::named("sessions")
        .invoke(cache.as_ref(), &a, || Ok(()))
        .unwrap();
    assert!(!cache.contains_key(&a).unwrap());

    let evict_anyway = CacheRemoveAll::named("sessions").evicting_for(|_| true);
    assert!(evict_anyway.invoke(cache.as_ref(), failing).is_err());
    assert!(!cache.contains_key(&b).unwrap());

    cache.put(b.clone(), "3".to_string()).unwrap();
    let before = CacheRemoveAll::named("sessions").before_invocation();
    let during = before
        .invoke(cache.as_ref(), || Ok(cache.contains_key(&b)?))
        .unwrap();
    assert!(!during);
}
