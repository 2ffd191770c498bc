//! Performance benchmarks for cache-api
//!
//! This benchmark suite measures:
//! - Provider lookup through the registry (memoized and by name)
//! - Generated key construction and hashing across parameter counts
//! - Envelope encoding of generated keys
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use cache_api::annotation::{DefaultCacheKey, KeyParameter};
use cache_api::configuration::OptionalFeature;
use cache_api::manager::Properties;
use cache_api::serialization::{decode, encode};
use cache_api::spi::{CachingProvider, CachingProviderRegistry, ProviderScope};
use cache_api::{CacheManager, Error, Result};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::hint::black_box;
use std::sync::Arc;

// ============================================================================
// Benchmark Fixtures
// ============================================================================

/// Provider that never builds managers; only discovery is measured.
#[derive(Default)]
struct BenchProvider;

impl CachingProvider for BenchProvider {
    fn cache_manager(
        &self,
        _uri: Option<&str>,
        _scope: Option<&ProviderScope>,
        _properties: Option<Properties>,
    ) -> Result<Arc<dyn CacheManager>> {
        Err(Error::Unsupported("bench provider has no managers".to_string()))
    }

    fn default_uri(&self) -> String {
        "bench://default".to_string()
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn close_scope(&self, _scope: &ProviderScope) -> Result<()> {
        Ok(())
    }

    fn close_manager(&self, _uri: &str, _scope: &ProviderScope) -> Result<()> {
        Ok(())
    }

    fn is_supported(&self, _feature: OptionalFeature) -> bool {
        false
    }
}

fn key_of(count: usize) -> DefaultCacheKey {
    DefaultCacheKey::new(
        (0..count)
            .map(|i| match i % 3 {
                0 => KeyParameter::from(i as u64),
                1 => KeyParameter::from(format!("param-{}", i)),
                _ => KeyParameter::float(i as f64 / 3.0),
            })
            .collect(),
    )
}

// ============================================================================
// Group 1: Provider Discovery
// ============================================================================

fn registry_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    let registry = CachingProviderRegistry::with_provider_override(None);
    let scope = ProviderScope::new("bench");
    scope.register::<BenchProvider>();
    let name = std::any::type_name::<BenchProvider>();
    registry
        .caching_provider(&scope)
        .expect("Failed to discover provider");

    group.bench_function("caching_provider_memoized", |b| {
        b.iter(|| registry.caching_provider(black_box(&scope)))
    });

    group.bench_function("caching_provider_named", |b| {
        b.iter(|| registry.caching_provider_named(black_box(name), black_box(&scope)))
    });

    // Discovery from scratch: a new scope each iteration
    group.bench_function("discover_fresh_scope", |b| {
        b.iter(|| {
            let fresh = ProviderScope::with_parent("fresh", &scope);
            registry.caching_providers(black_box(&fresh))
        })
    });

    group.finish();
}

// ============================================================================
// Group 2: Generated Keys
// ============================================================================

fn key_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("generated_keys");

    for count in [1usize, 4, 16].iter() {
        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("construct", count), count, |b, &count| {
                b.iter(|| key_of(black_box(count)))
            });

        group.bench_with_input(BenchmarkId::new("hash", count), count, |b, &count| {
            let key = key_of(count);
            b.iter(|| {
                let mut hasher = DefaultHasher::new();
                black_box(&key).hash(&mut hasher);
                hasher.finish()
            })
        });

        group.bench_with_input(BenchmarkId::new("eq", count), count, |b, &count| {
            let left = key_of(count);
            let right = key_of(count);
            b.iter(|| black_box(&left) == black_box(&right))
        });
    }

    group.finish();
}

// ============================================================================
// Group 3: Envelope Encoding
// ============================================================================

fn envelope_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    for count in [1usize, 16].iter() {
        let key = key_of(*count);
        let bytes = encode(&key).expect("Failed to encode");

        group.bench_with_input(BenchmarkId::new("encode", count), &key, |b, key| {
            b.iter(|| encode(black_box(key)))
        });

        group.bench_with_input(BenchmarkId::new("decode", count), &bytes, |b, bytes| {
            b.iter(|| decode::<DefaultCacheKey>(black_box(bytes)))
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(
    benches,
    registry_benchmarks,
    key_benchmarks,
    envelope_benchmarks
);
criterion_main!(benches);
