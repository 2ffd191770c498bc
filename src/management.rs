//! Management and statistics views of a cache.
//!
//! [`CacheMxBean`] exposes a cache's configuration read-only;
//! [`CacheStatisticsMxBean`] exposes its counters. [`StatisticsCounters`] is
//! a lock-free implementation vendors can embed and feed from their cache
//! operations.

use crate::configuration::CompleteConfiguration;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Read-only configuration view.
pub trait CacheMxBean: Send + Sync {
    fn key_type(&self) -> &'static str;
    fn value_type(&self) -> &'static str;
    fn is_read_through(&self) -> bool;
    fn is_write_through(&self) -> bool;
    fn is_store_by_value(&self) -> bool;
    fn is_statistics_enabled(&self) -> bool;
    fn is_management_enabled(&self) -> bool;
}

/// [`CacheMxBean`] backed by a cache's configuration.
pub struct ConfigurationMxBean<K, V> {
    config: Arc<dyn CompleteConfiguration<K, V>>,
}

impl<K, V> ConfigurationMxBean<K, V> {
    pub fn new(config: Arc<dyn CompleteConfiguration<K, V>>) -> Self {
        ConfigurationMxBean { config }
    }
}

impl<K, V> CacheMxBean for ConfigurationMxBean<K, V> {
    fn key_type(&self) -> &'static str {
        self.config.key_type()
    }

    fn value_type(&self) -> &'static str {
        self.config.value_type()
    }

    fn is_read_through(&self) -> bool {
        self.config.is_read_through()
    }

    fn is_write_through(&self) -> bool {
        self.config.is_write_through()
    }

    fn is_store_by_value(&self) -> bool {
        self.config.is_store_by_value()
    }

    fn is_statistics_enabled(&self) -> bool {
        self.config.is_statistics_enabled()
    }

    fn is_management_enabled(&self) -> bool {
        self.config.is_management_enabled()
    }
}

/// Cache statistics.
///
/// Percentages are in `0.0..=100.0` and are `0.0` before the first get.
/// Average times are in microseconds.
pub trait CacheStatisticsMxBean: Send + Sync {
    /// Reset every counter.
    fn clear(&self);

    fn cache_hits(&self) -> u64;

    fn cache_hit_percentage(&self) -> f32 {
        percentage(self.cache_hits(), self.cache_gets())
    }

    fn cache_misses(&self) -> u64;

    fn cache_miss_percentage(&self) -> f32 {
        percentage(self.cache_misses(), self.cache_gets())
    }

    /// Hits plus misses.
    fn cache_gets(&self) -> u64 {
        self.cache_hits() + self.cache_misses()
    }

    fn cache_puts(&self) -> u64;

    fn cache_removals(&self) -> u64;

    fn cache_evictions(&self) -> u64;

    fn average_get_time(&self) -> f32;

    fn average_put_time(&self) -> f32;

    fn average_remove_time(&self) -> f32;
}

fn percentage(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0) as f32
}

fn average_micros(total_nanos: u64, count: u64) -> f32 {
    if count == 0 {
        return 0.0;
    }
    (total_nanos as f64 / count as f64 / 1_000.0) as f32
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

/// Atomic statistics counters.
#[derive(Debug, Default)]
pub struct StatisticsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    get_time_nanos: AtomicU64,
    put_time_nanos: AtomicU64,
    remove_time_nanos: AtomicU64,
}

impl StatisticsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_misses(&self, count: u64) {
        self.misses.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_puts(&self, count: u64) {
        self.puts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_removals(&self, count: u64) {
        self.removals.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_get_time(&self, elapsed: Duration) {
        add_saturating(&self.get_time_nanos, nanos(elapsed));
    }

    pub fn record_put_time(&self, elapsed: Duration) {
        add_saturating(&self.put_time_nanos, nanos(elapsed));
    }

    pub fn record_remove_time(&self, elapsed: Duration) {
        add_saturating(&self.remove_time_nanos, nanos(elapsed));
    }

    /// Point-in-time copy of every statistic.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            hits: self.cache_hits(),
            misses: self.cache_misses(),
            gets: self.cache_gets(),
            puts: self.cache_puts(),
            removals: self.cache_removals(),
            evictions: self.cache_evictions(),
            hit_percentage: self.cache_hit_percentage(),
            miss_percentage: self.cache_miss_percentage(),
            average_get_time: self.average_get_time(),
            average_put_time: self.average_put_time(),
            average_remove_time: self.average_remove_time(),
        }
    }
}

fn add_saturating(counter: &AtomicU64, amount: u64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_add(amount))
    });
}

impl CacheStatisticsMxBean for StatisticsCounters {
    fn clear(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.puts,
            &self.removals,
            &self.evictions,
            &self.get_time_nanos,
            &self.put_time_nanos,
            &self.remove_time_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        debug!("Cache statistics cleared");
    }

    fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn cache_puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    fn cache_removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    fn cache_evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn average_get_time(&self) -> f32 {
        average_micros(self.get_time_nanos.load(Ordering::Relaxed), self.cache_gets())
    }

    fn average_put_time(&self) -> f32 {
        average_micros(self.put_time_nanos.load(Ordering::Relaxed), self.cache_puts())
    }

    fn average_remove_time(&self) -> f32 {
        average_micros(
            self.remove_time_nanos.load(Ordering::Relaxed),
            self.cache_removals(),
        )
    }
}

/// Serializable copy of a cache's statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub gets: u64,
    pub puts: u64,
    pub removals: u64,
    pub evictions: u64,
    pub hit_percentage: f32,
    pub miss_percentage: f32,
    pub average_get_time: f32,
    pub average_put_time: f32,
    pub average_remove_time: f32,
}

/// Which management view a name refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagementKind {
    Configuration,
    Statistics,
}

/// Registration name of a cache's management view:
/// `cache:type=Cache{Kind},CacheManager={uri},Cache={name}`.
///
/// `,`, `:`, `=` and newlines in the URI or name are replaced with `.`.
pub fn object_name(kind: ManagementKind, manager_uri: &str, cache_name: &str) -> String {
    let kind = match kind {
        ManagementKind::Configuration => "CacheConfiguration",
        ManagementKind::Statistics => "CacheStatistics",
    };
    format!(
        "cache:type={},CacheManager={},Cache={}",
        kind,
        sanitize(manager_uri),
        sanitize(cache_name)
    )
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            ',' | ':' | '=' | '\n' => '.',
            other => other,
        })
        .collect()
}
