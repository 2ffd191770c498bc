//! Expiry policies.
//!
//! An [`ExpiryPolicy`] decides how long an entry lives after it is created,
//! accessed or updated. The cache implementation calls the policy at each of
//! those points and reschedules the entry's expiry using the returned
//! [`Duration`]. `None` from the access and update hooks means "leave the
//! current expiry as it is".
//!
//! | Policy | Creation | Access | Update |
//! |--------|----------|--------|--------|
//! | [`CreatedExpiryPolicy`] | d | none | none |
//! | [`AccessedExpiryPolicy`] | d | d | none |
//! | [`ModifiedExpiryPolicy`] | d | none | d |
//! | [`TouchedExpiryPolicy`] | d | d | d |
//! | [`EternalExpiryPolicy`] | eternal | none | none |

use crate::duration::Duration;
use crate::factory::{FactoryBuilder, FactoryRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Computes entry lifetimes in response to lifecycle events.
///
/// Returning [`Duration::ZERO`] expires the entry immediately. A policy whose
/// hook panics or misbehaves must not break the cache operation; the
/// implementation keeps the previous expiry in that case.
pub trait ExpiryPolicy: Send + Sync {
    /// Lifetime of a newly created entry.
    fn expiry_for_creation(&self) -> Duration;

    /// New lifetime after a read, or `None` to keep the current one.
    fn expiry_for_access(&self) -> Option<Duration>;

    /// New lifetime after an update, or `None` to keep the current one.
    fn expiry_for_update(&self) -> Option<Duration>;
}

/// Shared expiry policy handle.
pub type ExpiryPolicyRef = Arc<dyn ExpiryPolicy>;

macro_rules! duration_policy {
    ($(#[$doc:meta])* $name:ident, access: $access:expr, update: $update:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            expiry_duration: Duration,
        }

        impl $name {
            pub fn new(expiry_duration: Duration) -> Self {
                $name { expiry_duration }
            }

            /// Factory sharing one policy instance.
            pub fn factory_of(expiry_duration: Duration) -> FactoryRef<ExpiryPolicyRef> {
                let policy: ExpiryPolicyRef = Arc::new($name::new(expiry_duration));
                FactoryBuilder::singleton(policy)
            }

            pub fn expiry_duration(&self) -> Duration {
                self.expiry_duration
            }
        }

        impl ExpiryPolicy for $name {
            fn expiry_for_creation(&self) -> Duration {
                self.expiry_duration
            }

            fn expiry_for_access(&self) -> Option<Duration> {
                let on_access: bool = $access;
                on_access.then_some(self.expiry_duration)
            }

            fn expiry_for_update(&self) -> Option<Duration> {
                let on_update: bool = $update;
                on_update.then_some(self.expiry_duration)
            }
        }
    };
}

duration_policy!(
    /// Entries expire a fixed time after creation.
    CreatedExpiryPolicy,
    access: false,
    update: false
);

duration_policy!(
    /// Entries expire a fixed time after their last read (or creation).
    AccessedExpiryPolicy,
    access: true,
    update: false
);

duration_policy!(
    /// Entries expire a fixed time after their last write (or creation).
    ModifiedExpiryPolicy,
    access: false,
    update: true
);

duration_policy!(
    /// Entries expire a fixed time after any read or write.
    TouchedExpiryPolicy,
    access: true,
    update: true
);

/// Entries never expire. This is the default policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EternalExpiryPolicy;

impl EternalExpiryPolicy {
    pub fn factory_of() -> FactoryRef<ExpiryPolicyRef> {
        let policy: ExpiryPolicyRef = Arc::new(EternalExpiryPolicy);
        FactoryBuilder::singleton(policy)
    }
}

impl ExpiryPolicy for EternalExpiryPolicy {
    fn expiry_for_creation(&self) -> Duration {
        Duration::ETERNAL
    }

    fn expiry_for_access(&self) -> Option<Duration> {
        None
    }

    fn expiry_for_update(&self) -> Option<Duration> {
        None
    }
}

/// Serializable choice among the stock policies.
///
/// Used by [`CacheSettings`](crate::configuration::CacheSettings) so that an
/// expiry configuration can leave the process and be rebuilt elsewhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "duration", rename_all = "snake_case")]
pub enum ExpirySettings {
    #[default]
    Eternal,
    Created(Duration),
    Accessed(Duration),
    Modified(Duration),
    Touched(Duration),
}

impl ExpirySettings {
    /// Factory for the policy these settings describe.
    pub fn factory(&self) -> FactoryRef<ExpiryPolicyRef> {
        match *self {
            ExpirySettings::Eternal => EternalExpiryPolicy::factory_of(),
            ExpirySettings::Created(d) => CreatedExpiryPolicy::factory_of(d),
            ExpirySettings::Accessed(d) => AccessedExpiryPolicy::factory_of(d),
            ExpirySettings::Modified(d) => ModifiedExpiryPolicy::factory_of(d),
            ExpirySettings::Touched(d) => TouchedExpiryPolicy::factory_of(d),
        }
    }
}
