//! Factories used wherever configuration needs a live object.
//!
//! Configuration holds an `Arc<dyn Factory<T>>` instead of the loader, writer,
//! listener or expiry policy itself. Implementations call [`Factory::create`]
//! when a cache is built, so the same configuration can be reused for many
//! caches without sharing mutable state between them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Constructs instances of `T` on demand.
pub trait Factory<T>: Send + Sync {
    fn create(&self) -> T;
}

/// Shared handle to a factory, as stored in configuration.
pub type FactoryRef<T> = Arc<dyn Factory<T>>;

/// Factory that hands out clones of one instance.
///
/// With `T = Arc<dyn Trait>` every cache shares the same object.
#[derive(Clone)]
pub struct SingletonFactory<T> {
    instance: T,
}

impl<T: Clone + Send + Sync> Factory<T> for SingletonFactory<T> {
    fn create(&self) -> T {
        self.instance.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for SingletonFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonFactory")
            .field("instance", &self.instance)
            .finish()
    }
}

/// Factory that builds a fresh `T::default()` each time.
pub struct DefaultFactory<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default> Factory<T> for DefaultFactory<T> {
    fn create(&self) -> T {
        T::default()
    }
}

impl<T> fmt::Debug for DefaultFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultFactory<{}>", std::any::type_name::<T>())
    }
}

/// Factory backed by a closure.
pub struct FnFactory<F> {
    f: F,
}

impl<T, F> Factory<T> for FnFactory<F>
where
    F: Fn() -> T + Send + Sync,
{
    fn create(&self) -> T {
        (self.f)()
    }
}

/// Constructors for the stock factories.
pub struct FactoryBuilder;

impl FactoryBuilder {
    /// Factory returning clones of `instance`.
    pub fn singleton<T>(instance: T) -> FactoryRef<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Arc::new(SingletonFactory { instance })
    }

    /// Factory building `T::default()`.
    pub fn default_of<T>() -> FactoryRef<T>
    where
        T: Default + 'static,
    {
        Arc::new(DefaultFactory {
            _marker: PhantomData,
        })
    }

    /// Factory calling `f` for every instance.
    pub fn from_fn<T, F>(f: F) -> FactoryRef<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: 'static,
    {
        Arc::new(FnFactory { f })
    }
}

/// Identity comparison of two optional factory handles.
pub(crate) fn same_factory<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
