//! Provider scopes.
//!
//! A [`ProviderScope`] is the unit providers are discovered and cached under.
//! It carries an ordered list of service registrations (provider name plus
//! constructor) and an optional parent that is consulted after the scope's
//! own registrations. Applications that load plugins or tenants separately
//! give each one its own scope; dropping the last handle to a scope lets the
//! registry release the providers discovered for it.
//!
//! ```
//! use cache_api::spi::ProviderScope;
//!
//! let root = ProviderScope::new("root");
//! let tenant = ProviderScope::with_parent("tenant-a", &root);
//! assert_eq!(tenant.parent(), Some(&root));
//! assert_ne!(tenant.id(), root.id());
//! ```

use super::CachingProvider;
use crate::error::Result;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};

/// Builds one provider instance.
pub type ProviderConstructor = Arc<dyn Fn() -> Result<Arc<dyn CachingProvider>> + Send + Sync>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CONTEXT_SCOPE: RefCell<Option<ProviderScope>> = const { RefCell::new(None) };
}

pub(crate) struct ScopeInner {
    id: u64,
    label: String,
    parent: Option<ProviderScope>,
    services: RwLock<Vec<(String, ProviderConstructor)>>,
    load_lock: Mutex<()>,
}

/// Discovery context for caching providers.
///
/// Cloning is cheap; clones refer to the same scope. Equality and hashing
/// are by identity.
#[derive(Clone)]
pub struct ProviderScope {
    inner: Arc<ScopeInner>,
}

impl ProviderScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self::build(label.into(), None)
    }

    /// A scope that falls back to `parent` for services it does not define.
    pub fn with_parent(label: impl Into<String>, parent: &ProviderScope) -> Self {
        Self::build(label.into(), Some(parent.clone()))
    }

    fn build(label: String, parent: Option<ProviderScope>) -> Self {
        ProviderScope {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                label,
                parent,
                services: RwLock::new(Vec::new()),
                load_lock: Mutex::new(()),
            }),
        }
    }

    /// Process-wide root scope.
    pub fn system() -> ProviderScope {
        static SYSTEM: OnceLock<ProviderScope> = OnceLock::new();
        SYSTEM.get_or_init(|| ProviderScope::new("system")).clone()
    }

    /// Scope set for the current thread, else [`Self::system`].
    pub fn context() -> ProviderScope {
        CONTEXT_SCOPE
            .with(|cell| cell.borrow().clone())
            .unwrap_or_else(ProviderScope::system)
    }

    /// Set (or clear) the current thread's scope; returns the previous one.
    pub fn set_context(scope: Option<ProviderScope>) -> Option<ProviderScope> {
        CONTEXT_SCOPE.with(|cell| cell.replace(scope))
    }

    /// Unique, never reused identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn parent(&self) -> Option<&ProviderScope> {
        self.inner.parent.as_ref()
    }

    /// Advertise `P` under its type name, built with `P::default()`.
    pub fn register<P>(&self) -> &Self
    where
        P: CachingProvider + Default + 'static,
    {
        self.register_named(std::any::type_name::<P>(), || {
            Ok(Arc::new(P::default()) as Arc<dyn CachingProvider>)
        })
    }

    /// Advertise a provider under `name` with a custom constructor.
    ///
    /// Registering a name twice keeps the first registration.
    pub fn register_named<F>(&self, name: impl Into<String>, constructor: F) -> &Self
    where
        F: Fn() -> Result<Arc<dyn CachingProvider>> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut services = self.write_services();
        if services.iter().any(|(n, _)| *n == name) {
            debug!("Provider {} already registered in scope {}", name, self.label());
        } else {
            debug!("Registered provider {} in scope {}", name, self.label());
            let constructor: ProviderConstructor = Arc::new(constructor);
            services.push((name, constructor));
        }
        self
    }

    /// Names advertised by this scope and its ancestors, nearest first,
    /// without duplicates.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            for (name, _) in scope.read_services().iter() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            current = scope.parent();
        }
        names
    }

    /// Constructor for `name`, searching this scope then its ancestors.
    pub fn load(&self, name: &str) -> Option<ProviderConstructor> {
        let mut current = Some(self);
        while let Some(scope) = current {
            let found = scope
                .read_services()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, ctor)| Arc::clone(ctor));
            if found.is_some() {
                return found;
            }
            current = scope.parent();
        }
        None
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
        Arc::downgrade(&self.inner)
    }

    /// Serializes on-demand provider loads for this scope.
    pub(crate) fn load_lock(&self) -> MutexGuard<'_, ()> {
        self.inner
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_services(&self) -> std::sync::RwLockReadGuard<'_, Vec<(String, ProviderConstructor)>> {
        self.inner
            .services
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_services(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Vec<(String, ProviderConstructor)>> {
        self.inner
            .services
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for ProviderScope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ProviderScope {}

impl Hash for ProviderScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for ProviderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderScope")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.id()))
            .finish()
    }
}
