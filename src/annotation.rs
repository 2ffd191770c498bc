//! Declarative caching.
//!
//! Method-level caching is described by plain descriptors ([`CacheResult`],
//! [`CachePut`], [`CacheRemove`], [`CacheRemoveAll`], class-level
//! [`CacheDefaults`]) and applied by calling the descriptor's `invoke` helper
//! around the method body. Keys are [`DefaultCacheKey`]s built from the
//! method's [`KeyParameter`]s by a [`CacheKeyGenerator`]; caches are found by
//! a [`CacheResolver`] produced by a [`CacheResolverFactory`].
//!
//! ```ignore
//! let details = CacheMethodDetails::new("find_user", CacheResult::named("users"), &defaults)?;
//! let resolver = factory.cache_resolver(&details)?;
//! let params = [CacheInvocationParameter::key(0, "id", 42u64)];
//! let context = CacheKeyInvocationContext::new(&details, &params);
//! let key = DefaultCacheKeyGenerator.generate_cache_key(&context)?;
//!
//! let user = CacheResult::named("users").invoke(
//!     resolver.resolve_cache(&details)?.as_ref(),
//!     None,
//!     &key,
//!     || repository.find_user(42),
//! )?;
//! ```

use crate::cache::{Cache, CacheValue};
use crate::configuration::MutableConfiguration;
use crate::error::{Error, Result};
use crate::manager::{CacheManager, CacheManagerExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ============================================================================
// Keys
// ============================================================================

/// One method argument as it takes part in a cache key.
///
/// Floats are held by bit pattern so keys have total equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyParameter {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<KeyParameter>),
}

impl KeyParameter {
    pub fn float(value: f64) -> Self {
        KeyParameter::Float(value.to_bits())
    }
}

impl fmt::Display for KeyParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParameter::Null => write!(f, "null"),
            KeyParameter::Bool(b) => write!(f, "{}", b),
            KeyParameter::Int(i) => write!(f, "{}", i),
            KeyParameter::UInt(u) => write!(f, "{}", u),
            KeyParameter::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyParameter::Str(s) => write!(f, "{}", s),
            KeyParameter::Bytes(bytes) => write!(f, "{:?}", bytes),
            KeyParameter::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! key_parameter_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for KeyParameter {
                fn from(value: $ty) -> Self {
                    KeyParameter::$variant(value as $cast)
                }
            }
        )*
    };
}

key_parameter_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    usize => UInt as u64,
}

impl From<bool> for KeyParameter {
    fn from(value: bool) -> Self {
        KeyParameter::Bool(value)
    }
}

impl From<f64> for KeyParameter {
    fn from(value: f64) -> Self {
        KeyParameter::float(value)
    }
}

impl From<f32> for KeyParameter {
    fn from(value: f32) -> Self {
        KeyParameter::float(f64::from(value))
    }
}

impl From<&str> for KeyParameter {
    fn from(value: &str) -> Self {
        KeyParameter::Str(value.to_string())
    }
}

impl From<String> for KeyParameter {
    fn from(value: String) -> Self {
        KeyParameter::Str(value)
    }
}

impl From<Vec<u8>> for KeyParameter {
    fn from(value: Vec<u8>) -> Self {
        KeyParameter::Bytes(value)
    }
}

impl From<Vec<KeyParameter>> for KeyParameter {
    fn from(value: Vec<KeyParameter>) -> Self {
        KeyParameter::Array(value)
    }
}

impl<T: Into<KeyParameter>> From<Option<T>> for KeyParameter {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyParameter::Null, Into::into)
    }
}

/// A key produced by a [`CacheKeyGenerator`].
pub trait GeneratedCacheKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Key made of the ordered key parameters of one invocation.
///
/// Equality is deep, including nested arrays. The hash is computed once.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "Vec<KeyParameter>", into = "Vec<KeyParameter>")]
pub struct DefaultCacheKey {
    parameters: Vec<KeyParameter>,
    hash: u64,
}

impl DefaultCacheKey {
    pub fn new(parameters: Vec<KeyParameter>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        parameters.hash(&mut hasher);
        DefaultCacheKey {
            hash: hasher.finish(),
            parameters,
        }
    }

    pub fn parameters(&self) -> &[KeyParameter] {
        &self.parameters
    }
}

impl PartialEq for DefaultCacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.parameters == other.parameters
    }
}

impl Eq for DefaultCacheKey {}

impl Hash for DefaultCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for DefaultCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultCacheKey{}", KeyParameter::Array(self.parameters.clone()))
    }
}

impl From<Vec<KeyParameter>> for DefaultCacheKey {
    fn from(parameters: Vec<KeyParameter>) -> Self {
        DefaultCacheKey::new(parameters)
    }
}

impl From<DefaultCacheKey> for Vec<KeyParameter> {
    fn from(key: DefaultCacheKey) -> Self {
        key.parameters
    }
}

impl GeneratedCacheKey for DefaultCacheKey {}

// ============================================================================
// Descriptors
// ============================================================================

/// Decides whether a failure takes part in caching.
pub type ErrorFilter = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Class-level defaults applied to every cached method.
#[derive(Clone, Default)]
pub struct CacheDefaults {
    pub cache_name: Option<String>,
    pub key_generator: Option<Arc<dyn CacheKeyGenerator>>,
}

impl CacheDefaults {
    pub fn named(cache_name: impl Into<String>) -> Self {
        CacheDefaults {
            cache_name: Some(cache_name.into()),
            key_generator: None,
        }
    }

    pub fn with_key_generator(mut self, generator: Arc<dyn CacheKeyGenerator>) -> Self {
        self.key_generator = Some(generator);
        self
    }
}

impl fmt::Debug for CacheDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheDefaults")
            .field("cache_name", &self.cache_name)
            .field("key_generator", &self.key_generator.is_some())
            .finish()
    }
}

/// Return a cached result when present, else run the method and cache it.
#[derive(Clone, Default)]
pub struct CacheResult {
    pub cache_name: Option<String>,
    /// Always run the method, still caching its result.
    pub skip_get: bool,
    /// Cache failures here and replay them on later calls.
    pub exception_cache_name: Option<String>,
    /// Which failures go to the exception cache; all when `None`.
    pub cached_exceptions: Option<ErrorFilter>,
}

impl CacheResult {
    pub fn named(cache_name: impl Into<String>) -> Self {
        CacheResult {
            cache_name: Some(cache_name.into()),
            ..Default::default()
        }
    }

    pub fn skip_get(mut self, skip_get: bool) -> Self {
        self.skip_get = skip_get;
        self
    }

    pub fn with_exception_cache(mut self, name: impl Into<String>) -> Self {
        self.exception_cache_name = Some(name.into());
        self
    }

    pub fn caching_exceptions<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.cached_exceptions = Some(Arc::new(filter));
        self
    }

    /// Run `method` under result caching.
    ///
    /// A hit in `exception_cache` is replayed as the error it recorded.
    pub fn invoke<V, F>(
        &self,
        cache: &dyn Cache<DefaultCacheKey, V>,
        exception_cache: Option<&dyn Cache<DefaultCacheKey, Error>>,
        key: &DefaultCacheKey,
        method: F,
    ) -> Result<V>
    where
        V: CacheValue,
        F: FnOnce() -> Result<V>,
    {
        if !self.skip_get {
            if let Some(value) = cache.get(key)? {
                trace!("✓ Cache hit in {} for {}", cache.name(), key);
                return Ok(value);
            }
            if let Some(exceptions) = exception_cache {
                if let Some(recorded) = exceptions.get(key)? {
                    trace!("✓ Replaying cached failure from {} for {}", exceptions.name(), key);
                    return Err(recorded);
                }
            }
        }

        match method() {
            Ok(value) => {
                cache.put(key.clone(), value.clone())?;
                Ok(value)
            }
            Err(e) => {
                if let Some(exceptions) = exception_cache {
                    if matches_filter(&self.cached_exceptions, &e, true) {
                        exceptions.put(key.clone(), e.clone())?;
                    }
                }
                Err(e)
            }
        }
    }
}

/// Store a method argument in the cache around the method call.
#[derive(Clone)]
pub struct CachePut {
    pub cache_name: Option<String>,
    /// Put after the method returns rather than before it runs.
    pub after_invocation: bool,
    /// Failures that still allow the put; none when `None`.
    pub cache_for: Option<ErrorFilter>,
}

impl Default for CachePut {
    fn default() -> Self {
        CachePut {
            cache_name: None,
            after_invocation: true,
            cache_for: None,
        }
    }
}

impl CachePut {
    pub fn named(cache_name: impl Into<String>) -> Self {
        CachePut {
            cache_name: Some(cache_name.into()),
            ..Default::default()
        }
    }

    pub fn before_invocation(mut self) -> Self {
        self.after_invocation = false;
        self
    }

    pub fn caching_for<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.cache_for = Some(Arc::new(filter));
        self
    }

    pub fn invoke<V, T, F>(
        &self,
        cache: &dyn Cache<DefaultCacheKey, V>,
        key: &DefaultCacheKey,
        value: V,
        method: F,
    ) -> Result<T>
    where
        V: CacheValue,
        F: FnOnce() -> Result<T>,
    {
        if !self.after_invocation {
            cache.put(key.clone(), value)?;
            return method();
        }
        let result = method();
        match &result {
            Ok(_) => cache.put(key.clone(), value)?,
            Err(e) if matches_filter(&self.cache_for, e, false) => cache.put(key.clone(), value)?,
            Err(_) => {}
        }
        result
    }
}

/// Remove one entry around the method call.
#[derive(Clone)]
pub struct CacheRemove {
    pub cache_name: Option<String>,
    pub after_invocation: bool,
    /// Failures that still allow the removal; none when `None`.
    pub evict_for: Option<ErrorFilter>,
}

impl Default for CacheRemove {
    fn default() -> Self {
        CacheRemove {
            cache_name: None,
            after_invocation: true,
            evict_for: None,
        }
    }
}

impl CacheRemove {
    pub fn named(cache_name: impl Into<String>) -> Self {
        CacheRemove {
            cache_name: Some(cache_name.into()),
            ..Default::default()
        }
    }

    pub fn before_invocation(mut self) -> Self {
        self.after_invocation = false;
        self
    }

    pub fn evicting_for<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.evict_for = Some(Arc::new(filter));
        self
    }

    pub fn invoke<V, T, F>(
        &self,
        cache: &dyn Cache<DefaultCacheKey, V>,
        key: &DefaultCacheKey,
        method: F,
    ) -> Result<T>
    where
        V: CacheValue,
        F: FnOnce() -> Result<T>,
    {
        if !self.after_invocation {
            cache.remove(key)?;
            return method();
        }
        let result = method();
        let evict = match &result {
            Ok(_) => true,
            Err(e) => matches_filter(&self.evict_for, e, false),
        };
        if evict {
            cache.remove(key)?;
        }
        result
    }
}

/// Remove every entry around the method call.
#[derive(Clone)]
pub struct CacheRemoveAll {
    pub cache_name: Option<String>,
    pub after_invocation: bool,
    pub evict_for: Option<ErrorFilter>,
}

impl Default for CacheRemoveAll {
    fn default() -> Self {
        CacheRemoveAll {
            cache_name: None,
            after_invocation: true,
            evict_for: None,
        }
    }
}

impl CacheRemoveAll {
    pub fn named(cache_name: impl Into<String>) -> Self {
        CacheRemoveAll {
            cache_name: Some(cache_name.into()),
            ..Default::default()
        }
    }

    pub fn before_invocation(mut self) -> Self {
        self.after_invocation = false;
        self
    }

    pub fn evicting_for<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.evict_for = Some(Arc::new(filter));
        self
    }

    pub fn invoke<V, T, F>(&self, cache: &dyn Cache<DefaultCacheKey, V>, method: F) -> Result<T>
    where
        V: CacheValue,
        F: FnOnce() -> Result<T>,
    {
        if !self.after_invocation {
            cache.remove_all()?;
            return method();
        }
        let result = method();
        let evict = match &result {
            Ok(_) => true,
            Err(e) => matches_filter(&self.evict_for, e, false),
        };
        if evict {
            cache.remove_all()?;
        }
        result
    }
}

fn matches_filter(filter: &Option<ErrorFilter>, error: &Error, default: bool) -> bool {
    filter.as_ref().map_or(default, |f| f(error))
}

/// The caching descriptor on one method.
#[derive(Clone)]
pub enum CacheAnnotation {
    Result(CacheResult),
    Put(CachePut),
    Remove(CacheRemove),
    RemoveAll(CacheRemoveAll),
}

impl CacheAnnotation {
    fn cache_name(&self) -> Option<&str> {
        let name = match self {
            CacheAnnotation::Result(a) => a.cache_name.as_deref(),
            CacheAnnotation::Put(a) => a.cache_name.as_deref(),
            CacheAnnotation::Remove(a) => a.cache_name.as_deref(),
            CacheAnnotation::RemoveAll(a) => a.cache_name.as_deref(),
        };
        name.filter(|name| !name.is_empty())
    }

    fn kind(&self) -> &'static str {
        match self {
            CacheAnnotation::Result(_) => "CacheResult",
            CacheAnnotation::Put(_) => "CachePut",
            CacheAnnotation::Remove(_) => "CacheRemove",
            CacheAnnotation::RemoveAll(_) => "CacheRemoveAll",
        }
    }
}

impl From<CacheResult> for CacheAnnotation {
    fn from(a: CacheResult) -> Self {
        CacheAnnotation::Result(a)
    }
}

impl From<CachePut> for CacheAnnotation {
    fn from(a: CachePut) -> Self {
        CacheAnnotation::Put(a)
    }
}

impl From<CacheRemove> for CacheAnnotation {
    fn from(a: CacheRemove) -> Self {
        CacheAnnotation::Remove(a)
    }
}

impl From<CacheRemoveAll> for CacheAnnotation {
    fn from(a: CacheRemoveAll) -> Self {
        CacheAnnotation::RemoveAll(a)
    }
}

// ============================================================================
// Method details and invocation context
// ============================================================================

/// Static information about one cached method.
#[derive(Clone)]
pub struct CacheMethodDetails {
    method_name: String,
    cache_name: String,
    annotation: CacheAnnotation,
}

impl CacheMethodDetails {
    /// Resolve the cache name: the method's descriptor first, then
    /// `defaults`, then the method name itself.
    ///
    /// # Errors
    ///
    /// `Error::AnnotationConfiguration` if `method_name` is empty.
    pub fn new(
        method_name: impl Into<String>,
        annotation: impl Into<CacheAnnotation>,
        defaults: &CacheDefaults,
    ) -> Result<Self> {
        let method_name = method_name.into();
        let annotation = annotation.into();
        if method_name.trim().is_empty() {
            return Err(Error::AnnotationConfiguration(format!(
                "{} requires a method name",
                annotation.kind()
            )));
        }
        let cache_name = annotation
            .cache_name()
            .or_else(|| defaults.cache_name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(method_name.as_str())
            .to_string();
        debug!("{} on {} uses cache {}", annotation.kind(), method_name, cache_name);
        Ok(CacheMethodDetails {
            method_name,
            cache_name,
            annotation,
        })
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn annotation(&self) -> &CacheAnnotation {
        &self.annotation
    }

    /// Exception cache for a [`CacheResult`] method, if it has one.
    pub fn exception_cache_name(&self) -> Option<&str> {
        match &self.annotation {
            CacheAnnotation::Result(a) => a.exception_cache_name.as_deref().filter(|n| !n.is_empty()),
            _ => None,
        }
    }
}

impl fmt::Debug for CacheMethodDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMethodDetails")
            .field("method_name", &self.method_name)
            .field("cache_name", &self.cache_name)
            .field("annotation", &self.annotation.kind())
            .finish()
    }
}

/// How an argument takes part in caching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterRole {
    Plain,
    Key,
    Value,
}

/// One argument of a cached invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheInvocationParameter {
    pub position: usize,
    pub name: String,
    pub value: KeyParameter,
    pub role: ParameterRole,
}

impl CacheInvocationParameter {
    pub fn plain(position: usize, name: impl Into<String>, value: impl Into<KeyParameter>) -> Self {
        Self::with_role(position, name, value, ParameterRole::Plain)
    }

    pub fn key(position: usize, name: impl Into<String>, value: impl Into<KeyParameter>) -> Self {
        Self::with_role(position, name, value, ParameterRole::Key)
    }

    pub fn value(position: usize, name: impl Into<String>, value: impl Into<KeyParameter>) -> Self {
        Self::with_role(position, name, value, ParameterRole::Value)
    }

    fn with_role(
        position: usize,
        name: impl Into<String>,
        value: impl Into<KeyParameter>,
        role: ParameterRole,
    ) -> Self {
        CacheInvocationParameter {
            position,
            name: name.into(),
            value: value.into(),
            role,
        }
    }
}

/// Everything a key generator sees about one invocation.
#[derive(Clone, Copy, Debug)]
pub struct CacheKeyInvocationContext<'a> {
    details: &'a CacheMethodDetails,
    parameters: &'a [CacheInvocationParameter],
}

impl<'a> CacheKeyInvocationContext<'a> {
    pub fn new(details: &'a CacheMethodDetails, parameters: &'a [CacheInvocationParameter]) -> Self {
        CacheKeyInvocationContext {
            details,
            parameters,
        }
    }

    pub fn details(&self) -> &'a CacheMethodDetails {
        self.details
    }

    pub fn all_parameters(&self) -> &'a [CacheInvocationParameter] {
        self.parameters
    }

    /// Parameters marked as key, or every non-value parameter when none is.
    pub fn key_parameters(&self) -> Vec<&'a CacheInvocationParameter> {
        let marked: Vec<_> = self
            .parameters
            .iter()
            .filter(|p| p.role == ParameterRole::Key)
            .collect();
        if !marked.is_empty() {
            return marked;
        }
        self.parameters
            .iter()
            .filter(|p| p.role != ParameterRole::Value)
            .collect()
    }

    /// The value parameter of a [`CachePut`] method.
    ///
    /// # Errors
    ///
    /// `Error::AnnotationConfiguration` unless exactly one parameter is
    /// marked as value.
    pub fn value_parameter(&self) -> Result<&'a CacheInvocationParameter> {
        let mut values = self
            .parameters
            .iter()
            .filter(|p| p.role == ParameterRole::Value);
        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(Error::AnnotationConfiguration(format!(
                "{} has no value parameter",
                self.details.method_name()
            ))),
            (Some(_), Some(_)) => Err(Error::AnnotationConfiguration(format!(
                "{} has more than one value parameter",
                self.details.method_name()
            ))),
        }
    }
}

// ============================================================================
// Key generation and cache resolution
// ============================================================================

/// Builds the cache key for an invocation.
pub trait CacheKeyGenerator: Send + Sync {
    fn generate_cache_key(&self, context: &CacheKeyInvocationContext<'_>) -> Result<DefaultCacheKey>;
}

/// Keys from the values of the key parameters, in declaration order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCacheKeyGenerator;

impl CacheKeyGenerator for DefaultCacheKeyGenerator {
    fn generate_cache_key(&self, context: &CacheKeyInvocationContext<'_>) -> Result<DefaultCacheKey> {
        let parameters = context
            .key_parameters()
            .into_iter()
            .map(|p| p.value.clone())
            .collect();
        Ok(DefaultCacheKey::new(parameters))
    }
}

impl<F> CacheKeyGenerator for F
where
    F: Fn(&CacheKeyInvocationContext<'_>) -> Result<DefaultCacheKey> + Send + Sync,
{
    fn generate_cache_key(&self, context: &CacheKeyInvocationContext<'_>) -> Result<DefaultCacheKey> {
        self(context)
    }
}

/// Finds the cache a method operates on.
pub trait CacheResolver<V: CacheValue>: Send + Sync {
    fn resolve_cache(&self, details: &CacheMethodDetails) -> Result<Arc<dyn Cache<DefaultCacheKey, V>>>;
}

/// Produces resolvers for cached methods.
pub trait CacheResolverFactory<V: CacheValue>: Send + Sync {
    fn cache_resolver(&self, details: &CacheMethodDetails) -> Result<Arc<dyn CacheResolver<V>>>;

    /// Resolver for the exception cache of a [`CacheResult`] method.
    ///
    /// # Errors
    ///
    /// `Error::AnnotationConfiguration` if the method has no exception cache.
    fn exception_cache_resolver(
        &self,
        details: &CacheMethodDetails,
    ) -> Result<Arc<dyn CacheResolver<Error>>>;
}

/// Resolver that always returns the same cache.
pub struct DefaultCacheResolver<V: CacheValue> {
    cache: Arc<dyn Cache<DefaultCacheKey, V>>,
}

impl<V: CacheValue> DefaultCacheResolver<V> {
    pub fn new(cache: Arc<dyn Cache<DefaultCacheKey, V>>) -> Self {
        DefaultCacheResolver { cache }
    }
}

impl<V: CacheValue> CacheResolver<V> for DefaultCacheResolver<V> {
    fn resolve_cache(&self, _details: &CacheMethodDetails) -> Result<Arc<dyn Cache<DefaultCacheKey, V>>> {
        Ok(Arc::clone(&self.cache))
    }
}

/// Resolves caches by name from one manager, creating missing ones with a
/// default configuration.
pub struct DefaultCacheResolverFactory {
    manager: Arc<dyn CacheManager>,
}

impl DefaultCacheResolverFactory {
    pub fn new(manager: Arc<dyn CacheManager>) -> Self {
        DefaultCacheResolverFactory { manager }
    }

    fn get_or_create<V: CacheValue>(&self, name: &str) -> Result<Arc<dyn Cache<DefaultCacheKey, V>>> {
        if let Some(cache) = self.manager.get_cache::<DefaultCacheKey, V>(name)? {
            return Ok(cache);
        }
        warn!("No cache named {} was found; creating one with the default configuration", name);
        match self
            .manager
            .create_cache::<DefaultCacheKey, V>(name, MutableConfiguration::new())
        {
            Ok(cache) => Ok(cache),
            // Lost a creation race.
            Err(Error::Cache(msg)) => self
                .manager
                .get_cache::<DefaultCacheKey, V>(name)?
                .ok_or(Error::Cache(msg)),
            Err(e) => Err(e),
        }
    }
}

impl<V: CacheValue> CacheResolverFactory<V> for DefaultCacheResolverFactory {
    fn cache_resolver(&self, details: &CacheMethodDetails) -> Result<Arc<dyn CacheResolver<V>>> {
        let cache = self.get_or_create::<V>(details.cache_name())?;
        Ok(Arc::new(DefaultCacheResolver::new(cache)))
    }

    fn exception_cache_resolver(
        &self,
        details: &CacheMethodDetails,
    ) -> Result<Arc<dyn CacheResolver<Error>>> {
        let name = details.exception_cache_name().ok_or_else(|| {
            Error::AnnotationConfiguration(format!(
                "{} does not declare an exception cache",
                details.method_name()
            ))
        })?;
        let cache = self.get_or_create::<Error>(name)?;
        Ok(Arc::new(DefaultCacheResolver::new(cache)))
    }
}
