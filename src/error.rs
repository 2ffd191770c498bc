//! Error taxonomy shared by every cache contract.
//!
//! There is one root type, [`Error`]. Each pluggable component has its own
//! variant so that an implementation can wrap a failure coming out of user
//! code (loader, writer, listener, entry processor) before it reaches the
//! caller.

use thiserror::Error;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the caching contracts.
///
/// `Error` is `Clone` so that a single failure can be delivered to several
/// observers, e.g. a [`CompletionListenerFuture`](crate::integration::CompletionListenerFuture)
/// and the listener that produced it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Generic cache or configuration failure.
    ///
    /// Raised by provider discovery when zero or several providers are found,
    /// when a named provider cannot be loaded, and by implementations for
    /// failures that fit no narrower variant.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Declarative caching descriptors are inconsistent.
    #[error("Annotation configuration error: {0}")]
    AnnotationConfiguration(String),

    /// A cache entry listener failed while handling an event.
    #[error("Cache entry listener error: {message}")]
    EntryListener {
        message: String,
        /// The failure the listener raised, when this wraps one.
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A [`CacheLoader`](crate::integration::CacheLoader) failed.
    #[error("Cache loader error: {message}")]
    Loader {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A [`CacheWriter`](crate::integration::CacheWriter) failed.
    #[error("Cache writer error: {message}")]
    Writer {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// An [`EntryProcessor`](crate::processor::EntryProcessor) failed.
    #[error("Entry processor error: {message}")]
    EntryProcessor {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// Transactional failure reported by implementations that support one.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Closing a set of providers or managers partially failed.
    ///
    /// Each failure is recorded against the name of the component that
    /// raised it.
    #[error("Shutdown failed for {} component(s)", failures.len())]
    Shutdown {
        /// Component name and the failure it raised.
        failures: Vec<(String, Error)>,
    },

    /// Operation invoked on an object in the wrong state (closed cache,
    /// reused completion future, ...).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Argument rejected by a contract precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation is not supported by this object or implementation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A type-erased cache was requested with the wrong key or value type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Type the object was created with.
        found: String,
    },

    /// A blocking wait ran past its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An asynchronous operation completed with a failure.
    #[error("Execution failed: {0}")]
    Execution(Box<Error>),

    /// Encoding or decoding of a value or settings document failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a generic cache error from anything displayable.
    pub fn cache(msg: impl Into<String>) -> Self {
        Error::Cache(msg.into())
    }

    pub fn loader(msg: impl Into<String>) -> Self {
        Error::Loader {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn writer(msg: impl Into<String>) -> Self {
        Error::Writer {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn entry_listener(msg: impl Into<String>) -> Self {
        Error::EntryListener {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn entry_processor(msg: impl Into<String>) -> Self {
        Error::EntryProcessor {
            message: msg.into(),
            cause: None,
        }
    }

    /// Report `self` as a loader failure, keeping it as the cause.
    ///
    /// A loader failure is returned unchanged.
    pub fn into_loader(self) -> Self {
        match self {
            Error::Loader { .. } => self,
            cause => Error::Loader {
                message: cause.to_string(),
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// Report `self` as a writer failure, keeping it as the cause.
    pub fn into_writer(self) -> Self {
        match self {
            Error::Writer { .. } => self,
            cause => Error::Writer {
                message: cause.to_string(),
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// Report `self` as a listener failure, keeping it as the cause.
    pub fn into_entry_listener(self) -> Self {
        match self {
            Error::EntryListener { .. } => self,
            cause => Error::EntryListener {
                message: cause.to_string(),
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// Report `self` as an entry processor failure, keeping it as the cause.
    pub fn into_entry_processor(self) -> Self {
        match self {
            Error::EntryProcessor { .. } => self,
            cause => Error::EntryProcessor {
                message: cause.to_string(),
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// The failure this error wraps, if any.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::Execution(inner) => Some(inner),
            Error::EntryListener { cause, .. }
            | Error::Loader { cause, .. }
            | Error::Writer { cause, .. }
            | Error::EntryProcessor { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// This error followed by each wrapped cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// Walk every wrapper down to the original failure.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Some(inner) = current.cause() {
            current = inner;
        }
        current
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::Serialization(format!("Postcard error: {}", e))
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Cache(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Cache(e.to_string())
    }
}
