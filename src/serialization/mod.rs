//! Postcard envelopes and store-by-value copies.
//!
//! Values that cross a store-by-value boundary, or keys shipped between
//! processes, are encoded as:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "JCAP"              u32                postcard::to_allocvec(T)
//! ```
//!
//! ```rust
//! use cache_api::serialization::{decode, encode};
//!
//! # fn main() -> cache_api::Result<()> {
//! let bytes = encode(&(1u64, "alice".to_string()))?;
//! assert_eq!(&bytes[0..4], b"JCAP");
//!
//! let back: (u64, String) = decode(&bytes)?;
//! assert_eq!(back, (1, "alice".to_string()));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Identifies an encoded value.
pub const ENVELOPE_MAGIC: [u8; 4] = *b"JCAP";

/// Bumped whenever the encoding of a public type changes.
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: ENVELOPE_MAGIC,
            version: ENVELOPE_VERSION,
            payload,
        }
    }
}

/// Encode `value` inside an envelope.
///
/// # Errors
///
/// `Error::Serialization` if postcard rejects the value.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(&Envelope::new(value)).map_err(|e| {
        error!("Envelope encoding failed: {}", e);
        Error::Serialization(e.to_string())
    })
}

/// Decode a value produced by [`encode`], validating magic and version.
///
/// # Errors
///
/// `Error::Serialization` on a foreign magic, another version, or a
/// corrupt payload.
pub fn decode<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: Envelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Envelope decoding failed: {}", e);
        Error::Serialization(e.to_string())
    })?;

    if envelope.magic != ENVELOPE_MAGIC {
        warn!(
            "Invalid envelope: expected magic {:?}, got {:?}",
            ENVELOPE_MAGIC, envelope.magic
        );
        return Err(Error::Serialization(format!(
            "Invalid magic: expected {:?}, got {:?}",
            ENVELOPE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != ENVELOPE_VERSION {
        warn!(
            "Envelope version mismatch: expected {}, got {}",
            ENVELOPE_VERSION, envelope.version
        );
        return Err(Error::Serialization(format!(
            "Version mismatch: expected {}, got {}",
            ENVELOPE_VERSION, envelope.version
        )));
    }

    Ok(envelope.payload)
}

// ============================================================================
// Value copiers
// ============================================================================

/// Produces the copy a cache stores or hands out.
pub trait ValueCopier<V>: Send + Sync {
    fn copy(&self, value: &V) -> Result<V>;
}

/// Store-by-reference: hands out clones sharing whatever the value shares.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceCopier;

impl<V: Clone> ValueCopier<V> for ReferenceCopier {
    fn copy(&self, value: &V) -> Result<V> {
        Ok(value.clone())
    }
}

/// Store-by-value: copies through an encode/decode round trip, so no
/// interior state is shared with the caller.
pub struct SerializingCopier<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> SerializingCopier<V> {
    pub fn new() -> Self {
        SerializingCopier {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for SerializingCopier<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize + DeserializeOwned> ValueCopier<V> for SerializingCopier<V> {
    fn copy(&self, value: &V) -> Result<V> {
        let bytes = encode(value)?;
        decode(&bytes)
    }
}
