//! Content-derived event identifiers

use data_encoding::BASE32_DNSSEC;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Deterministic identifier of an event
///
/// Event IDs let a downstream store deduplicate and must be:
/// - Stable: the same field values always produce the same ID
/// - Distinct: changing any hashed value changes the ID
/// - Portable: lowercase base32hex, safe in file names and URLs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Hash the given parts in order and encode the SHA-1 digest
    ///
    /// Parts are fed to the digest back to back, with no separator.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha1::new();
        for part in parts {
            hasher.update(part.as_ref().as_bytes());
        }
        Self::from_digest(&hasher.finalize())
    }

    /// Encode raw digest bytes as unpadded lowercase base32hex
    pub fn from_digest(bytes: &[u8]) -> Self {
        Self(BASE32_DNSSEC.encode(bytes))
    }

    /// Wrap an already computed identifier
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
