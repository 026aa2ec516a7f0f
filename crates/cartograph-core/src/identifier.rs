//! Content-derived entity identifiers.
//!
//! Every compiled entity is identified by an [`EntityId`] computed from the
//! SHA-256 digest of `"<kind>:<normalized key>"`. The same source therefore
//! always compiles to the same ids.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of digest bytes kept in an [`EntityId`].
const ID_LEN: usize = 16;

/// Key of the implicit owner of every plot.
const WORLD_ROOT_KEY: &str = "root";

/// Errors produced while normalizing or parsing keys and ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key `{0}` normalizes to an empty string")]
    Empty(String),

    #[error("`{0}` is not a valid entity id")]
    InvalidId(String),
}

/// The category an entity belongs to.
///
/// The kind is part of the hashed identity, so a plot and a fixture sharing
/// the key `desk` still receive distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    World,
    Plot,
    Gate,
    Fixture,
    Item,
    Actor,
}

impl EntityKind {
    /// Returns the lowercase name used in id derivation and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::World => "world",
            EntityKind::Plot => "plot",
            EntityKind::Gate => "gate",
            EntityKind::Fixture => "fixture",
            EntityKind::Item => "item",
            EntityKind::Actor => "actor",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw author key.
///
/// The key is lower-cased, every run of non-alphanumeric characters becomes a
/// single `-`, and leading or trailing `-` are removed.
///
/// # Errors
///
/// Returns [`KeyError::Empty`] when nothing alphanumeric remains.
///
/// # Examples
///
/// ```
/// use cartograph_core::normalize_key;
///
/// assert_eq!(normalize_key("Study Desk!!").unwrap(), "study-desk");
/// assert!(normalize_key("--").is_err());
/// ```
pub fn normalize_key(raw: &str) -> Result<String, KeyError> {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('-');
            }
            pending_separator = false;
            normalized.push(c);
        } else {
            pending_separator = true;
        }
    }

    if normalized.is_empty() {
        return Err(KeyError::Empty(raw.to_string()));
    }
    Ok(normalized)
}

/// Stable identifier of a compiled entity.
///
/// Displayed and serialized as 32 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId([u8; ID_LEN]);

impl EntityId {
    /// Derive the id for an already-normalized key of the given kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use cartograph_core::{EntityId, EntityKind};
    ///
    /// let a = EntityId::derive(EntityKind::Plot, "hall");
    /// let b = EntityId::derive(EntityKind::Plot, "hall");
    /// assert_eq!(a, b);
    /// assert_ne!(a, EntityId::derive(EntityKind::Fixture, "hall"));
    /// ```
    pub fn derive(kind: EntityKind, key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&digest[..ID_LEN]);
        Self(bytes)
    }

    /// The well-known owner of every plot in an assembled world.
    pub fn world_root() -> Self {
        Self::derive(EntityKind::World, WORLD_ROOT_KEY)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl FromStr for EntityId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_LEN * 2 || !s.is_ascii() {
            return Err(KeyError::InvalidId(s.to_string()));
        }

        let mut bytes = [0u8; ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| KeyError::InvalidId(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
