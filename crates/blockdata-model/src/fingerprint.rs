//! Content fingerprints used as cache keys
//!
//! A [`Fingerprint`] combines the Blake3 digest of the raw content with an
//! optional digest of the owning entity's metadata, so that a metadata change
//! produces a different cache key.

use std::fmt::{self, Display, Formatter};

/// Prefix shared by every cache key produced from a [`Fingerprint`]
pub const CACHE_KEY_PREFIX: &str = "blocks_";

/// Blake3 digest, displayed as lowercase hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest of raw bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of the JSON encoding of `value`
    ///
    /// # Errors
    /// Returns error if `value` cannot be serialized
    pub fn compute_serializable<T>(value: &T) -> Result<Self, DigestError>
    where
        T: serde::Serialize + ?Sized,
    {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Cache fingerprint for one `process` call
///
/// `metadata` is only present when the call carries an entity context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    content: Digest,
    metadata: Option<Digest>,
}

impl Fingerprint {
    /// Fingerprint of content with no entity context
    #[inline]
    #[must_use]
    pub fn of_content(content: &str) -> Self {
        Self {
            content: Digest::compute(content.as_bytes()),
            metadata: None,
        }
    }

    /// Mix the serialized metadata of the owning entity into the fingerprint
    ///
    /// # Errors
    /// Returns error if the metadata cannot be serialized
    pub fn with_metadata<T>(mut self, metadata: &T) -> Result<Self, DigestError>
    where
        T: serde::Serialize + ?Sized,
    {
        self.metadata = Some(Digest::compute_serializable(metadata)?);
        Ok(self)
    }

    /// Digest of the raw content
    #[inline]
    #[must_use]
    pub fn content(&self) -> &Digest {
        &self.content
    }

    /// Digest of the entity metadata, if any
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> Option<&Digest> {
        self.metadata.as_ref()
    }

    /// Key under which the enriched tree is stored
    #[must_use]
    pub fn cache_key(&self) -> String {
        match &self.metadata {
            Some(meta) => format!("{CACHE_KEY_PREFIX}{}_{meta}", self.content),
            None => format!("{CACHE_KEY_PREFIX}{}", self.content),
        }
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Metadata could not be hashed
#[derive(Debug, thiserror::Error)]
#[error("metadata is not serializable: {0}")]
pub struct DigestError(#[from] serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn digest_displays_as_hex() {
        let hex = Digest::compute(b"test").to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_without_metadata_key() {
        let fp = Fingerprint::of_content("<p>hi</p>");
        let key = fp.cache_key();
        assert!(key.starts_with(CACHE_KEY_PREFIX));
        assert_eq!(key.len(), CACHE_KEY_PREFIX.len() + 64);
        assert!(fp.metadata().is_none());
        assert_eq!(fp.to_string(), key);
    }

    #[test]
    fn fingerprint_metadata_changes_key() {
        let mut meta = BTreeMap::new();
        meta.insert("subtitle", vec!["one"]);
        let a = Fingerprint::of_content("x").with_metadata(&meta).unwrap();

        meta.insert("subtitle", vec!["two"]);
        let b = Fingerprint::of_content("x").with_metadata(&meta).unwrap();

        assert_eq!(a.content(), b.content());
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), Fingerprint::of_content("x").cache_key());
    }

    #[test]
    fn unserializable_metadata_is_an_error() {
        let mut meta = BTreeMap::new();
        meta.insert(vec![1u8], "non-string key");
        assert!(Fingerprint::of_content("x").with_metadata(&meta).is_err());
    }
}
