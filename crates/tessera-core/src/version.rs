//! Opaque version tokens for change detection
//!
//! Every cacheable input (a class, a method, an initializer list, ...) carries a
//! [`Version`]. The emitter never diffs trees: it only asks whether two versions
//! are the [same version](Version::same_version). How a token is computed is up
//! to the producer of the IR; it can be a content hash, a counter or an identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Comparison token attached to every cacheable input
///
/// An unversioned value is always considered changed, even against itself.
#[derive(Debug, Clone, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(Option<String>);

impl Version {
    /// A version that never matches anything
    pub const UNVERSIONED: Version = Version(None);

    /// Wrap a producer-defined token
    pub fn from_token(token: impl Into<String>) -> Self {
        Version(Some(token.into()))
    }

    /// Version from a monotonically increasing counter or identity number
    pub fn from_int(value: i64) -> Self {
        Version(Some(format!("#{}", value)))
    }

    /// Content-derived version (SHA-256 of the given bytes)
    pub fn fingerprint(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Version(Some(format!("{:x}", hasher.finalize())))
    }

    /// Content-derived version over several parts, order-sensitive
    pub fn fingerprint_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            let part = part.as_ref();
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Version(Some(format!("{:x}", hasher.finalize())))
    }

    /// Combine versions into one that changes whenever any part changes
    ///
    /// The result is unversioned if any part is unversioned.
    pub fn combine<'a, I>(versions: I) -> Self
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let mut combined = String::from("c(");
        for version in versions {
            match &version.0 {
                Some(token) => {
                    combined.push_str(&token.len().to_string());
                    combined.push(':');
                    combined.push_str(token);
                }
                None => return Version::UNVERSIONED,
            }
        }
        combined.push(')');
        Version(Some(combined))
    }

    pub fn is_versioned(&self) -> bool {
        self.0.is_some()
    }

    /// The only staleness test used by the caches
    pub fn same_version(&self, other: &Version) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        match &self.0 {
            Some(token) => token.chars().take(12).collect(),
            None => "unversioned".to_string(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => write!(f, "{}", token),
            None => write!(f, "<unversioned>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unversioned_never_matches() {
        assert!(!Version::UNVERSIONED.same_version(&Version::UNVERSIONED));
        assert!(!Version::UNVERSIONED.same_version(&Version::from_int(1)));
        assert!(!Version::from_int(1).same_version(&Version::UNVERSIONED));
    }

    #[test]
    fn test_token_comparison() {
        assert!(Version::from_int(3).same_version(&Version::from_int(3)));
        assert!(!Version::from_int(3).same_version(&Version::from_int(4)));
        assert!(Version::from_token("abc").same_version(&Version::from_token("abc")));
    }

    #[test]
    fn test_fingerprint_is_content_based() {
        let a = Version::fingerprint(b"class A");
        let b = Version::fingerprint(b"class A");
        let c = Version::fingerprint(b"class B");
        assert!(a.same_version(&b));
        assert!(!a.same_version(&c));
    }

    #[test]
    fn test_fingerprint_parts_is_boundary_sensitive() {
        let a = Version::fingerprint_parts(["ab", "c"]);
        let b = Version::fingerprint_parts(["a", "bc"]);
        assert!(!a.same_version(&b));
    }

    #[test]
    fn test_combine_propagates_unversioned() {
        let v1 = Version::from_int(1);
        let combined = Version::combine([&v1, &Version::UNVERSIONED]);
        assert!(!combined.is_versioned());
    }

    #[test]
    fn test_combine_differs_from_parts() {
        let v1 = Version::from_int(1);
        let v2 = Version::from_int(2);
        let combined = Version::combine([&v1, &v2]);
        assert!(!combined.same_version(&v1));
        assert!(combined.same_version(&Version::combine([&v1, &v2])));
        assert!(!combined.same_version(&Version::combine([&v2, &v1])));
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let json = serde_json::to_string(&Version::from_token("v7")).unwrap();
        assert_eq!(json, "\"v7\"");
        let unversioned: Version = serde_json::from_str("null").unwrap();
        assert!(!unversioned.is_versioned());
    }

    proptest! {
        #[test]
        fn prop_same_version_is_reflexive_for_tokens(token in "[a-z0-9]{1,16}") {
            let version = Version::from_token(token);
            prop_assert!(version.same_version(&version.clone()));
        }
    }
}
