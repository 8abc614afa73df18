//! Deterministic cache keys.

use std::fmt;

use branchdrift_core::{CommitRef, SamplingOptions};
use sha2::{Digest, Sha256};

/// Marker mixed into history keys so they never equal a single-diff key.
const HISTORY_DOMAIN: &[u8] = b"history";

/// A one-way digest of the inputs that fully determine a cached result.
///
/// Identical inputs give identical keys in every process; changing any input,
/// including the sampling parameters of a history key, changes the key.
///
/// # Examples
///
/// ```
/// use branchdrift_cache::CacheKey;
/// use branchdrift_core::{CommitRef, SamplingOptions};
///
/// let base = CommitRef::new("a1");
/// let compare = CommitRef::new("b2");
/// let diff = CacheKey::for_diff(&base, &compare, "engine");
/// let history = CacheKey::for_history(&base, &compare, "engine", SamplingOptions::default());
///
/// assert_eq!(diff, CacheKey::for_diff(&base, &compare, "engine"));
/// assert_ne!(diff, history);
/// assert_eq!(diff.as_hex().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for the [`DiffRecord`](branchdrift_core::DiffRecord) of one
    /// commit pair restricted to `directory`.
    pub fn for_diff(base: &CommitRef, compare: &CommitRef, directory: &str) -> Self {
        let hasher = Self::pair_hasher(base, compare, directory);
        Self::from_hasher(hasher)
    }

    /// Key for a history series of one commit pair, directory, and sampling.
    pub fn for_history(
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
        sampling: SamplingOptions,
    ) -> Self {
        let mut hasher = Self::pair_hasher(base, compare, directory);
        field(&mut hasher, HISTORY_DOMAIN);
        field(&mut hasher, sampling.count.to_string().as_bytes());
        field(&mut hasher, sampling.interval_days.to_string().as_bytes());
        Self::from_hasher(hasher)
    }

    fn pair_hasher(base: &CommitRef, compare: &CommitRef, directory: &str) -> Sha256 {
        let mut hasher = Sha256::new();
        field(&mut hasher, base.as_str().as_bytes());
        field(&mut hasher, compare.as_str().as_bytes());
        field(&mut hasher, directory.as_bytes());
        hasher
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Lowercase hexadecimal form of the digest.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Shard directory name: the first two hex characters.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// File stem inside the shard: the remaining hex characters.
    pub fn file_stem(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// NUL-terminated so that ("ab", "c") and ("a", "bc") hash differently.
fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update(bytes);
    hasher.update([0u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commits() -> (CommitRef, CommitRef) {
        (CommitRef::new("1111aaaa"), CommitRef::new("2222bbbb"))
    }

    #[test]
    fn diff_key_is_stable_across_calls() {
        let (base, compare) = commits();
        let first = CacheKey::for_diff(&base, &compare, "ant/dev");
        let second = CacheKey::for_diff(&base.clone(), &compare.clone(), "ant/dev");
        assert_eq!(first, second);
    }

    #[test]
    fn diff_key_matches_known_digest() {
        // sha256 of "a\0b\0dir\0"; pins the key layout across releases.
        let key = CacheKey::for_diff(&CommitRef::new("a"), &CommitRef::new("b"), "dir");
        let mut hasher = Sha256::new();
        hasher.update(b"a\0b\0dir\0");
        assert_eq!(key.as_hex(), format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn every_argument_changes_the_key() {
        let (base, compare) = commits();
        let sampling = SamplingOptions::default();
        let reference = CacheKey::for_history(&base, &compare, "ant", sampling);

        let variants = [
            CacheKey::for_history(&CommitRef::new("x"), &compare, "ant", sampling),
            CacheKey::for_history(&base, &CommitRef::new("x"), "ant", sampling),
            CacheKey::for_history(&base, &compare, "ant2", sampling),
            CacheKey::for_history(
                &base,
                &compare,
                "ant",
                SamplingOptions {
                    count: 31,
                    ..sampling
                },
            ),
            CacheKey::for_history(
                &base,
                &compare,
                "ant",
                SamplingOptions {
                    interval_days: 4,
                    ..sampling
                },
            ),
            CacheKey::for_diff(&base, &compare, "ant"),
        ];
        for variant in &variants {
            assert_ne!(&reference, variant);
        }
    }

    #[test]
    fn swapping_commits_changes_the_key() {
        let (base, compare) = commits();
        assert_ne!(
            CacheKey::for_diff(&base, &compare, "d"),
            CacheKey::for_diff(&compare, &base, "d")
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let left = CacheKey::for_diff(&CommitRef::new("ab"), &CommitRef::new("c"), "d");
        let right = CacheKey::for_diff(&CommitRef::new("a"), &CommitRef::new("bc"), "d");
        assert_ne!(left, right);
    }

    #[test]
    fn shard_and_stem_split_the_hex() {
        let (base, compare) = commits();
        let key = CacheKey::for_diff(&base, &compare, "ant");
        assert_eq!(key.shard().len(), 2);
        assert_eq!(key.file_stem().len(), 62);
        assert_eq!(format!("{}{}", key.shard(), key.file_stem()), key.as_hex());
    }
}
