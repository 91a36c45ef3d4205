//! Key hashing. Element keys are stored as 64-bit digests so that any `Hash`
//! value (strings, integers, tuples) can identify a list item.

use std::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
mod hasher {
    pub type KeyHasher = std::collections::hash_map::DefaultHasher;
}

#[cfg(not(feature = "std-hash"))]
mod hasher {
    pub type KeyHasher = ahash::AHasher;
}

/// Digest used as the identity of a keyed child.
pub type Key = u64;

/// Hashes `value` with a fixed-seed hasher, so equal values always produce the
/// same key within and across passes.
#[inline]
pub fn key_of<T: Hash + ?Sized>(value: &T) -> Key {
    let mut hasher = hasher::KeyHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_a_key() {
        assert_eq!(key_of("row-1"), key_of(&String::from("row-1")));
        assert_ne!(key_of("row-1"), key_of("row-2"));
        assert_eq!(key_of(&(1u32, "a")), key_of(&(1u32, "a")));
    }
}
