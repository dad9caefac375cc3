use crate::{
    compare::{SharedComparator, SharedHasher},
    error::Result,
};

/// Operations shared by all set implementations.
pub trait Set {
    /// Insert the key if it is not present yet.
    ///
    /// Returns `true` if the key was already present and `false` if it has been added.
    fn insert(&mut self, key: &[u8]) -> Result<bool>;

    /// Returns whether the set contains the given key.
    fn contains(&self, key: &[u8]) -> Result<bool>;

    /// Replaces the comparator used for all following operations.
    ///
    /// Keys are not reordered, so this should only be done on an empty set
    /// or with a comparator that agrees with the previous one.
    fn set_comparator(&mut self, comparator: SharedComparator);

    /// Replaces the hash function. Sets that don't hash their keys ignore this.
    fn set_hasher(&mut self, _hasher: SharedHasher) {}

    /// Number of keys in the set.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release all storage held by the set.
    fn destroy(self: Box<Self>) -> Result<()>;
}
