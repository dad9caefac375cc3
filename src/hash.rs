//! Hash set with chained buckets, stored in a single arena.
//!
//! The arena starts with one little-endian `u64` per bucket holding the offset of the first
//! entry in the bucket, or zero for an empty bucket. Entries are appended behind the bucket
//! index, aligned to 8 bytes, and link to the next entry of the same bucket.
use std::cmp::Ordering;

use binary_layout::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::{
    arena::{ByteArena, HeapArena},
    compare::{default_comparator, default_hasher, SharedComparator, SharedHasher},
    error::{Error, Result},
    set::Set,
};

define_layout!(chain_entry, LittleEndian, {
    next: u64,
    size: u64,
});

define_layout!(bucket, LittleEndian, {
    head: u64,
});

const ENTRY_HEADER_SIZE: usize = 16;
const BUCKET_SIZE: usize = 8;
const ALIGNMENT: usize = 8;

/// Configuration of a [`ChainedHashSet`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashConfig {
    /// Number of buckets, the table never grows beyond it.
    pub buckets: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self { buckets: 1 << 20 }
    }
}

impl HashConfig {
    pub fn buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }
}

/// Position of the link that points to the next entry of a chain.
#[derive(Debug, Clone, Copy)]
enum Link {
    Bucket(usize),
    Entry(usize),
}

impl Link {
    fn offset(&self) -> usize {
        match self {
            Link::Bucket(b) => b * BUCKET_SIZE,
            Link::Entry(e) => *e,
        }
    }
}

pub struct ChainedHashSet<A: ByteArena = HeapArena> {
    arena: A,
    buckets: usize,
    len: usize,
    comparator: SharedComparator,
    hasher: SharedHasher,
}

impl ChainedHashSet<HeapArena> {
    pub fn new(config: HashConfig) -> Result<ChainedHashSet<HeapArena>> {
        ChainedHashSet::with_arena(HeapArena::new(), config)
    }
}

impl<A> ChainedHashSet<A>
where
    A: ByteArena,
{
    pub fn with_arena(mut arena: A, config: HashConfig) -> Result<ChainedHashSet<A>> {
        if config.buckets == 0 {
            return Err(Error::NoBuckets);
        }
        let index_size = config
            .buckets
            .checked_mul(BUCKET_SIZE)
            .ok_or(Error::ArenaExhausted {
                requested: usize::MAX,
            })?;
        // New arena bytes are zero, so all buckets start empty
        arena.resize(index_size)?;
        Ok(ChainedHashSet {
            arena,
            buckets: config.buckets,
            len: 0,
            comparator: default_comparator(),
            hasher: default_hasher(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_comparator(&mut self, comparator: SharedComparator) {
        self.comparator = comparator;
    }

    pub fn set_hasher(&mut self, hasher: SharedHasher) {
        self.hasher = hasher;
    }

    /// Insert a key if it does not exist yet.
    ///
    /// Returns `true` if the key was already present.
    pub fn insert(&mut self, key: &[u8]) -> Result<bool> {
        let tail = match self.find(key)? {
            Ok(_) => return Ok(true),
            Err(tail) => tail,
        };

        let begin = self
            .arena
            .len()
            .checked_next_multiple_of(ALIGNMENT)
            .ok_or(Error::ArenaExhausted {
                requested: usize::MAX,
            })?;
        let end = begin + ENTRY_HEADER_SIZE + key.len();
        self.arena.resize(end)?;

        let bytes = self.arena.bytes_mut();
        let mut entry = chain_entry::View::new(&mut bytes[begin..]);
        entry.next_mut().write(0);
        entry.size_mut().write(key.len().try_into()?);
        bytes[(begin + ENTRY_HEADER_SIZE)..end].copy_from_slice(key);
        self.write_link(tail, begin.try_into()?);

        self.len += 1;
        Ok(false)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find(key)?.is_ok())
    }

    pub fn destroy(mut self) -> Result<()> {
        self.arena.release()
    }

    /// Walk the chain of the key's bucket.
    ///
    /// Returns the offset of the matching entry, or the last link of the chain if the key
    /// is not stored.
    fn find(&self, key: &[u8]) -> Result<std::result::Result<usize, Link>> {
        let bucket = self.hasher.hash(key) as usize % self.buckets;
        let mut link = Link::Bucket(bucket);
        loop {
            let next: usize = self.read_link(link).try_into()?;
            if next == 0 {
                return Ok(Err(link));
            }
            let entry = chain_entry::View::new(&self.arena.bytes()[next..]);
            let size: usize = entry.size().read().try_into()?;
            let start = next + ENTRY_HEADER_SIZE;
            let stored = &self.arena.bytes()[start..(start + size)];
            if self.comparator.compare(stored, key) == Ordering::Equal {
                return Ok(Ok(next));
            }
            link = Link::Entry(next);
        }
    }

    fn read_link(&self, link: Link) -> u64 {
        bucket::View::new(&self.arena.bytes()[link.offset()..])
            .head()
            .read()
    }

    fn write_link(&mut self, link: Link, target: u64) {
        bucket::View::new(&mut self.arena.bytes_mut()[link.offset()..])
            .head_mut()
            .write(target);
    }
}

impl<A> Set for ChainedHashSet<A>
where
    A: ByteArena,
{
    fn insert(&mut self, key: &[u8]) -> Result<bool> {
        ChainedHashSet::insert(self, key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        ChainedHashSet::contains(self, key)
    }

    fn set_comparator(&mut self, comparator: SharedComparator) {
        ChainedHashSet::set_comparator(self, comparator)
    }

    fn set_hasher(&mut self, hasher: SharedHasher) {
        ChainedHashSet::set_hasher(self, hasher)
    }

    fn len(&self) -> usize {
        ChainedHashSet::len(self)
    }

    fn destroy(self: Box<Self>) -> Result<()> {
        ChainedHashSet::destroy(*self)
    }
}
