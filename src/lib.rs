//! Sets of byte strings with interchangeable storage engines.
//!
//! All sets implement the [`Set`] trait and keep their whole content in a single
//! growable [`ByteArena`], either on the heap or in a memory mapped region.
//! The main engine is [`PackedSet`], a cache-oblivious ordered set that stores its keys
//! in a packed sparse array searched through a tree in van Emde Boas layout.
//! [`BtreeSet`] and [`ChainedHashSet`] are conventional alternatives.
//!
//! ```rust
//! use packed_byte_sets::{Error, Set, SetConfig};
//!
//! fn main() -> std::result::Result<(), Error> {
//!     let config: SetConfig = "packed density=0.5".parse()?;
//!     let mut set = config.create()?;
//!     set.insert(b"hello")?;
//!     assert!(set.contains(b"hello")?);
//!     assert!(!set.contains(b"world")?);
//!     set.destroy()
//! }
//! ```
mod arena;
mod btree;
mod compare;
mod config;
mod error;
mod hash;
mod packed;
mod set;

pub use arena::{ByteArena, DynArena, HeapArena, MmapArena};
pub use btree::{BtreeConfig, BtreeSet, MIN_PAGE_SIZE};
pub use compare::{
    default_comparator, default_hasher, Comparator, Fnv1a, KeyHasher, Lexicographic,
    SharedComparator, SharedHasher,
};
pub use config::{ArenaKind, SetConfig, SetKind};
pub use error::{Error, Result};
pub use hash::{ChainedHashSet, HashConfig};
pub use packed::{Keys, PackedConfig, PackedSet, PackedStructure, SIZE_CLASSES, TAG_SIZE};
pub use set::Set;
