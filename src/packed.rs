//! Cache-oblivious ordered set of byte strings.
//!
//! Keys are stored sorted in a sparse array whose density is kept within bounds, so there
//! is always a gap nearby when a new key arrives. A static search tree over the array,
//! laid out in van Emde Boas order, finds the position of a key.
//! Since array slots have a fixed size, [`PackedSet`] keeps one [`PackedStructure`] per
//! power-of-two value size and routes each key to the smallest one it fits in.
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    arena::DynArena,
    compare::{default_comparator, SharedComparator},
    config::ArenaKind,
    error::{Error, Result},
    set::Set,
};

mod density;
mod slots;
mod structure;
mod tree;

pub use slots::TAG_SIZE;
pub use structure::{Keys, PackedStructure};

use density::Windows;
use slots::MAX_ORDER;

/// Number of size classes of a [`PackedSet`].
pub const SIZE_CLASSES: usize = 12;

const MAX_VALUE_CAPACITY: usize = 1 << 30;

/// Smallest `n` with `2^n >= x`.
pub(crate) fn ceil_log2(x: usize) -> u32 {
    if x <= 1 {
        0
    } else {
        usize::BITS - (x - 1).leading_zeros()
    }
}

/// Configuration of a packed structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackedConfig {
    /// The initial capacity is `2^initial_order` slots.
    pub initial_order: u32,
    /// Allowed density of the whole array, the finest windows may always be full.
    pub density: f64,
    /// Number of bytes per slot, including the size tag of the value.
    /// For a [`PackedSet`] this is the value capacity of the smallest size class.
    pub value_capacity: usize,
    /// Only update the path to the root after writing into a gap instead of recomputing it.
    pub fast_update: bool,
}

impl Default for PackedConfig {
    fn default() -> Self {
        Self {
            initial_order: 4,
            density: 0.5,
            value_capacity: 16,
            fast_update: true,
        }
    }
}

impl PackedConfig {
    pub fn initial_order(mut self, initial_order: u32) -> Self {
        self.initial_order = initial_order;
        self
    }

    pub fn density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn value_capacity(mut self, value_capacity: usize) -> Self {
        self.value_capacity = value_capacity;
        self
    }

    pub fn fast_update(mut self, fast_update: bool) -> Self {
        self.fast_update = fast_update;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.density.is_nan() || self.density <= 0.0 || self.density >= 1.0 {
            return Err(Error::InvalidDensity(self.density));
        }
        if self.initial_order == 0 || self.initial_order > MAX_ORDER {
            return Err(Error::InvalidOrder(self.initial_order));
        }
        if Windows::upper_bounds(self.initial_order, self.density)[0] == 0 {
            return Err(Error::DensityTooLow {
                density: self.density,
                order: self.initial_order,
            });
        }
        if self.value_capacity < 8
            || self.value_capacity % 8 != 0
            || self.value_capacity > MAX_VALUE_CAPACITY
        {
            return Err(Error::InvalidValueCapacity(self.value_capacity));
        }
        Ok(())
    }
}

/// Set of byte strings of any size up to the largest size class.
///
/// Size classes are created on the first insert routed to them and use
/// a fresh arena of the configured kind each.
pub struct PackedSet {
    classes: Vec<Option<PackedStructure<DynArena>>>,
    config: PackedConfig,
    arena: ArenaKind,
    comparator: SharedComparator,
}

impl PackedSet {
    /// Create a set that keeps all size classes on the heap.
    pub fn new(config: PackedConfig) -> Result<PackedSet> {
        PackedSet::with_arena(config, ArenaKind::Heap)
    }

    pub fn with_arena(config: PackedConfig, arena: ArenaKind) -> Result<PackedSet> {
        config.validate()?;
        let base = config.value_capacity;
        if !base.is_power_of_two() || (base << (SIZE_CLASSES - 1)) > MAX_VALUE_CAPACITY {
            return Err(Error::InvalidValueCapacity(base));
        }
        Ok(PackedSet {
            classes: (0..SIZE_CLASSES).map(|_| None).collect(),
            config,
            arena,
            comparator: default_comparator(),
        })
    }

    /// Index of the size class for keys with `key_size` bytes.
    ///
    /// Fails for keys that exceed the value capacity of the largest class.
    pub fn class_index(&self, key_size: usize) -> Result<usize> {
        let base_log = self.config.value_capacity.trailing_zeros();
        let index = key_size
            .checked_add(TAG_SIZE)
            .map(|size| ceil_log2(size).saturating_sub(base_log) as usize)
            .unwrap_or(usize::MAX);
        if index < SIZE_CLASSES {
            Ok(index)
        } else {
            Err(Error::KeyTooLarge {
                size: key_size,
                max: self.class_value_capacity(SIZE_CLASSES - 1) - TAG_SIZE,
            })
        }
    }

    /// Value capacity of the slots in the given size class.
    pub fn class_value_capacity(&self, index: usize) -> usize {
        self.config.value_capacity << index
    }

    /// The structure of a size class, if any key has been routed to it yet.
    pub fn class(&self, index: usize) -> Option<&PackedStructure<DynArena>> {
        self.classes.get(index).and_then(|c| c.as_ref())
    }
}

impl Set for PackedSet {
    fn insert(&mut self, key: &[u8]) -> Result<bool> {
        let index = self.class_index(key.len())?;
        let config = self
            .config
            .clone()
            .value_capacity(self.class_value_capacity(index));
        let arena = self.arena;

        let class = match &mut self.classes[index] {
            Some(class) => class,
            empty => {
                debug!(
                    index,
                    value_capacity = config.value_capacity,
                    "creating size class"
                );
                empty.insert(PackedStructure::with_arena(arena.create()?, config)?)
            }
        };
        class.insert_with(key, &*self.comparator)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        let index = self.class_index(key.len())?;
        match &self.classes[index] {
            Some(class) => class.contains_with(key, &*self.comparator),
            None => Ok(false),
        }
    }

    fn set_comparator(&mut self, comparator: SharedComparator) {
        self.comparator = comparator;
    }

    fn len(&self) -> usize {
        self.classes.iter().flatten().map(|c| c.len()).sum()
    }

    fn destroy(self: Box<Self>) -> Result<()> {
        for class in self.classes.into_iter().flatten() {
            class.destroy()?;
        }
        Ok(())
    }
}
