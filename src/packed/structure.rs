use std::{cmp::Ordering, ops::Range};

use tracing::{debug, trace, warn};

use super::{
    density::Windows,
    slots::{Layout, SlotArray},
    tree, PackedConfig,
};
use crate::{
    arena::{ByteArena, HeapArena},
    compare::{default_comparator, Comparator, SharedComparator},
    error::{Error, Result},
    set::Set,
};

/// Ordered set of byte strings with a fixed maximum value size.
///
/// The keys are kept in a sorted sparse array with a bounded density and a static search
/// tree, both stored in one arena. Inserting a key costs amortized `O(log² N)` slot moves,
/// a lookup visits `O(log N)` tree nodes.
///
/// If growing the arena fails, the structure is marked invalid and all further operations
/// return [`Error::Invalidated`].
pub struct PackedStructure<A: ByteArena = HeapArena> {
    arena: A,
    layout: Layout,
    windows: Windows,
    density: f64,
    fast_update: bool,
    comparator: SharedComparator,
    invalid: bool,
}

impl PackedStructure<HeapArena> {
    pub fn new(config: PackedConfig) -> Result<PackedStructure<HeapArena>> {
        PackedStructure::with_arena(HeapArena::new(), config)
    }
}

impl<A: ByteArena> PackedStructure<A> {
    /// Create an empty structure that stores its array and tree in the given arena.
    pub fn with_arena(mut arena: A, config: PackedConfig) -> Result<PackedStructure<A>> {
        config.validate()?;
        let layout = Layout::new(config.initial_order, config.value_capacity);
        arena.resize(layout.total_size()?)?;

        let bytes = arena.bytes_mut();
        let mut slots = layout.slots_mut(bytes);
        for i in 0..layout.capacity() {
            slots.clear(i);
        }
        tree::build(bytes, &layout);

        Ok(PackedStructure {
            arena,
            layout,
            windows: Windows::new(config.initial_order, config.density),
            density: config.density,
            fast_update: config.fast_update,
            comparator: default_comparator(),
            invalid: false,
        })
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The array has `2^order` slots.
    pub fn order(&self) -> u32 {
        self.layout.order()
    }

    /// Number of slots in the array.
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// Number of levels of the window hierarchy.
    pub fn levels(&self) -> u32 {
        self.windows.levels()
    }

    pub fn value_capacity(&self) -> usize {
        self.layout.value_capacity()
    }

    pub fn max_key_size(&self) -> usize {
        self.layout.max_key_size()
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn set_comparator(&mut self, comparator: SharedComparator) {
        self.comparator = comparator;
    }

    /// Iterate over all keys in ascending order.
    pub fn iter(&self) -> Keys<'_> {
        Keys {
            slots: self.slots(),
            index: 0,
        }
    }

    /// Insert a key using the comparator of this structure.
    ///
    /// Returns `true` if the key was already present.
    pub fn insert(&mut self, key: &[u8]) -> Result<bool> {
        let comparator = self.comparator.clone();
        self.insert_with(key, comparator.as_ref())
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.contains_with(key, self.comparator.as_ref())
    }

    /// Insert a key, ordering it with the given comparator.
    pub fn insert_with(&mut self, key: &[u8], comparator: &dyn Comparator) -> Result<bool> {
        self.check_key(key)?;

        let index = tree::successor(self.arena.bytes(), &self.layout, key, comparator);
        if self.is_equal(index, key, comparator) {
            return Ok(true);
        }

        if let Some(gap) = self.gap_before(index) {
            if self.windows.admits_all(gap) {
                self.place(gap, key, comparator);
                return Ok(false);
            }
        }

        self.rebalance(index, key)?;
        Ok(false)
    }

    /// Search for a key, using the given comparator.
    pub fn contains_with(&self, key: &[u8], comparator: &dyn Comparator) -> Result<bool> {
        self.check_key(key)?;
        let index = tree::successor(self.arena.bytes(), &self.layout, key, comparator);
        Ok(self.is_equal(index, key, comparator))
    }

    /// Release the arena.
    pub fn destroy(mut self) -> Result<()> {
        self.arena.release()
    }

    fn slots(&self) -> SlotArray<'_> {
        self.layout.slots(self.arena.bytes())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if self.invalid {
            Err(Error::Invalidated)
        } else if key.len() > self.layout.max_key_size() {
            Err(Error::KeyTooLarge {
                size: key.len(),
                max: self.layout.max_key_size(),
            })
        } else {
            Ok(())
        }
    }

    fn is_equal(&self, index: usize, key: &[u8], comparator: &dyn Comparator) -> bool {
        index < self.capacity()
            && self
                .slots()
                .value(index)
                .map(|value| comparator.compare(value, key) == Ordering::Equal)
                .unwrap_or(false)
    }

    /// Middle of the run of blank slots directly before `index`, if there is one.
    fn gap_before(&self, index: usize) -> Option<usize> {
        let slots = self.slots();
        let mut start = index;
        while start > 0 && slots.is_blank(start - 1) {
            start -= 1;
        }
        if start < index {
            Some(start + (index - start) / 2)
        } else {
            None
        }
    }

    /// Write a key into a blank slot that keeps the array sorted.
    fn place(&mut self, index: usize, key: &[u8], comparator: &dyn Comparator) {
        let bytes = self.arena.bytes_mut();
        self.layout.slots_mut(bytes).set(index, key);
        self.windows.increment(index);
        if self.fast_update {
            tree::overwrite_and_bubble(bytes, &self.layout, index, key, comparator);
        } else {
            tree::update(bytes, &self.layout, index..(index + 1));
        }
    }

    /// Insert the key before slot `position` by redistributing the smallest window around
    /// it that has room, doubling the array if not even the whole array has room.
    fn rebalance(&mut self, position: usize, key: &[u8]) -> Result<()> {
        let level = match self.windows.choose_level(position.min(self.capacity() - 1)) {
            Some(level) => level,
            None => {
                // Each doubling raises the bound of the whole array
                self.double()?;
                0
            }
        };
        let window = self
            .windows
            .window_of(level, position.min(self.capacity() - 1));

        let span = self.windows.span(level, window);
        trace!(level, window, ?span, "rebalancing window");
        self.redistribute(span, Some((position, key)));
        self.settle(level, window);
        Ok(())
    }

    /// Redistribute enclosing windows until all windows are within their upper bound again.
    ///
    /// Never goes beyond the whole array, which is within its bound after every rebalance.
    fn settle(&mut self, mut level: u32, mut window: usize) {
        while level > 0 && !self.windows.within_bounds(self.windows.span(level, window)) {
            level -= 1;
            window /= 2;
            let span = self.windows.span(level, window);
            trace!(level, window, ?span, "window exceeds its bound after rebalancing");
            self.redistribute(span, None);
        }
    }

    /// Evenly spread the values of the slots in `span`, optionally adding a new key that
    /// belongs in front of slot `position`.
    ///
    /// Updates the population counts and the tree for the whole span.
    fn redistribute(&mut self, span: Range<usize>, insert: Option<(usize, &[u8])>) {
        let layout = self.layout;
        let bytes = self.arena.bytes_mut();
        let mut slots = layout.slots_mut(bytes);

        // Move all values to the front of the window and find the rank of the new key
        let mut stored = 0;
        let mut rank = 0;
        for i in span.clone() {
            if !slots.is_blank(i) {
                slots.move_value(i, span.start + stored);
                stored += 1;
                if let Some((position, _)) = insert {
                    if i < position {
                        rank = stored;
                    }
                }
            }
        }

        let count = stored + usize::from(insert.is_some());
        let blanks = span.len() - count;
        let gaps = count + 1;

        // Lay the values out from the back, so no value is overwritten before it is moved
        let mut end = span.end;
        for k in (0..count).rev() {
            let target = span.start + k + blanks_before(k + 1, blanks, gaps);
            match insert {
                Some((_, key)) if k == rank => slots.set(target, key),
                Some(_) if k > rank => slots.move_value(span.start + k - 1, target),
                _ => slots.move_value(span.start + k, target),
            }
            for i in (target + 1)..end {
                slots.clear(i);
            }
            end = target;
        }
        for i in span.start..end {
            slots.clear(i);
        }

        let slots = layout.slots(bytes);
        self.windows.recount(span.clone(), |i| !slots.is_blank(i));
        tree::update(bytes, &layout, span);
    }

    /// Double the capacity of the array, keeping all values in their slots.
    fn double(&mut self) -> Result<()> {
        let old_capacity = self.capacity();
        let layout = self.layout.doubled()?;
        let size = layout.total_size()?;
        if let Err(e) = self.arena.resize(size) {
            warn!(order = layout.order(), size, "could not double packed structure: {}", e);
            self.invalid = true;
            return Err(e);
        }

        // The new slots overlap the old tree
        let bytes = self.arena.bytes_mut();
        let mut slots = layout.slots_mut(bytes);
        for i in old_capacity..layout.capacity() {
            slots.clear(i);
        }
        tree::build(bytes, &layout);
        tree::update(bytes, &layout, 0..old_capacity);

        let mut windows = Windows::new(layout.order(), self.density);
        let slots = layout.slots(bytes);
        windows.recount(0..old_capacity, |i| !slots.is_blank(i));

        debug!(
            order = layout.order(),
            levels = windows.levels(),
            len = windows.len(),
            "doubled packed structure"
        );
        self.layout = layout;
        self.windows = windows;
        Ok(())
    }
}

/// Number of blanks in the first `g` gaps when `blanks` blanks are spread over `gaps` gaps.
///
/// The sizes of any two gaps differ by at most one.
fn blanks_before(g: usize, blanks: usize, gaps: usize) -> usize {
    g * (blanks / gaps) + g * (blanks % gaps) / gaps
}

impl<A> Set for PackedStructure<A>
where
    A: ByteArena,
{
    fn insert(&mut self, key: &[u8]) -> Result<bool> {
        PackedStructure::insert(self, key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        PackedStructure::contains(self, key)
    }

    fn set_comparator(&mut self, comparator: SharedComparator) {
        PackedStructure::set_comparator(self, comparator)
    }

    fn len(&self) -> usize {
        PackedStructure::len(self)
    }

    fn destroy(self: Box<Self>) -> Result<()> {
        PackedStructure::destroy(*self)
    }
}

/// Iterator over the keys of a [`PackedStructure`] in ascending order.
pub struct Keys<'a> {
    slots: SlotArray<'a>,
    index: usize,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.slots.capacity() {
            let value = self.slots.value(self.index);
            self.index += 1;
            if value.is_some() {
                return value;
            }
        }
        None
    }
}

impl<'a, A: ByteArena> IntoIterator for &'a PackedStructure<A> {
    type Item = &'a [u8];
    type IntoIter = Keys<'a>;

    fn into_iter(self) -> Keys<'a> {
        self.iter()
    }
}
