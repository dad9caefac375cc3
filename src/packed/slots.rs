use binary_layout::prelude::*;

use crate::error::{Error, Result};

// Every stored value is tagged with its size. Blank cells carry the `BLANK` size.
define_layout!(value_cell, LittleEndian, {
    size: u32,
});

// A slot of the sparse array: the index of its paired leaf in the index tree, followed by a
// value cell.
define_layout!(slot_header, LittleEndian, {
    leaf: u32,
});

/// Size of the size tag stored in front of every value.
pub const TAG_SIZE: usize = 4;

pub(crate) const BLANK: u32 = u32::MAX;

const SLOT_HEADER_SIZE: usize = 4;
pub(crate) const NODE_HEADER_SIZE: usize = 16;

/// Largest supported order, the node indices of the index tree must fit into an `u32`.
pub(crate) const MAX_ORDER: u32 = 30;

/// Position of the sparse array and the index tree inside an arena.
///
/// The array occupies the front of the arena with one slot of `4 + V` bytes per index,
/// the `2C - 1` tree nodes of `16 + V` bytes each follow directly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    order: u32,
    value_capacity: usize,
}

impl Layout {
    pub fn new(order: u32, value_capacity: usize) -> Layout {
        Layout {
            order,
            value_capacity,
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn capacity(&self) -> usize {
        1 << self.order
    }

    pub fn value_capacity(&self) -> usize {
        self.value_capacity
    }

    pub fn max_key_size(&self) -> usize {
        self.value_capacity - TAG_SIZE
    }

    pub fn node_count(&self) -> usize {
        2 * self.capacity() - 1
    }

    fn slot_stride(&self) -> usize {
        SLOT_HEADER_SIZE + self.value_capacity
    }

    fn node_stride(&self) -> usize {
        NODE_HEADER_SIZE + self.value_capacity
    }

    pub fn slot_offset(&self, index: usize) -> usize {
        index * self.slot_stride()
    }

    pub fn slot_cell(&self, index: usize) -> usize {
        self.slot_offset(index) + SLOT_HEADER_SIZE
    }

    pub fn node_offset(&self, node: usize) -> usize {
        self.capacity() * self.slot_stride() + node * self.node_stride()
    }

    pub fn node_cell(&self, node: usize) -> usize {
        self.node_offset(node) + NODE_HEADER_SIZE
    }

    /// Number of arena bytes needed for the array and the tree.
    pub fn total_size(&self) -> Result<usize> {
        let slots = self.capacity().checked_mul(self.slot_stride());
        let nodes = self.node_count().checked_mul(self.node_stride());
        slots
            .zip(nodes)
            .and_then(|(slots, nodes)| slots.checked_add(nodes))
            .ok_or(Error::ArenaExhausted {
                requested: usize::MAX,
            })
    }

    /// Layout of the same values with twice the capacity.
    pub fn doubled(&self) -> Result<Layout> {
        if self.order >= MAX_ORDER {
            return Err(Error::InvalidOrder(self.order + 1));
        }
        Ok(Layout::new(self.order + 1, self.value_capacity))
    }

    pub fn slots<'a>(&self, bytes: &'a [u8]) -> SlotArray<'a> {
        debug_assert!(bytes.len() >= self.capacity() * self.slot_stride());
        SlotArray {
            bytes,
            layout: *self,
        }
    }

    pub fn slots_mut<'a>(&self, bytes: &'a mut [u8]) -> SlotArrayMut<'a> {
        debug_assert!(bytes.len() >= self.capacity() * self.slot_stride());
        SlotArrayMut {
            bytes,
            layout: *self,
        }
    }
}

pub(crate) fn cell(bytes: &[u8], offset: usize) -> Option<&[u8]> {
    let size = value_cell::View::new(&bytes[offset..]).size().read();
    if size == BLANK {
        None
    } else {
        let start = offset + TAG_SIZE;
        Some(&bytes[start..(start + size as usize)])
    }
}

pub(crate) fn is_blank_cell(bytes: &[u8], offset: usize) -> bool {
    value_cell::View::new(&bytes[offset..]).size().read() == BLANK
}

/// Stores a value into a cell, the value must fit into the cell.
pub(crate) fn write_cell(bytes: &mut [u8], offset: usize, value: &[u8]) {
    let start = offset + TAG_SIZE;
    bytes[start..(start + value.len())].copy_from_slice(value);
    value_cell::View::new(&mut bytes[offset..])
        .size_mut()
        .write(value.len() as u32);
}

pub(crate) fn clear_cell(bytes: &mut [u8], offset: usize) {
    value_cell::View::new(&mut bytes[offset..])
        .size_mut()
        .write(BLANK);
}

/// Copies the cell at `from` including its size tag to `to`.
pub(crate) fn copy_cell(bytes: &mut [u8], from: usize, to: usize) {
    let size = value_cell::View::new(&bytes[from..]).size().read();
    let used = if size == BLANK { 0 } else { size as usize };
    bytes.copy_within(from..(from + TAG_SIZE + used), to);
}

/// Read-only view on the slots of the sparse array.
#[derive(Clone, Copy)]
pub(crate) struct SlotArray<'a> {
    bytes: &'a [u8],
    layout: Layout,
}

impl<'a> SlotArray<'a> {
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    pub fn value(&self, index: usize) -> Option<&'a [u8]> {
        cell(self.bytes, self.layout.slot_cell(index))
    }

    pub fn is_blank(&self, index: usize) -> bool {
        is_blank_cell(self.bytes, self.layout.slot_cell(index))
    }

    /// Index of the tree leaf paired with this slot.
    pub fn leaf(&self, index: usize) -> u32 {
        slot_header::View::new(&self.bytes[self.layout.slot_offset(index)..])
            .leaf()
            .read()
    }
}

/// Mutable view on the slots of the sparse array.
pub(crate) struct SlotArrayMut<'a> {
    bytes: &'a mut [u8],
    layout: Layout,
}

impl<'a> SlotArrayMut<'a> {
    pub fn is_blank(&self, index: usize) -> bool {
        is_blank_cell(self.bytes, self.layout.slot_cell(index))
    }

    pub fn set(&mut self, index: usize, value: &[u8]) {
        debug_assert!(value.len() <= self.layout.max_key_size());
        write_cell(self.bytes, self.layout.slot_cell(index), value);
    }

    pub fn clear(&mut self, index: usize) {
        clear_cell(self.bytes, self.layout.slot_cell(index));
    }

    /// Copies the value of slot `from` into slot `to`, the leaf links of both slots stay unchanged.
    pub fn move_value(&mut self, from: usize, to: usize) {
        if from != to {
            copy_cell(
                self.bytes,
                self.layout.slot_cell(from),
                self.layout.slot_cell(to),
            );
        }
    }

    pub fn set_leaf(&mut self, index: usize, leaf: u32) {
        slot_header::View::new(&mut self.bytes[self.layout.slot_offset(index)..])
            .leaf_mut()
            .write(leaf);
    }
}
