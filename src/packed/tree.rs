//! Static binary search tree over the sparse array.
//!
//! The tree is complete, its leaves are paired with the array slots from left to right and
//! every node caches a copy of the largest value stored below it. Nodes are stored in the
//! recursive van Emde Boas order: a tree of height `h` is split into a top tree of height
//! `ceil(h/2)` followed by the bottom trees of height `floor(h/2)` hanging below its leaves,
//! each of them laid out the same way. All links are node indices relative to the tree region.
use std::{cmp::Ordering, ops::Range};

use binary_layout::prelude::*;

use super::slots::{cell, clear_cell, copy_cell, is_blank_cell, write_cell, Layout};
use crate::compare::Comparator;

define_layout!(node_header, LittleEndian, {
    left: u32,
    right: u32,
    parent: u32,
    slot: u32,
});

/// Link value for a missing node or slot.
pub(crate) const NIL: u32 = u32::MAX;

/// The root is always laid out first.
pub(crate) const ROOT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub left: u32,
    pub right: u32,
    pub parent: u32,
    /// The paired slot for leaves, `NIL` for inner nodes.
    pub slot: u32,
}

impl Links {
    pub fn is_leaf(&self) -> bool {
        self.slot != NIL
    }
}

pub(crate) fn links(bytes: &[u8], layout: &Layout, node: u32) -> Links {
    let view = node_header::View::new(&bytes[layout.node_offset(node as usize)..]);
    Links {
        left: view.left().read(),
        right: view.right().read(),
        parent: view.parent().read(),
        slot: view.slot().read(),
    }
}

fn set_links(bytes: &mut [u8], layout: &Layout, node: u32, links: Links) {
    let mut view = node_header::View::new(&mut bytes[layout.node_offset(node as usize)..]);
    view.left_mut().write(links.left);
    view.right_mut().write(links.right);
    view.parent_mut().write(links.parent);
    view.slot_mut().write(links.slot);
}

/// The cached maximum of a node, `None` if all slots below it are blank.
pub(crate) fn cached<'a>(bytes: &'a [u8], layout: &Layout, node: u32) -> Option<&'a [u8]> {
    cell(bytes, layout.node_cell(node as usize))
}

/// Lays out all nodes of the tree and pairs the leaves with the array slots.
///
/// All cached values are blank afterwards, use [`update`] to fill them from the array.
pub(crate) fn build(bytes: &mut [u8], layout: &Layout) {
    let mut next = 0;
    let (root, leaves) = build_subtree(bytes, layout, layout.order() + 1, &mut next);
    debug_assert_eq!(ROOT, root);
    debug_assert_eq!(layout.node_count(), next as usize);
    debug_assert_eq!(layout.capacity(), leaves.len());

    let mut slots = layout.slots_mut(bytes);
    for (slot, leaf) in leaves.iter().enumerate() {
        slots.set_leaf(slot, *leaf);
    }
    for (slot, leaf) in leaves.into_iter().enumerate() {
        let mut view = node_header::View::new(&mut bytes[layout.node_offset(leaf as usize)..]);
        view.slot_mut().write(slot as u32);
    }
}

/// Allocates the nodes of a complete subtree with `height` levels.
///
/// Returns the subtree root and the nodes of its last level from left to right.
fn build_subtree(
    bytes: &mut [u8],
    layout: &Layout,
    height: u32,
    next: &mut u32,
) -> (u32, Vec<u32>) {
    if height == 1 {
        let node = *next;
        *next += 1;
        set_links(
            bytes,
            layout,
            node,
            Links {
                left: NIL,
                right: NIL,
                parent: NIL,
                slot: NIL,
            },
        );
        clear_cell(bytes, layout.node_cell(node as usize));
        return (node, vec![node]);
    }

    let bottom_height = height / 2;
    let (root, top_leaves) = build_subtree(bytes, layout, height - bottom_height, next);

    let mut leaves = Vec::with_capacity(top_leaves.len() << bottom_height);
    for parent in top_leaves {
        let (left, left_leaves) = build_subtree(bytes, layout, bottom_height, next);
        let (right, right_leaves) = build_subtree(bytes, layout, bottom_height, next);

        let mut view = node_header::View::new(&mut bytes[layout.node_offset(parent as usize)..]);
        view.left_mut().write(left);
        view.right_mut().write(right);
        for child in [left, right] {
            node_header::View::new(&mut bytes[layout.node_offset(child as usize)..])
                .parent_mut()
                .write(parent);
        }

        leaves.extend(left_leaves);
        leaves.extend(right_leaves);
    }
    (root, leaves)
}

/// Recomputes the cached values of all nodes whose subtree overlaps the given slot range.
pub(crate) fn update(bytes: &mut [u8], layout: &Layout, range: Range<usize>) {
    if !range.is_empty() {
        update_subtree(bytes, layout, ROOT, 0..layout.capacity(), &range);
    }
}

fn update_subtree(
    bytes: &mut [u8],
    layout: &Layout,
    node: u32,
    span: Range<usize>,
    range: &Range<usize>,
) {
    if span.end <= range.start || range.end <= span.start {
        return;
    }
    let links = links(bytes, layout, node);
    let target = layout.node_cell(node as usize);
    if links.is_leaf() {
        copy_cell(bytes, layout.slot_cell(links.slot as usize), target);
        return;
    }

    let mid = span.start + (span.end - span.start) / 2;
    update_subtree(bytes, layout, links.left, span.start..mid, range);
    update_subtree(bytes, layout, links.right, mid..span.end, range);

    // The array is sorted, so a non-blank right subtree always holds the larger maximum
    let right = layout.node_cell(links.right as usize);
    let source = if is_blank_cell(bytes, right) {
        layout.node_cell(links.left as usize)
    } else {
        right
    };
    copy_cell(bytes, source, target);
}

/// Stores a new value in the leaf of `slot` and raises the cached maximum of its ancestors.
///
/// Stops at the first ancestor that already caches a value not smaller than the new one.
pub(crate) fn overwrite_and_bubble(
    bytes: &mut [u8],
    layout: &Layout,
    slot: usize,
    value: &[u8],
    comparator: &dyn Comparator,
) {
    let leaf = layout.slots(bytes).leaf(slot);
    write_cell(bytes, layout.node_cell(leaf as usize), value);

    let mut node = links(bytes, layout, leaf).parent;
    while node != NIL {
        let target = layout.node_cell(node as usize);
        if let Some(existing) = cell(bytes, target) {
            if comparator.compare(existing, value) != Ordering::Less {
                break;
            }
        }
        write_cell(bytes, target, value);
        node = links(bytes, layout, node).parent;
    }
}

/// Finds the smallest slot index holding a value not less than `key`.
///
/// Returns the capacity of the array if there is no such value.
pub(crate) fn successor(
    bytes: &[u8],
    layout: &Layout,
    key: &[u8],
    comparator: &dyn Comparator,
) -> usize {
    let covers = |node: u32| {
        cached(bytes, layout, node)
            .map(|max| comparator.compare(max, key) != Ordering::Less)
            .unwrap_or(false)
    };

    if !covers(ROOT) {
        return layout.capacity();
    }
    let mut node = ROOT;
    loop {
        let links = links(bytes, layout, node);
        if links.is_leaf() {
            return links.slot as usize;
        }
        node = if covers(links.left) {
            links.left
        } else {
            links.right
        };
    }
}

#[cfg(test)]
mod tests;
