use debug_tree::TreeBuilder;

use super::*;
use crate::compare::Lexicographic;

fn empty(order: u32) -> (Layout, Vec<u8>) {
    let layout = Layout::new(order, 16);
    let mut bytes = vec![0; layout.total_size().unwrap()];
    let mut slots = layout.slots_mut(&mut bytes);
    for i in 0..layout.capacity() {
        slots.clear(i);
    }
    build(&mut bytes, &layout);
    (layout, bytes)
}

fn fill(layout: &Layout, bytes: &mut [u8], values: &[(usize, &[u8])]) {
    let mut slots = layout.slots_mut(bytes);
    for (index, value) in values {
        slots.set(*index, value);
    }
    update(bytes, layout, 0..layout.capacity());
}

fn print_tree(layout: &Layout, bytes: &[u8]) {
    let mut b = TreeBuilder::new();
    print_tree_node(&mut b, layout, bytes, ROOT);
    b.print();
}

fn print_tree_node(builder: &mut TreeBuilder, layout: &Layout, bytes: &[u8], node: u32) {
    let l = links(bytes, layout, node);
    let max = cached(bytes, layout, node).map(|v| String::from_utf8_lossy(v).to_string());
    if l.is_leaf() {
        builder.add_leaf(&format!("(leaf {} for slot {}) {:?}", node, l.slot, max));
    } else {
        let mut branch = builder.add_branch(&format!("(node {}) {:?}", node, max));
        print_tree_node(builder, layout, bytes, l.left);
        print_tree_node(builder, layout, bytes, l.right);
        branch.release();
    }
}

fn leaves(layout: &Layout, bytes: &[u8]) -> Vec<u32> {
    let slots = layout.slots(bytes);
    (0..layout.capacity()).map(|i| slots.leaf(i)).collect()
}

#[test]
fn van_emde_boas_order() {
    let (layout, bytes) = empty(2);
    assert_eq!(vec![3, 4, 5, 6], leaves(&layout, &bytes));
    assert_eq!(
        Links {
            left: 1,
            right: 2,
            parent: NIL,
            slot: NIL
        },
        links(&bytes, &layout, ROOT)
    );
    assert_eq!(1, links(&bytes, &layout, 4).parent);
    assert_eq!(1, links(&bytes, &layout, 4).slot);

    // The top tree of height 2 is followed by four bottom trees of height 2
    let (layout, bytes) = empty(3);
    assert_eq!(
        vec![4, 5, 7, 8, 10, 11, 13, 14],
        leaves(&layout, &bytes)
    );
    assert_eq!(3, links(&bytes, &layout, 1).left);
    assert_eq!(6, links(&bytes, &layout, 1).right);
    assert_eq!(12, links(&bytes, &layout, 14).parent);
    assert_eq!(2, links(&bytes, &layout, 12).parent);

    let (layout, bytes) = empty(6);
    for slot in 0..layout.capacity() {
        let leaf = layout.slots(&bytes).leaf(slot);
        assert_eq!(slot as u32, links(&bytes, &layout, leaf).slot);
    }
}

#[test]
fn empty_tree_has_no_successor() {
    let (layout, bytes) = empty(3);
    assert_eq!(None, cached(&bytes, &layout, ROOT));
    assert_eq!(8, successor(&bytes, &layout, b"", &Lexicographic));
}

#[test]
fn successor_skips_blank_slots() {
    let (layout, mut bytes) = empty(3);
    fill(
        &layout,
        &mut bytes,
        &[(1, b"b"), (2, b"d"), (5, b"f"), (6, b"h")],
    );
    print_tree(&layout, &bytes);

    assert_eq!(Some(&b"h"[..]), cached(&bytes, &layout, ROOT));
    assert_eq!(1, successor(&bytes, &layout, b"a", &Lexicographic));
    assert_eq!(1, successor(&bytes, &layout, b"b", &Lexicographic));
    assert_eq!(2, successor(&bytes, &layout, b"c", &Lexicographic));
    assert_eq!(5, successor(&bytes, &layout, b"e", &Lexicographic));
    assert_eq!(6, successor(&bytes, &layout, b"h", &Lexicographic));
    assert_eq!(8, successor(&bytes, &layout, b"i", &Lexicographic));
}

#[test]
fn partial_update() {
    let (layout, mut bytes) = empty(3);
    fill(&layout, &mut bytes, &[(1, b"b"), (2, b"d")]);

    let mut slots = layout.slots_mut(&mut bytes);
    slots.move_value(2, 3);
    slots.clear(2);
    slots.set(7, b"x");
    update(&mut bytes, &layout, 2..4);
    // Slot 7 was outside the updated range
    assert_eq!(Some(&b"d"[..]), cached(&bytes, &layout, ROOT));
    assert_eq!(3, successor(&bytes, &layout, b"c", &Lexicographic));

    update(&mut bytes, &layout, 7..8);
    assert_eq!(Some(&b"x"[..]), cached(&bytes, &layout, ROOT));
    assert_eq!(7, successor(&bytes, &layout, b"e", &Lexicographic));
}

#[test]
fn bubble_stops_at_larger_ancestor() {
    let (layout, mut bytes) = empty(2);
    fill(&layout, &mut bytes, &[(0, b"b"), (3, b"x")]);

    layout.slots_mut(&mut bytes).set(1, b"c");
    overwrite_and_bubble(&mut bytes, &layout, 1, b"c", &Lexicographic);
    // Leaf 4 and its parent 1 now hold the new maximum, the root keeps "x"
    assert_eq!(Some(&b"c"[..]), cached(&bytes, &layout, 4));
    assert_eq!(Some(&b"c"[..]), cached(&bytes, &layout, 1));
    assert_eq!(Some(&b"x"[..]), cached(&bytes, &layout, ROOT));
    assert_eq!(1, successor(&bytes, &layout, b"bb", &Lexicographic));

    layout.slots_mut(&mut bytes).set(2, b"y");
    overwrite_and_bubble(&mut bytes, &layout, 2, b"y", &Lexicographic);
    // Not sorted any more, but the bubbling itself must reach the root
    assert_eq!(Some(&b"y"[..]), cached(&bytes, &layout, ROOT));
}
