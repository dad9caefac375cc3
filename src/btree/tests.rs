use std::{collections::BTreeSet as StdBTreeSet, sync::Arc};

use debug_tree::TreeBuilder;
use fake::{Fake, StringFaker};
use rand::SeedableRng;
use rayon::prelude::*;

use super::*;
use crate::arena::MmapArena;
use crate::compare::Lexicographic;

fn print_tree<A: ByteArena>(t: &BtreeSet<A>) -> Result<()> {
    let mut b = TreeBuilder::new();
    print_tree_page(&mut b, t, t.root)?;
    b.print();
    Ok(())
}

fn print_tree_page<A: ByteArena>(
    builder: &mut TreeBuilder,
    t: &BtreeSet<A>,
    page_id: u32,
) -> Result<()> {
    let page = t.pages.get(page_id)?;
    let mut branch = builder.add_branch(&format!(
        "(page {} with {} keys and {} children)",
        page_id,
        page.keys.len(),
        page.children.len()
    ));
    if page.is_leaf() {
        for (i, k) in page.keys.iter().enumerate() {
            builder.add_leaf(&format!("{:?} ({}. key)", String::from_utf8_lossy(k), i));
        }
    } else {
        for (i, child) in page.children.iter().enumerate() {
            print_tree_page(builder, t, *child)?;
            if let Some(k) = page.keys.get(i) {
                builder.add_leaf(&format!("{:?} ({}. key)", String::from_utf8_lossy(k), i));
            }
        }
    }
    branch.release();
    Ok(())
}

/// Checks the order of all keys and that all leaves have the same depth.
fn check_tree<A: ByteArena>(t: &BtreeSet<A>, comparator: &dyn Comparator) -> Vec<Vec<u8>> {
    let keys = t.keys().unwrap();
    for pair in keys.windows(2) {
        assert_eq!(Ordering::Less, comparator.compare(&pair[0], &pair[1]));
    }
    assert_eq!(t.len(), keys.len());

    fn depth<A: ByteArena>(t: &BtreeSet<A>, page_id: u32) -> usize {
        let page = t.pages.get(page_id).unwrap();
        assert_eq!(page.keys.len() as u32, t.pages.key_count(page_id));
        if page.is_leaf() {
            1
        } else {
            assert_eq!(page.keys.len() + 1, page.children.len());
            let depths: Vec<usize> = page.children.iter().map(|c| depth(t, *c)).collect();
            assert!(depths.iter().all(|d| *d == depths[0]));
            depths[0] + 1
        }
    }
    depth(t, t.root);

    keys
}

#[test]
fn insert_and_contains() {
    let mut t = BtreeSet::new(BtreeConfig::default()).unwrap();
    assert_eq!(true, t.is_empty());

    assert_eq!(false, t.insert(b"a").unwrap());
    assert_eq!(false, t.insert(b"b").unwrap());
    assert_eq!(false, t.insert(b"c").unwrap());
    assert_eq!(true, t.insert(b"b").unwrap());

    assert_eq!(false, t.is_empty());
    assert_eq!(3, t.len());
    assert_eq!(true, t.contains(b"a").unwrap());
    assert_eq!(true, t.contains(b"c").unwrap());
    assert_eq!(false, t.contains(b"z").unwrap());
    assert_eq!(false, t.contains(b"").unwrap());
}

#[test]
fn split_pages() {
    let config = BtreeConfig::default().page_size(256);
    let mut t = BtreeSet::new(config).unwrap();

    for i in 0..2_000u32 {
        assert_eq!(false, t.insert(&i.to_be_bytes()).unwrap());
    }
    print_tree(&t).unwrap();
    assert_eq!(2_000, t.len());
    assert!(t.page_count() > 1);
    check_tree(&t, &Lexicographic);

    for i in 0..2_000u32 {
        assert_eq!(true, t.contains(&i.to_be_bytes()).unwrap());
    }
    assert_eq!(false, t.contains(&2_000u32.to_be_bytes()).unwrap());
    assert_eq!(false, t.contains(b"").unwrap());
}

#[test]
fn descending_inserts() {
    let config = BtreeConfig::default().page_size(256);
    let mut t = BtreeSet::new(config).unwrap();
    for i in (0..500u16).rev() {
        t.insert(&i.to_be_bytes()).unwrap();
    }
    let keys = check_tree(&t, &Lexicographic);
    let expected: Vec<Vec<u8>> = (0..500u16).map(|i| i.to_be_bytes().to_vec()).collect();
    assert_eq!(expected, keys);
}

#[test]
fn large_keys() {
    let config = BtreeConfig::default().page_size(256);
    assert_eq!(46, config.max_key_size());
    let mut t = BtreeSet::new(config).unwrap();

    // Only a few of these keys fit into a single page
    for i in 0..200u8 {
        let mut key = vec![i; 46];
        key[45] = 0;
        t.insert(&key).unwrap();
    }
    check_tree(&t, &Lexicographic);
    let mut lookup = vec![7u8; 46];
    lookup[45] = 0;
    assert_eq!(true, t.contains(&lookup).unwrap());

    assert!(matches!(
        t.insert(&[0; 47]),
        Err(Error::KeyTooLarge { size: 47, max: 46 })
    ));
    assert!(matches!(
        t.contains(&[0; 47]),
        Err(Error::KeyTooLarge { .. })
    ));
}

#[test]
fn random_strings() {
    let seed = 1971428643569665;
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    const ASCII: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let id_faker = StringFaker::with(Vec::from(ASCII), 0..40);

    let mut expected = StdBTreeSet::new();
    let mut t = BtreeSet::new(BtreeConfig::default().page_size(512)).unwrap();
    for _ in 0..5_000 {
        let key: String = id_faker.fake_with_rng(&mut rng);
        let present = !expected.insert(key.clone().into_bytes());
        assert_eq!(present, t.insert(key.as_bytes()).unwrap());
    }
    let keys = check_tree(&t, &Lexicographic);
    assert_eq!(expected.into_iter().collect::<Vec<_>>(), keys);
}

#[test]
fn parallel_contains() {
    let mut t = BtreeSet::new(BtreeConfig::default()).unwrap();
    for i in 0..2_000u32 {
        t.insert(format!("{}", i).as_bytes()).unwrap();
    }

    // Search all keys in parallel
    let found: Result<Vec<bool>> = (0..4_000u32)
        .into_par_iter()
        .map(|i| t.contains(format!("{}", i).as_bytes()))
        .collect();
    let found = found.unwrap();
    for (i, f) in found.into_iter().enumerate() {
        assert_eq!(i < 2_000, f);
    }
}

#[test]
fn custom_comparator() {
    let reverse: SharedComparator = Arc::new(|a: &[u8], b: &[u8]| b.cmp(a));
    let mut t = BtreeSet::new(BtreeConfig::default().page_size(256)).unwrap();
    t.set_comparator(reverse.clone());

    for i in 0..300u16 {
        t.insert(&i.to_be_bytes()).unwrap();
    }
    let keys = check_tree(&t, reverse.as_ref());
    assert_eq!(299u16.to_be_bytes().to_vec(), keys[0]);
    assert_eq!(0u16.to_be_bytes().to_vec(), keys[299]);
    assert_eq!(true, t.contains(&42u16.to_be_bytes()).unwrap());
}

#[test]
fn minimal_page_size() {
    assert!(matches!(
        BtreeSet::new(BtreeConfig::default().page_size(255)),
        Err(Error::PageSizeTooSmall(255))
    ));
    assert_eq!(
        true,
        BtreeSet::new(BtreeConfig::default().page_size(MIN_PAGE_SIZE)).is_ok()
    );
}

#[test]
fn mapped_pages() {
    let arena = MmapArena::temporary().unwrap();
    let mut t = BtreeSet::with_arena(arena, BtreeConfig::default()).unwrap();
    for i in 0..5_000u32 {
        t.insert(format!("key-{}", i).as_bytes()).unwrap();
    }
    assert_eq!(true, t.contains(b"key-4999").unwrap());
    assert_eq!(false, t.contains(b"key-5000").unwrap());
    check_tree(&t, &Lexicographic);
    t.destroy().unwrap();
}

/// Arena that refuses to grow beyond a fixed size.
struct LimitedArena {
    inner: HeapArena,
    limit: usize,
}

impl ByteArena for LimitedArena {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn bytes(&self) -> &[u8] {
        self.inner.bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.inner.bytes_mut()
    }

    fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size > self.limit {
            Err(Error::ArenaExhausted {
                requested: new_size,
            })
        } else {
            self.inner.resize(new_size)
        }
    }
}

#[test]
fn failed_growth_keeps_all_keys() {
    let arena = LimitedArena {
        inner: HeapArena::new(),
        limit: 40 * MIN_PAGE_SIZE,
    };
    let config = BtreeConfig::default().page_size(MIN_PAGE_SIZE);
    let mut t = BtreeSet::with_arena(arena, config).unwrap();

    let mut inserted = StdBTreeSet::new();
    let mut failed = false;
    for i in 0..5_000u32 {
        let key = format!("{:08}", i.wrapping_mul(2_654_435_761) % 100_000);
        match t.insert(key.as_bytes()) {
            Ok(_) => {
                inserted.insert(key.into_bytes());
            }
            Err(e) => {
                assert!(matches!(e, Error::ArenaExhausted { .. }));
                failed = true;
                break;
            }
        }
    }
    assert_eq!(true, failed);
    assert!(t.height() > 1);

    // No split page was lost when the arena could not grow
    let keys = check_tree(&t, &Lexicographic);
    assert_eq!(inserted.into_iter().collect::<Vec<_>>(), keys);
    for k in keys {
        assert_eq!(true, t.contains(&k).unwrap());
    }
}
