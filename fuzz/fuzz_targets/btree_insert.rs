#![no_main]
use libfuzzer_sys::fuzz_target;
use packed_byte_sets::{BtreeConfig, BtreeSet, MIN_PAGE_SIZE};
use std::collections::BTreeSet as StdBTreeSet;

fuzz_target!(|data: (Vec<Vec<u8>>, u8)| {
    let page_size = MIN_PAGE_SIZE + usize::from(data.1) * 16;
    let mut m = StdBTreeSet::default();
    let mut t = BtreeSet::new(BtreeConfig::default().page_size(page_size)).unwrap();

    for key in data.0 {
        if key.len() > t.max_key_size() {
            assert!(t.insert(&key).is_err());
            continue;
        }
        m.insert(key.clone());
        t.insert(&key).unwrap();
    }

    // Check that the sets are equal
    let m: Vec<_> = m.into_iter().collect();
    let t = t.keys().unwrap();
    assert_eq!(m, t);
});
