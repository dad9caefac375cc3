#![no_main]
use libfuzzer_sys::fuzz_target;

use packed_byte_sets::{PackedConfig, PackedStructure};
use std::collections::BTreeSet;

fuzz_target!(|data: (Vec<Vec<u8>>, u8, bool)| {
    // Map the byte to a density between 0.05 and 0.95
    let density = 0.05 + f64::from(data.1 % 91) / 100.0;
    let config = PackedConfig::default()
        .density(density)
        .initial_order(5)
        .value_capacity(64)
        .fast_update(data.2);
    let mut m = BTreeSet::default();
    let mut fixture = PackedStructure::new(config).unwrap();

    for key in data.0 {
        if key.len() > fixture.max_key_size() {
            assert!(fixture.insert(&key).is_err());
            continue;
        }
        let present = !m.insert(key.clone());
        let order = fixture.order();
        assert_eq!(present, fixture.insert(&key).unwrap());
        assert!(fixture.order() <= order + 1);
    }

    // Check len() function
    assert_eq!(m.len(), fixture.len());

    for k in m.iter() {
        assert!(fixture.contains(k).unwrap());
    }

    // Check that the sets are equal
    let m: Vec<_> = m.into_iter().collect();
    let fixture_result: Vec<_> = fixture.iter().map(|k| k.to_vec()).collect();
    assert_eq!(m, fixture_result);
});
