#![no_main]
use fake::{Fake, StringFaker};
use libfuzzer_sys::fuzz_target;
use packed_byte_sets::{PackedConfig, PackedSet, Set};
use rand::SeedableRng;

fuzz_target!(|seed: u64| {
    // Create a set with random entries of different sizes
    let n_entries = 2000;
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    const ASCII: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let id_faker = StringFaker::with(Vec::from(ASCII), 0..100);

    let mut set = PackedSet::new(PackedConfig::default()).unwrap();

    for _ in 0..n_entries {
        let key: String = id_faker.fake_with_rng(&mut rng);
        set.insert(key.as_bytes()).unwrap();
    }
    // Generate and insert a known key
    let search_key: String = id_faker.fake_with_rng(&mut rng);
    set.insert(search_key.as_bytes()).unwrap();

    assert!(set.contains(search_key.as_bytes()).unwrap());
});
