use std::collections::HashMap;

use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mert::Mert;

mod common;

fn random_digit_string(rng: &mut impl Rng, dist: &Uniform<u8>, length: usize) -> Vec<u8> {
    (0..length).map(|_| b'0' + dist.sample(rng)).collect()
}

/// Spec §8 scenario 6 ("Bulk random"), scaled down from 400,000 to a size
/// a test suite can run on every invocation: insert a bulk population of
/// random digit-only keys with random 10-byte values (last write wins for
/// any repeat), then assert a sampled 1% hit subset returns exactly the
/// last-written value and a disjoint sampled 1% subset of keys that were
/// never inserted returns `None`. Keys are widened to 8 digits (10^8
/// combinations) rather than the benchmark driver's 4 digits so that a
/// "never inserted" sample is actually disjoint from the population with
/// overwhelming probability, instead of almost certainly colliding with
/// an already-inserted key the way a 10,000-combination 4-digit keyspace
/// would at this population size.
#[test]
fn bulk_random_population_hits_and_disjoint_misses() {
    common::init();
    const POPULATION: usize = 20_000;
    const KEY_LENGTH: usize = 8;
    const VALUE_LENGTH: usize = 10;
    const SAMPLE: usize = POPULATION / 100;

    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let digit = Uniform::new(0u8, 10).unwrap();

    let index = Mert::new();
    let mut last_written: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    for _ in 0..POPULATION {
        let key = random_digit_string(&mut rng, &digit, KEY_LENGTH);
        let value = random_digit_string(&mut rng, &digit, VALUE_LENGTH);
        index.insert(&key, &value).unwrap();
        last_written.insert(key, value);
    }

    let hit_sample: Vec<&Vec<u8>> = last_written.keys().take(SAMPLE).collect();
    for key in hit_sample {
        let expected = last_written.get(key).unwrap();
        assert_eq!(
            index.search(key),
            Some(expected.clone()),
            "key {key:?} must return the last value written for it"
        );
    }

    let mut miss_count = 0;
    let mut attempts = 0;
    while miss_count < SAMPLE {
        attempts += 1;
        assert!(
            attempts < SAMPLE * 100,
            "could not find enough never-inserted keys; keyspace too small for this population"
        );
        let candidate = random_digit_string(&mut rng, &digit, KEY_LENGTH);
        if last_written.contains_key(&candidate) {
            continue;
        }
        assert_eq!(
            index.search(&candidate),
            None,
            "never-inserted key {candidate:?} must not be found"
        );
        miss_count += 1;
    }
}
