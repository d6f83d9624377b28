//! Inserts a large number of random digit-only keys and reports
//! wall-clock milliseconds and final tree shape, for quick manual
//! profiling against this crate's own `Mert` facade.

use std::time::Instant;

use rand::distr::{Distribution, Uniform};
use rand::Rng;

use mert::Mert;

const NUM_INSERTIONS: usize = 400_000;
const KEY_LENGTH: usize = 4;
const VALUE_LENGTH: usize = 10;

fn random_digit_string(rng: &mut impl Rng, dist: &Uniform<u8>, length: usize) -> Vec<u8> {
    (0..length).map(|_| b'0' + dist.sample(rng)).collect()
}

fn main() {
    let index = Mert::new();
    let mut rng = rand::rng();
    let dist = Uniform::new(0u8, 10).expect("0..10 is a valid range");

    let start = Instant::now();
    for _ in 0..NUM_INSERTIONS {
        let key = random_digit_string(&mut rng, &dist, KEY_LENGTH);
        let value = random_digit_string(&mut rng, &dist, VALUE_LENGTH);
        index.insert(&key, &value).expect("key is non-empty");
    }
    let elapsed = start.elapsed();

    println!(
        "inserted {NUM_INSERTIONS} key/value pairs in {} ms",
        elapsed.as_millis()
    );
    let stats = index.stats();
    println!(
        "final shape: {} root slots, {} nodes, {} segments, {} leaves",
        stats.root_slots_used, stats.nodes, stats.segments, stats.leaves
    );
}
