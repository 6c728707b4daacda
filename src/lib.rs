mod engine;
mod parallel_sum;
mod partition;
mod spawn;

pub use engine::{Parallelism, Reducer, ReducerConfig, DEFAULT_MIN_PER_WORKER};
pub use partition::{Plan, FALLBACK_PARALLELISM};
pub use spawn::{Spawner, ThreadSpawner};

use rand::Rng;

/// Left fold of `values` onto `init` with wrapping addition.
pub fn sequential_sum(values: &[i32], init: i32) -> i32 {
    values.iter().fold(init, |acc, &x| acc.wrapping_add(x))
}

/// `len` values drawn uniformly from `0..max_value`.
pub fn random_input(rng: &mut impl Rng, len: usize, max_value: i32) -> Vec<i32> {
    (0..len).map(|_| rng.gen_range(0..max_value)).collect()
}
