use std::num::NonZeroUsize;

use crate::partition::Plan;
use crate::spawn::{Spawner, ThreadSpawner};

/// Smallest block worth handing to a worker of its own.
pub const DEFAULT_MIN_PER_WORKER: NonZeroUsize = match NonZeroUsize::new(25) {
    Some(n) => n,
    None => unreachable!(),
};

/// Where the number of hardware threads comes from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    /// Ask the operating system.
    #[default]
    Detect,
    /// Pretend the machine has exactly this many threads. 0 means unknown.
    Fixed(usize),
}

impl Parallelism {
    /// Number of concurrently executable hardware threads, or 0 if unknown.
    pub fn query(&self) -> usize {
        match self {
            Parallelism::Detect => match std::thread::available_parallelism() {
                Ok(n) => NonZeroUsize::get(n),
                Err(err) => {
                    tracing::warn!(%err, "unable to query available parallelism");
                    0
                }
            },
            Parallelism::Fixed(n) => *n,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReducerConfig {
    pub min_per_worker: NonZeroUsize,
    pub parallelism: Parallelism,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            min_per_worker: DEFAULT_MIN_PER_WORKER,
            parallelism: Parallelism::Detect,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Reducer<S = ThreadSpawner> {
    pub config: ReducerConfig,
    pub spawner: S,
}

impl Reducer {
    pub fn new() -> Self {
        Self::with_config(ReducerConfig::default())
    }

    pub fn with_config(config: ReducerConfig) -> Self {
        Self {
            config,
            spawner: ThreadSpawner,
        }
    }
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spawner> Reducer<S> {
    /// Replaces the facility used to start workers, keeping the configuration.
    pub fn with_spawner<T: Spawner>(self, spawner: T) -> Reducer<T> {
        Reducer {
            config: self.config,
            spawner,
        }
    }

    /// Decides worker count and block size for an input of `len` elements.
    pub fn plan(&self, len: usize) -> Plan {
        Plan::new(
            len,
            self.config.min_per_worker,
            self.config.parallelism.query(),
        )
    }
}
