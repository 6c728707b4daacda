use std::{num::NonZeroUsize, ops::Range};

/// Worker count assumed when the hardware query reports 0.
pub const FALLBACK_PARALLELISM: usize = 2;

/// How an input of `len` elements is cut into contiguous blocks.
///
/// The first `workers - 1` blocks hold exactly `block_size` elements, the
/// last one takes whatever remains. An empty input has no blocks at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub len: usize,
    pub workers: usize,
    pub block_size: usize,
}

impl Plan {
    pub fn new(len: usize, min_per_worker: NonZeroUsize, hardware_threads: usize) -> Self {
        if len == 0 {
            return Self {
                len,
                workers: 0,
                block_size: 0,
            };
        }

        let max_workers = len.div_ceil(min_per_worker.get());
        let hardware_threads = match hardware_threads {
            0 => FALLBACK_PARALLELISM,
            n => n,
        };
        let workers = hardware_threads.min(max_workers);

        Self {
            len,
            workers,
            block_size: len / workers,
        }
    }

    /// Workers started besides the caller, which folds the last block itself.
    pub fn spawned(&self) -> usize {
        self.workers.saturating_sub(1)
    }

    pub fn blocks(&self) -> impl Iterator<Item = Range<usize>> {
        let Plan {
            len,
            workers,
            block_size,
        } = *self;

        (0..workers).map(move |i| {
            let start = i * block_size;
            let end = if i + 1 == workers {
                len
            } else {
                start + block_size
            };
            start..end
        })
    }
}
