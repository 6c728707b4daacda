use std::{sync::Arc, thread};

use anyhow::Context;

use crate::{engine::Reducer, sequential_sum, spawn::Spawner};

impl<S: Spawner> Reducer<S> {
    /// Sums `input` plus `init`, folding contiguous blocks on separate threads.
    ///
    /// The caller folds the last block itself and joins every worker before
    /// the partial sums are combined in block order. A worker that cannot be
    /// spawned, or that panics, fails the whole call.
    pub fn parallel_sum(&self, input: &[i32], init: i32) -> anyhow::Result<i32> {
        let plan = self.plan(input.len());
        let blocks: Vec<_> = plan.blocks().collect();
        let mut partials = vec![0i32; plan.workers];

        let (Some((last_block, blocks)), Some((last_slot, slots))) =
            (blocks.split_last(), partials.split_last_mut())
        else {
            return Ok(init);
        };

        tracing::debug!(
            len = plan.len,
            workers = plan.workers,
            block_size = plan.block_size,
            "summing in parallel"
        );

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(slots.len());
            let mut spawn_failure = None;

            for (i, (slot, block)) in slots.iter_mut().zip(blocks).enumerate() {
                let chunk = &input[block.clone()];
                tracing::trace!(
                    block = i,
                    start = block.start,
                    end = block.end,
                    "spawning worker"
                );

                let name = format!("parsum-worker-{i}");
                let spawned = self.spawner.spawn_scoped(scope, name, move || {
                    *slot = sequential_sum(chunk, 0);
                });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        let context = format!("failed to spawn worker for block {i} ({block:?})");
                        spawn_failure = Some(anyhow::Error::new(err).context(context));
                        break;
                    }
                }
            }

            if spawn_failure.is_none() {
                *last_slot = sequential_sum(&input[last_block.clone()], 0);
            }

            let panicked = handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(Result::is_err)
                .count();

            if let Some(err) = spawn_failure {
                return Err(err);
            }
            anyhow::ensure!(
                panicked == 0,
                "{panicked} of {} workers panicked",
                plan.spawned()
            );

            Ok(())
        })?;

        Ok(sequential_sum(&partials, init))
    }
}

impl<S: Spawner + Clone + Send + 'static> Reducer<S> {
    /// Runs [`Reducer::parallel_sum`] on tokio's blocking pool and awaits the result.
    pub async fn parallel_sum_owned(&self, input: Arc<[i32]>, init: i32) -> anyhow::Result<i32> {
        let reducer = self.clone();

        tokio::task::spawn_blocking(move || reducer.parallel_sum(&input, init))
            .await
            .context("reduction task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{seeded_input, CountingSpawner, FailingSpawner, PanickingSpawner};
    use crate::{Parallelism, ReducerConfig};

    fn reducer(threads: usize) -> Reducer {
        Reducer::with_config(ReducerConfig {
            parallelism: Parallelism::Fixed(threads),
            ..Default::default()
        })
    }

    #[test]
    fn empty_input_returns_init() -> anyhow::Result<()> {
        let spawner = CountingSpawner::default();
        let reducer = reducer(8).with_spawner(spawner.clone());

        assert_eq!(reducer.parallel_sum(&[], 7)?, 7);
        assert_eq!(spawner.count(), 0);

        Ok(())
    }

    #[test]
    fn single_element() -> anyhow::Result<()> {
        let spawner = CountingSpawner::default();
        let reducer = reducer(8).with_spawner(spawner.clone());

        assert_eq!(reducer.parallel_sum(&[5], 3)?, 8);
        assert_eq!(spawner.count(), 0);

        Ok(())
    }

    #[test]
    fn ten_ones_stay_on_caller() -> anyhow::Result<()> {
        let spawner = CountingSpawner::default();
        let reducer = reducer(8).with_spawner(spawner.clone());

        assert_eq!(reducer.plan(10).workers, 1);
        assert_eq!(reducer.parallel_sum(&[1; 10], 0)?, 10);
        assert_eq!(spawner.count(), 0);

        Ok(())
    }

    #[test]
    fn init_is_added_once() -> anyhow::Result<()> {
        let input = vec![1; 1000];

        assert_eq!(reducer(4).parallel_sum(&input, 100)?, 1100);

        Ok(())
    }

    #[test]
    fn matches_sequential_for_many_shapes() -> anyhow::Result<()> {
        for threads in [0, 1, 2, 3, 7, 16] {
            let spawner = CountingSpawner::default();
            let reducer = reducer(threads).with_spawner(spawner.clone());

            for len in 0..=300 {
                let input = seeded_input(len as u64, len, 100);
                let expected = sequential_sum(&input, -42);
                let before = spawner.count();

                assert_eq!(
                    reducer.parallel_sum(&input, -42)?,
                    expected,
                    "len {len}, threads {threads}"
                );

                let spawned = spawner.count() - before;
                let plan = reducer.plan(len);
                assert_eq!(spawned, plan.spawned());
                assert!(plan.workers <= if threads == 0 { 2 } else { threads });
                assert!(spawned <= len.div_ceil(25).saturating_sub(1));
            }
        }

        Ok(())
    }

    #[test]
    fn million_elements() -> anyhow::Result<()> {
        let input = seeded_input(0, 1_000_000, 5);
        let expected: i32 = input.iter().sum();

        assert_eq!(Reducer::new().parallel_sum(&input, 0)?, expected);

        Ok(())
    }

    #[test]
    fn repeated_calls_agree() -> anyhow::Result<()> {
        let input = seeded_input(1, 50_000, 1000);
        let reducer = reducer(6);

        let first = reducer.parallel_sum(&input, 9)?;
        let second = reducer.parallel_sum(&input, 9)?;
        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn overflow_wraps_like_sequential() -> anyhow::Result<()> {
        let input = vec![i32::MAX; 1000];
        let expected = (i32::MAX as i64 * 1000 + 1) as i32;

        assert_eq!(reducer(4).parallel_sum(&input, 1)?, expected);
        assert_eq!(sequential_sum(&input, 1), expected);

        Ok(())
    }

    #[test]
    fn spawn_failure_is_fatal() {
        let spawner = FailingSpawner::after(1);
        let reducer = reducer(4).with_spawner(spawner.clone());

        let err = reducer
            .parallel_sum(&[1; 1000], 0)
            .expect_err("second spawn must fail");

        assert!(format!("{err:#}").contains("block 1"), "{err:#}");
        assert_eq!(spawner.count(), 1);
    }

    #[test]
    fn worker_panic_is_reported() {
        let reducer = reducer(4).with_spawner(PanickingSpawner);

        let err = reducer
            .parallel_sum(&[1; 1000], 0)
            .expect_err("workers panic");

        assert!(err.to_string().contains("3 of 3 workers panicked"), "{err}");
    }

    #[tokio::test]
    async fn owned_input_matches_sequential() -> anyhow::Result<()> {
        let input: Arc<[i32]> = seeded_input(2, 123_457, 5).into();
        let expected = sequential_sum(&input, 11);

        assert_eq!(reducer(5).parallel_sum_owned(input, 11).await?, expected);

        Ok(())
    }

    #[tokio::test]
    async fn owned_input_propagates_spawn_failure() {
        let reducer = reducer(4).with_spawner(FailingSpawner::after(0));

        let result = reducer.parallel_sum_owned(vec![1; 1000].into(), 0).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn owned_input_reports_worker_panic() {
        let reducer = reducer(4).with_spawner(PanickingSpawner);

        let err = reducer
            .parallel_sum_owned(vec![1; 1000].into(), 0)
            .await
            .expect_err("workers panic");

        assert!(err.to_string().contains("workers panicked"), "{err}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn owned_input_on_multi_thread_runtime() -> anyhow::Result<()> {
        let input: Arc<[i32]> = seeded_input(3, 10_000, 5).into();
        let expected = sequential_sum(&input, 0);

        let (reducer_a, reducer_b) = (reducer(3), reducer(3));
        let (first, second) = tokio::join!(
            reducer_a.parallel_sum_owned(input.clone(), 0),
            reducer_b.parallel_sum_owned(input, 0),
        );
        assert_eq!(first?, expected);
        assert_eq!(second?, expected);

        Ok(())
    }
}
