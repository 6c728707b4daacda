use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use clap::Parser;
use parsum::{
    random_input, sequential_sum, Parallelism, Reducer, ReducerConfig, DEFAULT_MIN_PER_WORKER,
};
use rand::Rng;
use rand_xoshiro::{rand_core::SeedableRng, Xoshiro256PlusPlus};

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
/// Sums a random vector in parallel and compares against a single-threaded fold.
struct Opts {
    /// Number of elements to generate.
    #[clap(short, long, default_value_t = 1_000_000)]
    len: usize,
    /// Initial accumulator value.
    #[clap(short, long, default_value_t = 0, allow_negative_numbers = true)]
    init: i32,
    /// Seed for the generator; drawn at random when absent.
    #[clap(short, long)]
    seed: Option<u64>,
    /// Elements are drawn from 0..max_value.
    #[clap(long, default_value_t = 5, value_parser = clap::value_parser!(i32).range(1..))]
    max_value: i32,
    /// Smallest block a worker is given.
    #[clap(long, default_value_t = DEFAULT_MIN_PER_WORKER)]
    min_per_worker: NonZeroUsize,
    /// Override the detected hardware parallelism (0 means unknown).
    #[clap(short, long)]
    threads: Option<usize>,
    /// Increase log verbosity, may be repeated.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let level = match opts.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let seed = opts.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let input: Arc<[i32]> = random_input(&mut rng, opts.len, opts.max_value).into();
    tracing::info!(seed, len = input.len(), "generated input");

    let reducer = Reducer::with_config(ReducerConfig {
        min_per_worker: opts.min_per_worker,
        parallelism: opts.threads.map_or(Parallelism::Detect, Parallelism::Fixed),
    });
    tracing::info!(plan = ?reducer.plan(input.len()), "planned reduction");

    println!("Parallel way...");
    let begin = Instant::now();
    let parallel = reducer.parallel_sum_owned(input.clone(), opts.init).await?;
    let parallel_elapsed = begin.elapsed();
    println!("Parallel sum = {parallel}");
    println!("time elapsed: {:.6}s", parallel_elapsed.as_secs_f64());

    println!("{}", "=".repeat(51));

    println!("Synchronous way...");
    let begin = Instant::now();
    let sequential = sequential_sum(&input, opts.init);
    let sequential_elapsed = begin.elapsed();
    println!("sum sync = {sequential}");
    println!("time elapsed: {:.6}s", sequential_elapsed.as_secs_f64());

    if parallel != sequential {
        anyhow::bail!("parallel sum {parallel} differs from sequential sum {sequential}");
    }

    Ok(())
}
