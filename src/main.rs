//! Orchestrator binary: configures the simulation, wires feed, channel,
//! workers, and heap, and prints the final report.

use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;

use heapsim::channel::WorkQueue;
use heapsim::feed::{FeedConfig, RequestFeed, DEFAULT_SEED};
use heapsim::heap::{HeapConfig, SimHeap, Strategy};
use heapsim::request::Job;
use heapsim::worker::spawn_workers;

/// Simulated dynamic-memory manager: fit strategies, FIFO eviction,
/// compaction, sequential or producer/consumer execution.
#[derive(Parser, Debug)]
#[command(name = "heapsim")]
#[command(about = "Dynamic-memory heap simulator")]
struct SimArgs {
    /// Heap capacity in KB (256 four-byte blocks per KB)
    #[arg(long, default_value_t = 1)]
    capacity_kb: u32,

    /// Minimum request size in bytes (inclusive)
    #[arg(long, default_value_t = 16)]
    min_size: u32,

    /// Maximum request size in bytes (inclusive)
    #[arg(long, default_value_t = 1024)]
    max_size: u32,

    /// Total number of requests to generate
    #[arg(long, default_value_t = 100)]
    requests: u32,

    /// Fit strategy: first-fit, best-fit, or worst-fit
    #[arg(long, default_value = "first-fit")]
    strategy: Strategy,

    /// Worker threads; 0 runs the sequential single-thread mode
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Bound on the work queue (absent = unbounded)
    #[arg(long)]
    queue_bound: Option<usize>,

    /// Run integrity checks around every eviction+compaction sequence
    #[arg(long)]
    verify: bool,

    /// Dump the block array to stderr before and after each reclamation
    #[arg(long)]
    trace_reclaim: bool,

    /// RNG seed for the request feed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final block array after the run
    #[arg(long)]
    dump_final: bool,
}

fn main() {
    let args = SimArgs::parse();

    let heap = match SimHeap::new(HeapConfig {
        capacity_kb: args.capacity_kb,
        strategy: args.strategy,
        verify: args.verify,
        trace_reclaim: args.trace_reclaim,
    }) {
        Ok(heap) => Arc::new(heap),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let feed = match RequestFeed::new(FeedConfig {
        total: args.requests,
        min_size: args.min_size,
        max_size: args.max_size,
        seed: args.seed.unwrap_or(DEFAULT_SEED),
    }) {
        Ok(feed) => feed,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let elapsed = if args.threads == 0 {
        run_sequential(&feed, &heap)
    } else {
        run_parallel(&feed, &heap, args.threads, args.queue_bound)
    };

    println!("{}", heap.report(elapsed));

    if args.dump_final {
        println!("{}", heap.dump_state("FINAL HEAP STATE"));
    }
}

/// Materialize every request up front and allocate them one by one.
fn run_sequential(feed: &RequestFeed, heap: &SimHeap) -> std::time::Duration {
    let requests = feed.materialize();
    let start = Instant::now();
    for req in requests {
        let _ = heap.allocate(req);
    }
    start.elapsed()
}

/// Producer/consumer mode: one generator thread, `threads` workers, one
/// shutdown marker per worker once the generator is done.
fn run_parallel(
    feed: &RequestFeed,
    heap: &Arc<SimHeap>,
    threads: usize,
    queue_bound: Option<usize>,
) -> std::time::Duration {
    let queue = Arc::new(match queue_bound {
        Some(bound) => WorkQueue::bounded(bound),
        None => WorkQueue::unbounded(),
    });

    let start = Instant::now();

    let generator = {
        let queue = Arc::clone(&queue);
        let feed = feed.clone();
        thread::spawn(move || feed.run(&queue))
    };

    let workers = spawn_workers(threads, &queue, heap);

    // Sentinels go in only after the generator has enqueued all real work.
    if generator.join().expect("generator panicked").is_ok() {
        for _ in 0..threads {
            let _ = queue.send(Job::Shutdown);
        }
    } else {
        // Queue died under the generator; make sure the workers see it too.
        queue.disconnect();
    }

    for handle in workers {
        let _ = handle.join();
    }

    start.elapsed()
}
