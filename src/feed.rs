//! Request feed: bounded stream of uniformly random memory requests.
//!
//! Sizes are drawn from `[min_size, max_size]` with a seedable RNG so a run
//! can be replayed exactly. The feed either materializes the whole sequence
//! up front (sequential mode) or pushes it through a [`WorkQueue`] from a
//! producer thread (parallel mode).

use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::fmt;

use crate::channel::{Disconnected, WorkQueue};
use crate::request::{Job, Request};

/// Default RNG seed for reproducible runs.
pub const DEFAULT_SEED: u64 = 0xA110C;

/// Feed parameters.
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Total number of requests to emit.
    pub total: u32,
    /// Minimum request size in bytes, inclusive.
    pub min_size: u32,
    /// Maximum request size in bytes, inclusive.
    pub max_size: u32,
    /// RNG seed.
    pub seed: u64,
}

/// Errors validating feed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// min_size must be at least 1 (size 0 is not modeled).
    ZeroMinSize,
    /// min_size exceeds max_size.
    EmptySizeRange,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::ZeroMinSize => write!(f, "minimum request size must be at least 1 byte"),
            FeedError::EmptySizeRange => write!(f, "minimum request size exceeds maximum"),
        }
    }
}

impl std::error::Error for FeedError {}

/// Produces the run's request sequence. Ids are assigned 1..=total.
#[derive(Debug, Clone)]
pub struct RequestFeed {
    cfg: FeedConfig,
}

impl RequestFeed {
    /// Validate parameters and build a feed.
    pub fn new(cfg: FeedConfig) -> Result<Self, FeedError> {
        if cfg.min_size == 0 {
            return Err(FeedError::ZeroMinSize);
        }
        if cfg.min_size > cfg.max_size {
            return Err(FeedError::EmptySizeRange);
        }
        Ok(Self { cfg })
    }

    /// Materialize the full sequence at once (sequential mode).
    pub fn materialize(&self) -> Vec<Request> {
        let mut rng = SmallRng::seed_from_u64(self.cfg.seed);
        (1..=self.cfg.total)
            .map(|id| Request::new(id, rng.random_range(self.cfg.min_size..=self.cfg.max_size)))
            .collect()
    }

    /// Producer-thread body: emit every request into `queue` in id order.
    ///
    /// Stops early with `Err` if the queue is disconnected underneath us;
    /// that is a cooperative shutdown, not a failure of the feed.
    pub fn run(&self, queue: &WorkQueue) -> Result<(), Disconnected> {
        let mut rng = SmallRng::seed_from_u64(self.cfg.seed);
        for id in 1..=self.cfg.total {
            let size = rng.random_range(self.cfg.min_size..=self.cfg.max_size);
            queue.send(Job::Alloc(Request::new(id, size)))?;
        }
        Ok(())
    }
}
