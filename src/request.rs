//! Memory request value types.
//!
//! A [`Request`] is the unit of work fed to the simulated heap: an immutable
//! record of who is asking (`id`), how many bytes they want (`size_bytes`),
//! and how many 4-byte blocks that rounds up to (`blocks_needed`).
//!
//! Work travels between the generator and the allocator workers as a [`Job`]:
//! either a real request or a `Shutdown` marker. One `Shutdown` is enqueued
//! per worker after the generator finishes; a worker terminates on receipt
//! without touching the heap.

use crate::heap::BLOCK_BYTES;

/// An immutable memory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Unique per run, assigned by the feed starting at 1. Doubles as the
    /// block tag in the heap array (0 is reserved for "free").
    pub id: u32,
    /// Requested size in bytes. Size 0 is not modeled.
    pub size_bytes: u32,
    /// Number of contiguous blocks required: ceil(size_bytes / 4).
    pub blocks_needed: usize,
}

impl Request {
    /// Build a request, deriving the block count from the byte size.
    pub fn new(id: u32, size_bytes: u32) -> Self {
        debug_assert!(id != 0, "id 0 is the free-block tag");
        debug_assert!(size_bytes > 0, "zero-sized requests are not modeled");
        Self {
            id,
            size_bytes,
            blocks_needed: size_bytes.div_ceil(BLOCK_BYTES) as usize,
        }
    }
}

/// A unit of work on the channel between generator and workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// A real allocation request.
    Alloc(Request),
    /// Terminal marker: the receiving worker must exit its loop.
    Shutdown,
}

impl Job {
    /// Human-readable tag (for diagnostics).
    pub fn description(&self) -> &'static str {
        match self {
            Job::Alloc(_) => "Alloc",
            Job::Shutdown => "Shutdown",
        }
    }
}
