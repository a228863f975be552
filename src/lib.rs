//! heapsim: discrete-event simulation of a dynamically managed heap.
//!
//! The core is [`heap::SimHeap`]: a fixed array of 4-byte blocks exercised by
//! three contiguous-fit strategies, oldest-first eviction, and in-place
//! compaction, fully serialized behind one lock. Around it sit the request
//! feed, the blocking work channel, and the allocator workers that drive the
//! heap from one or many threads.

pub mod audit;
pub mod channel;
pub mod feed;
pub mod heap;
pub mod report;
pub mod request;
pub mod worker;
