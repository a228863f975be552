//! Allocator workers: glue between the work queue and the heap.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::channel::WorkQueue;
use crate::heap::SimHeap;
use crate::request::Job;

/// Worker loop: drain jobs into the heap until a shutdown marker arrives.
///
/// A `Shutdown` job terminates the loop unconditionally and is never handed
/// to the heap. A disconnected queue ends the loop the same way, so an
/// abandoned run unwinds instead of hanging.
pub fn run_worker(queue: &WorkQueue, heap: &SimHeap) {
    loop {
        match queue.recv() {
            Ok(Job::Alloc(req)) => {
                // A rejected request is a normal outcome; the drop is final.
                let _ = heap.allocate(req);
            }
            Ok(Job::Shutdown) | Err(_) => break,
        }
    }
}

/// Spawn `count` workers sharing one queue and one heap.
pub fn spawn_workers(
    count: usize,
    queue: &Arc<WorkQueue>,
    heap: &Arc<SimHeap>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let queue = Arc::clone(queue);
            let heap = Arc::clone(heap);
            thread::spawn(move || run_worker(&queue, &heap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{HeapConfig, Strategy};
    use crate::request::Request;

    fn test_heap() -> Arc<SimHeap> {
        Arc::new(
            SimHeap::new(HeapConfig {
                capacity_kb: 4,
                strategy: Strategy::FirstFit,
                verify: false,
                trace_reclaim: false,
            })
            .unwrap(),
        )
    }

    #[test]
    fn worker_allocates_then_stops_on_shutdown() {
        let queue = Arc::new(WorkQueue::unbounded());
        let heap = test_heap();
        queue.send(Job::Alloc(Request::new(1, 64))).unwrap();
        queue.send(Job::Alloc(Request::new(2, 64))).unwrap();
        queue.send(Job::Shutdown).unwrap();
        let handles = spawn_workers(1, &queue, &heap);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(heap.stats().admitted, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn worker_exits_on_disconnect() {
        let queue = Arc::new(WorkQueue::unbounded());
        let heap = test_heap();
        let handles = spawn_workers(2, &queue, &heap);
        queue.disconnect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(heap.stats().admitted, 0);
    }
}
