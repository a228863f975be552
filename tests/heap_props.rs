//! Property tests driving the public allocation surface with randomized
//! request streams.

use heapsim::heap::{HeapConfig, SimHeap, Strategy};
use heapsim::request::Request;
use proptest::prelude::*;

fn strategy() -> impl proptest::strategy::Strategy<Value = Strategy> {
    prop_oneof![
        Just(Strategy::FirstFit),
        Just(Strategy::BestFit),
        Just(Strategy::WorstFit),
    ]
}

proptest! {
    /// For every reachable state, each ledger entry owns exactly its
    /// blocks_needed blocks, and verification never fires.
    #[test]
    fn ledger_matches_block_array_for_any_stream(
        strategy in strategy(),
        sizes in prop::collection::vec(1u32..2048, 1..120),
    ) {
        let heap = SimHeap::new(HeapConfig {
            capacity_kb: 1,
            strategy,
            verify: true,
            trace_reclaim: false,
        }).unwrap();

        for (i, &size) in sizes.iter().enumerate() {
            let _ = heap.allocate(Request::new(i as u32 + 1, size));
            prop_assert!(heap.ledger_consistent());
        }

        let stats = heap.stats();
        prop_assert_eq!(stats.integrity_faults, 0);
        prop_assert!(stats.admitted <= sizes.len() as u64);

        // Free blocks are exactly those owned by no ledger entry.
        let blocks = heap.blocks_snapshot();
        let occupied = blocks.iter().filter(|&&tag| tag != 0).count();
        prop_assert!(occupied <= blocks.len());
    }

    /// Aggregates are reproducible: the same stream replayed on a fresh heap
    /// lands on identical counters and an identical block array.
    #[test]
    fn replay_is_deterministic(
        strategy in strategy(),
        sizes in prop::collection::vec(1u32..1024, 1..60),
    ) {
        let run = || {
            let heap = SimHeap::new(HeapConfig {
                capacity_kb: 1,
                strategy,
                verify: false,
                trace_reclaim: false,
            }).unwrap();
            for (i, &size) in sizes.iter().enumerate() {
                let _ = heap.allocate(Request::new(i as u32 + 1, size));
            }
            (heap.stats(), heap.blocks_snapshot())
        };
        prop_assert_eq!(run(), run());
    }
}
