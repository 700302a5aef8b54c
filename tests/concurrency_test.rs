//! Concurrency tests: parallel writers never interleave identifier batches.

use embeddb::{
    AccessCoordinator, DistanceMetric, IndexKind, MemoryStore, NewEmbedding, Vector,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 8;
const BATCHES_PER_WRITER: usize = 20;
const BATCH_SIZE: usize = 5;

#[test]
fn test_parallel_batches_get_unique_contiguous_ids() {
    let coord = Arc::new(AccessCoordinator::new(
        MemoryStore::new(),
        IndexKind::Flat,
        DistanceMetric::L2,
    ));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let coord = Arc::clone(&coord);
            thread::spawn(move || {
                let mut batches = Vec::new();
                for b in 0..BATCHES_PER_WRITER {
                    let items = (0..BATCH_SIZE)
                        .map(|i| {
                            NewEmbedding::new(
                                Vector::new(vec![w as f32, b as f32]),
                                format!("uri-{}-{}-{}", w, b, i),
                            )
                        })
                        .collect();
                    batches.push(coord.add("default", items).unwrap());
                }
                batches
            })
        })
        .collect();

    let mut all_ids = HashSet::new();
    for handle in handles {
        for batch in handle.join().unwrap() {
            assert_eq!(batch.len(), BATCH_SIZE);
            // Identifiers within one batch are consecutive
            for pair in batch.windows(2) {
                assert_eq!(pair[1].value(), pair[0].value() + 1);
            }
            for id in batch {
                assert!(all_ids.insert(id), "duplicate identifier {}", id);
            }
        }
    }

    let expected = WRITERS * BATCHES_PER_WRITER * BATCH_SIZE;
    assert_eq!(all_ids.len(), expected);
    assert_eq!(coord.count(None).unwrap(), expected);
}

#[test]
fn test_readers_see_whole_batches() {
    let coord = Arc::new(AccessCoordinator::new(
        MemoryStore::new(),
        IndexKind::Flat,
        DistanceMetric::L2,
    ));

    let writer = {
        let coord = Arc::clone(&coord);
        thread::spawn(move || {
            for b in 0..50 {
                let items = (0..4)
                    .map(|i| {
                        NewEmbedding::new(
                            Vector::new(vec![b as f32, i as f32]),
                            format!("uri-{}-{}", b, i),
                        )
                    })
                    .collect();
                coord.add("default", items).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let coord = Arc::clone(&coord);
            thread::spawn(move || {
                for _ in 0..100 {
                    // Batches land atomically, so the count moves in steps of 4
                    let count = coord.count(Some("default")).unwrap();
                    assert_eq!(count % 4, 0, "observed a partially applied batch");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(coord.count(None).unwrap(), 200);
}
