//! Property-based tests for vector stores.
//!
//! Uses proptest to verify invariants that must hold for arbitrary inputs:
//! - Cosine stores hold unit-length (or all-zero) vectors
//! - Re-adding a vector is idempotent
//! - Search results are ranked and bounded
//! - Size accounting survives arbitrary add/remove sequences
//! - Flat and fallback backends agree

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use vecstore::{BackendKind, Metric, SearchOptions, StoreConfig, VectorStore};

const DIM: usize = 6;

fn vector_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, DIM)
}

fn metric_strategy() -> impl Strategy<Value = Metric> {
    prop_oneof![
        Just(Metric::Cosine),
        Just(Metric::Euclidean),
        Just(Metric::InnerProduct),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Add(u8, Vec<f32>),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..16, vector_strategy()).prop_map(|(id, v)| Op::Add(id, v)),
        1 => (0u8..16).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_cosine_vectors_are_normalized(vector in vector_strategy()) {
        let mut store = VectorStore::new("norms", StoreConfig::new(DIM)).expect("create failed");
        store.add("v", &vector, None, true).expect("add failed");

        let stored = store.get("v").expect("get failed");
        let norm = stored.iter().map(|x| x * x).sum::<f32>().sqrt();
        let input_norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if input_norm > 0.0 {
            prop_assert!((norm - 1.0).abs() < 1e-4, "norm was {}", norm);
        } else {
            prop_assert!(stored.iter().all(|x| *x == 0.0));
        }
    }

    #[test]
    fn prop_readd_is_idempotent(vector in vector_strategy(), metric in metric_strategy()) {
        let mut store = VectorStore::new("idem", StoreConfig::new(DIM).with_metric(metric))
            .expect("create failed");
        store.add("v", &vector, None, true).expect("add failed");
        let first = store.get("v").expect("get failed");

        store.add("v", &vector, None, true).expect("add failed");
        let second = store.get("v").expect("get failed");

        prop_assert_eq!(store.len(), 1);
        for (a, b) in first.iter().zip(&second) {
            prop_assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn prop_search_is_ranked_and_bounded(
        vectors in prop::collection::vec(vector_strategy(), 1..30),
        query in vector_strategy(),
        top_k in 0usize..12,
        metric in metric_strategy(),
    ) {
        let mut store = VectorStore::new("ranked", StoreConfig::new(DIM).with_metric(metric))
            .expect("create failed");
        for (i, v) in vectors.iter().enumerate() {
            store.add(&format!("v{i}"), v, None, true).expect("add failed");
        }

        let threshold = f32::NEG_INFINITY;
        let hits = store
            .search(&query, &SearchOptions::new().with_top_k(top_k).with_threshold(threshold))
            .expect("search failed");

        prop_assert_eq!(hits.len(), top_k.min(vectors.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        let unique: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        prop_assert_eq!(unique.len(), hits.len());
    }

    #[test]
    fn prop_size_accounting(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut store = VectorStore::new("ops", StoreConfig::new(DIM)).expect("create failed");
        let mut live = HashSet::new();

        for op in &ops {
            match op {
                Op::Add(id, v) => {
                    store.add(&format!("id-{id}"), v, None, true).expect("add failed");
                    live.insert(*id);
                },
                Op::Remove(id) => {
                    let removed = store.remove(&format!("id-{id}"));
                    prop_assert_eq!(removed, live.remove(id));
                },
            }
        }

        prop_assert_eq!(store.len(), live.len());
        prop_assert!(store.total_size() >= store.len());
        prop_assert_eq!(store.total_size() - store.len(), store.stats().deleted_count);

        store.rebuild().expect("rebuild failed");
        prop_assert_eq!(store.total_size(), live.len());
        for id in &live {
            let key = format!("id-{id}");
            prop_assert!(store.contains(&key));
        }
    }

    #[test]
    fn prop_fallback_agrees_with_flat(
        vectors in prop::collection::vec(vector_strategy(), 1..20),
        query in vector_strategy(),
        metric in metric_strategy(),
    ) {
        let config = StoreConfig::new(DIM).with_metric(metric);
        let mut flat = VectorStore::new("flat", config.clone()).expect("create failed");
        let mut fallback = VectorStore::new("fallback", config.with_backend(BackendKind::Fallback))
            .expect("create failed");
        for (i, v) in vectors.iter().enumerate() {
            flat.add(&format!("v{i}"), v, None, true).expect("add failed");
            fallback.add(&format!("v{i}"), v, None, true).expect("add failed");
        }

        let options = SearchOptions::new().with_top_k(5).with_threshold(f32::NEG_INFINITY);
        let a = flat.search(&query, &options).expect("search failed");
        let b = fallback.search(&query, &options).expect("search failed");

        prop_assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            prop_assert_eq!(&x.id, &y.id);
            prop_assert!((x.score - y.score).abs() < 1e-4);
        }
    }
}
