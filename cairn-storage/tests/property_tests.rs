//! Cascade invariants under arbitrary operation sequences.

use std::collections::HashSet;
use std::sync::Arc;

use cairn_core::{CascadeConfig, FunctionKey, FunctionRecord};
use cairn_storage::{InMemoryBackingStore, LookupCoordinator};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Get(u8),
    Preload(u8),
    Invalidate(u8),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..32).prop_map(Op::Add),
        6 => (0u8..48).prop_map(Op::Get),
        2 => (0u8..48).prop_map(Op::Preload),
        1 => (0u8..48).prop_map(Op::Invalidate),
        1 => Just(Op::Clear),
    ]
}

fn key(i: u8) -> FunctionKey {
    FunctionKey::new(format!("fn_{}", i)).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every added key stays findable, whatever happens in between.
    #[test]
    fn prop_no_false_negatives_after_add(ops in prop::collection::vec(arb_op(), 1..80)) {
        let rt = runtime();
        let store = Arc::new(InMemoryBackingStore::new());
        let config = CascadeConfig::new().with_hot_capacity(4).with_filter(256, 0.05);
        let cache = LookupCoordinator::new(Arc::clone(&store), config).unwrap();
        let mut added = HashSet::new();

        rt.block_on(async {
            for op in &ops {
                match *op {
                    Op::Add(i) => {
                        let k = key(i);
                        cache.add(&k, FunctionRecord::new(k.clone(), "body")).await.unwrap();
                        added.insert(i);
                    }
                    Op::Get(i) => {
                        let found = cache.get(&key(i)).await.unwrap().is_found();
                        assert_eq!(found, added.contains(&i), "key fn_{}", i);
                    }
                    Op::Preload(i) => {
                        cache.preload([key(i).as_str()]);
                    }
                    Op::Invalidate(i) => cache.invalidate(&key(i)),
                    Op::Clear => cache.clear(),
                }
                assert!(cache.existence_is_consistent());
            }

            for &i in &added {
                assert!(cache.might_contain(&key(i)));
                assert!(cache.get(&key(i)).await.unwrap().is_found());
            }
        });
    }

    /// Once a key is confirmed absent, repeat lookups never reach the store.
    #[test]
    fn prop_negative_cached_keys_skip_store(keys in prop::collection::hash_set(0u8..64, 1..20)) {
        let rt = runtime();
        let store = Arc::new(InMemoryBackingStore::new());
        let cache = LookupCoordinator::with_defaults(Arc::clone(&store));
        let names: Vec<String> = keys.iter().map(|i| format!("fn_{}", i)).collect();
        cache.preload(names.iter());

        rt.block_on(async {
            for &i in &keys {
                assert!(cache.get(&key(i)).await.unwrap().is_not_found());
            }
            let after_first_pass = store.fetch_count();
            for &i in &keys {
                assert!(cache.get(&key(i)).await.unwrap().is_not_found());
            }
            assert_eq!(store.fetch_count(), after_first_pass);
        });
    }
}
