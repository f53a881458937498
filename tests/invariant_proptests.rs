use proptest::prelude::*;
use softcache::{DefaultCachingPolicy, OneToManyIndex, OneToOneIndex, SoftCache};
use std::collections::BTreeMap;

const ATTRIBUTES: u32 = 7;

#[derive(Debug, Clone)]
enum Op {
    Put(u32, Option<u32>),
    Get(u32),
    Remove(u32),
    Contains(u32),
    ReclaimKey(u32),
    ReclaimOldest(usize),
    ReclaimRandom(usize),
    PutAll(Vec<(u32, Option<u32>)>),
    Clear,
    // Cursor passes over keys congruent to the residue mod CURSOR_MODULUS
    CursorRemove(u32),
    CursorSet(u32, Option<u32>),
}

const CURSOR_MODULUS: u32 = 5;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..30, prop::option::weighted(0.85, 0u32..1000)).prop_map(|(k, v)| Op::Put(k, v)),
        3 => (0u32..30).prop_map(Op::Get),
        2 => (0u32..30).prop_map(Op::Remove),
        1 => (0u32..30).prop_map(Op::Contains),
        1 => (0u32..30).prop_map(Op::ReclaimKey),
        1 => (0usize..4).prop_map(Op::ReclaimOldest),
        1 => (0usize..4).prop_map(Op::ReclaimRandom),
        1 => prop::collection::vec(
            (0u32..30, prop::option::weighted(0.85, 0u32..1000)),
            0..6
        )
        .prop_map(Op::PutAll),
        1 => Just(Op::Clear),
        1 => (0u32..CURSOR_MODULUS).prop_map(Op::CursorRemove),
        1 => (0u32..CURSOR_MODULUS, prop::option::weighted(0.85, 0u32..1000))
            .prop_map(|(r, v)| Op::CursorSet(r, v)),
    ]
}

fn policy_strategy() -> impl Strategy<Value = DefaultCachingPolicy> {
    (0.0f64..=1.0, 0usize..4, 0usize..4, 0usize..8).prop_map(
        |(softness, min_reclaimable, min_strong, extra)| {
            DefaultCachingPolicy::new(softness, min_reclaimable, min_strong, min_strong + extra)
                .unwrap()
        },
    )
}

fn apply(cache: &mut SoftCache<u32, u32>, op: &Op) {
    let reclaimer = cache.reclaimer();
    match *op {
        Op::PutAll(ref entries) => {
            cache.put_all(entries.iter().copied());
        }
        Op::Clear => cache.clear(),
        Op::CursorRemove(residue) => {
            let mut keys = cache.keys();
            while let Some(k) = keys.next() {
                if k % CURSOR_MODULUS == residue {
                    keys.remove().unwrap();
                }
            }
        }
        Op::CursorSet(residue, v) => {
            let mut entries = cache.entries();
            while let Some((k, _)) = entries.next() {
                if k % CURSOR_MODULUS == residue {
                    entries.set_value(v).unwrap();
                }
            }
        }
        Op::Put(k, v) => {
            cache.put(k, v);
        }
        Op::Get(k) => {
            cache.get(&k);
        }
        Op::Remove(k) => {
            cache.remove(&k);
        }
        Op::Contains(k) => {
            cache.contains_key(&k);
        }
        Op::ReclaimKey(k) => {
            reclaimer.reclaim_key(&k);
        }
        Op::ReclaimOldest(n) => {
            reclaimer.reclaim_oldest(n);
        }
        Op::ReclaimRandom(n) => {
            reclaimer.reclaim_random(n);
        }
    }
}

/// Live contents as seen through a cursor
fn snapshot(cache: &mut SoftCache<u32, u32>) -> BTreeMap<u32, Option<u32>> {
    cache
        .entries()
        .map(|(k, v)| (k, v.map(|v| *v)))
        .collect()
}

proptest! {
    #[test]
    fn prop_bookkeeping_matches_contents(
        policy in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..120)
    ) {
        let mut cache: SoftCache<u32, u32> = SoftCache::with_policy(policy);
        for op in &ops {
            apply(&mut cache, op);

            let contents = snapshot(&mut cache);
            let non_null = contents.values().filter(|v| v.is_some()).count();
            prop_assert_eq!(cache.len(), contents.len());
            prop_assert_eq!(cache.strong_count() + cache.reclaimable_count(), non_null);
            prop_assert!(cache.check_invariants().is_ok(), "{:?}", cache.check_invariants());
        }
    }

    #[test]
    fn prop_reclamation_only_removes(
        policy in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..120)
    ) {
        let mut cache: SoftCache<u32, u32> = SoftCache::with_policy(policy);
        let mut model: BTreeMap<u32, Option<u32>> = BTreeMap::new();
        for op in &ops {
            apply(&mut cache, op);
            match *op {
                Op::Put(k, v) => {
                    model.insert(k, v);
                }
                Op::Remove(k) => {
                    model.remove(&k);
                }
                Op::PutAll(ref entries) => model.extend(entries.iter().copied()),
                Op::Clear => model.clear(),
                Op::CursorRemove(residue) => model.retain(|k, _| k % CURSOR_MODULUS != residue),
                Op::CursorSet(residue, v) => {
                    for (k, value) in model.iter_mut() {
                        if k % CURSOR_MODULUS == residue {
                            *value = v;
                        }
                    }
                }
                _ => {}
            }

            let contents = snapshot(&mut cache);
            for (k, v) in &contents {
                prop_assert_eq!(model.get(k), Some(v));
            }
            // Nulls are never reclaimed
            for (k, v) in &model {
                if v.is_none() {
                    prop_assert!(contents.contains_key(k));
                }
            }
            model = contents;
        }
    }

    #[test]
    fn prop_indices_match_contents(
        policy in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..120)
    ) {
        let mut cache: SoftCache<u32, u32> = SoftCache::with_policy(policy);
        let by_attribute = OneToManyIndex::new(|v: &u32| v % ATTRIBUTES);
        let by_value = OneToOneIndex::new(|v: &u32| *v);
        cache.add_index(&by_attribute);
        cache.add_index(&by_value);

        for op in &ops {
            apply(&mut cache, op);
            if let Op::Clear = op {
                // Indices are the caller's to clear
                by_attribute.clear();
                by_value.clear();
            }
            let contents = snapshot(&mut cache);

            for attribute in 0..ATTRIBUTES {
                let mut indexed = by_attribute.keys(&attribute);
                indexed.sort_unstable();
                let expected: Vec<u32> = contents
                    .iter()
                    .filter(|(_, v)| v.map_or(false, |v| v % ATTRIBUTES == attribute))
                    .map(|(k, _)| *k)
                    .collect();
                prop_assert_eq!(indexed, expected);
            }

            // Duplicate values may lose their record (last write wins), but
            // every record that exists leads to a live key holding the value
            let mut distinct: Vec<u32> = contents.values().flatten().copied().collect();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert!(by_value.len() <= distinct.len());
            for v in &distinct {
                if let Some(holder) = by_value.key(v) {
                    prop_assert_eq!(contents.get(&holder), Some(&Some(*v)));
                }
            }
        }
    }

    #[test]
    fn prop_remove_then_add_index_keeps_content(
        entries in prop::collection::vec((0u32..40, 0u32..1000), 0..60)
    ) {
        let mut cache: SoftCache<u32, u32> = SoftCache::new();
        let by_attribute = OneToManyIndex::new(|v: &u32| v % ATTRIBUTES);
        let by_value = OneToOneIndex::new(|v: &u32| *v);
        cache.add_index(&by_attribute);
        cache.add_index(&by_value);
        // Values are unique per key so every one-to-one record survives
        for (k, v) in entries {
            cache.insert(k, k * 1000 + v);
        }

        let groups_before: Vec<Vec<u32>> = (0..ATTRIBUTES).map(|a| by_attribute.keys(&a)).collect();
        let values: Vec<u32> = snapshot(&mut cache).values().flatten().copied().collect();
        let holders_before: Vec<Option<u32>> = values.iter().map(|v| by_value.key(v)).collect();

        prop_assert!(cache.remove_index(&by_attribute));
        prop_assert!(cache.remove_index(&by_value));
        prop_assert!(cache.add_index(&by_attribute));
        prop_assert!(cache.add_index(&by_value));

        let groups_after: Vec<Vec<u32>> = (0..ATTRIBUTES).map(|a| by_attribute.keys(&a)).collect();
        let holders_after: Vec<Option<u32>> = values.iter().map(|v| by_value.key(v)).collect();
        prop_assert_eq!(groups_before, groups_after);
        prop_assert_eq!(holders_before, holders_after);
        prop_assert_eq!(by_value.len(), values.len());
    }

    #[test]
    fn prop_cleared_index_rebuilds_same_groups(
        entries in prop::collection::vec((0u32..40, 0u32..1000), 0..60)
    ) {
        let mut cache: SoftCache<u32, u32> = SoftCache::new();
        let index = OneToManyIndex::new(|v: &u32| v % ATTRIBUTES);
        cache.add_index(&index);
        for (k, v) in entries {
            cache.insert(k, v);
        }

        // Back-fill follows map order, so only membership is preserved
        let sorted_groups = |index: &OneToManyIndex<u32, u32, u32>| -> Vec<Vec<u32>> {
            (0..ATTRIBUTES)
                .map(|a| {
                    let mut keys = index.keys(&a);
                    keys.sort_unstable();
                    keys
                })
                .collect()
        };
        let before = sorted_groups(&index);

        prop_assert!(cache.remove_index(&index));
        index.clear();
        prop_assert!(cache.add_index(&index));

        prop_assert_eq!(before, sorted_groups(&index));
    }
}
