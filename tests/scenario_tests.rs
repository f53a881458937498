use softcache::{DefaultCachingPolicy, OneToManyIndex, Retention, SoftCache};

/// Policy under which every new cell starts reclaimable
fn always_reclaimable() -> DefaultCachingPolicy {
    DefaultCachingPolicy::new(0.0, 0, 0, 0).unwrap()
}

/// Policy under which every new cell starts strong
fn always_strong() -> DefaultCachingPolicy {
    DefaultCachingPolicy::new(0.0, 0, 0, usize::MAX).unwrap()
}

/// Reading a reclaimable cell promotes it; with no strong cell around there
/// is nothing to demote
#[test]
fn test_get_promotes_without_counterbalance() {
    let mut cache: SoftCache<&str, i32> = SoftCache::with_policy(always_reclaimable());
    cache.insert("a", 1);
    cache.insert("b", 2);
    assert_eq!(cache.strong_count(), 0);
    assert_eq!(cache.reclaimable_count(), 2);

    assert_eq!(cache.get(&"a").as_deref(), Some(&1));

    assert_eq!(cache.retention(&"a"), Ok(Some(Retention::Strong)));
    assert_eq!(cache.retention(&"b"), Ok(Some(Retention::Reclaimable)));
    assert_eq!(cache.strong_count(), 1);
    assert_eq!(cache.reclaimable_count(), 1);
    cache.check_invariants().unwrap();
}

/// A stored null is present but has no value
#[test]
fn test_stored_null_versus_reclaimed_value() {
    let mut cache: SoftCache<&str, i32> = SoftCache::with_policy(always_reclaimable());
    cache.put("x", None);
    cache.insert("y", 1);

    assert!(cache.contains_key(&"x"));
    assert_eq!(cache.get(&"x"), None);

    cache.reclaimer().reclaim_all();

    // The null survives reclamation, the value does not
    assert!(cache.contains_key(&"x"));
    assert_eq!(cache.get(&"y"), None);
    assert!(!cache.contains_key(&"y"));
}

/// One-to-many groups follow insertion order and shrink on removal
#[test]
fn test_one_to_many_index_by_category() {
    #[derive(Debug)]
    struct Product {
        category: &'static str,
    }

    let mut cache: SoftCache<&str, Product> = SoftCache::new();
    let by_category = OneToManyIndex::new(|p: &Product| p.category);
    cache.add_index(&by_category);

    cache.insert("p1", Product { category: "A" });
    cache.insert("p2", Product { category: "A" });
    cache.insert("p3", Product { category: "B" });

    assert_eq!(by_category.keys(&"A"), vec!["p1", "p2"]);
    assert_eq!(by_category.get(&mut cache, &"A").len(), 2);

    cache.remove(&"p1");
    assert_eq!(by_category.keys(&"A"), vec!["p2"]);
    assert_eq!(by_category.get(&mut cache, &"A").len(), 1);
    assert_eq!(by_category.keys(&"B"), vec!["p3"]);
}

/// An entry reclaimed while a cursor is open is skipped, not reported
#[test]
fn test_cursor_skips_entry_reclaimed_mid_iteration() {
    let mut cache: SoftCache<u32, String> = SoftCache::with_policy(always_reclaimable());
    for i in 0..5 {
        cache.insert(i, format!("v{i}"));
    }
    let reclaimer = cache.reclaimer();

    let mut seen = Vec::new();
    {
        let mut entries = cache.entries();
        let (first, value) = entries.next().unwrap();
        assert!(value.is_some());
        seen.push(first);

        let victim = (0..5).find(|k| *k != first).unwrap();
        assert!(reclaimer.reclaim_key(&victim));

        for (key, value) in entries {
            assert_ne!(key, victim);
            assert!(value.is_some());
            seen.push(key);
        }
    }

    assert_eq!(seen.len(), 4);
    assert_eq!(cache.len(), 4);
    cache.check_invariants().unwrap();
}

/// put followed by get returns the value when retention is forced strong
#[test]
fn test_round_trip_with_strong_retention() {
    let mut cache: SoftCache<u32, Vec<u32>> = SoftCache::with_policy(always_strong());
    for i in 0..100 {
        cache.insert(i, vec![i; 3]);
        cache.reclaimer().reclaim_all();
        assert_eq!(cache.get(&i).as_deref(), Some(&vec![i; 3]));
    }
    assert_eq!(cache.reclaimable_count(), 0);
    assert_eq!(cache.len(), 100);
}

/// min_strong fills first, max_strong caps the strong population
#[test]
fn test_strong_bounds_shape_creation() {
    let policy = DefaultCachingPolicy::new(0.0, 0, 2, 3).unwrap();
    let mut cache: SoftCache<u32, u32> = SoftCache::with_policy(policy);
    for i in 0..6 {
        cache.insert(i, i);
    }
    assert_eq!(cache.strong_count(), 3);
    assert_eq!(cache.reclaimable_count(), 3);

    // Strong cells survive. Disposing the first reclaimed cell leaves the
    // strong population at max_strong, so one strong cell is demoted as its
    // counterbalance; after that the strong minimum holds.
    cache.reclaimer().reclaim_all();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.strong_count(), 2);
    assert_eq!(cache.reclaimable_count(), 1);
    assert_eq!(cache.retention(&2), Ok(Some(Retention::Reclaimable)));
    cache.check_invariants().unwrap();
}

/// Softness steers the proportion of reclaimable cells
#[test]
fn test_softness_is_approximated() {
    let policy = DefaultCachingPolicy::new(0.5, 0, 0, usize::MAX).unwrap();
    let mut cache: SoftCache<u32, u32> = SoftCache::with_policy(policy);
    for i in 0..100 {
        cache.insert(i, i);
    }
    assert_eq!(cache.strong_count(), 50);
    assert_eq!(cache.reclaimable_count(), 50);

    for i in (0..100).step_by(3) {
        cache.remove(&i);
    }
    let counts = cache.counts();
    let ratio = counts.reclaimable as f64 / counts.total() as f64;
    assert!((ratio - 0.5).abs() < 0.05, "ratio drifted to {ratio}");
    cache.check_invariants().unwrap();
}

/// Invalid parameters are rejected at construction
#[test]
fn test_invalid_policy_parameters() {
    assert!(DefaultCachingPolicy::new(1.01, 0, 0, 1).is_err());
    assert!(DefaultCachingPolicy::new(-0.5, 0, 0, 1).is_err());
    assert!(DefaultCachingPolicy::new(0.5, 0, 10, 9).is_err());
}
