use crate::kernel::cache::{CacheStats, LruCache};
use crate::kernel::error::{Error, Result};

#[test]
fn test_evicts_least_recently_used() {
    let mut cache: LruCache<&str, u32> = LruCache::new(2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    // Touch "a" so "b" becomes the oldest
    assert_eq!(cache.get(&"a"), Some(1));
    cache.insert("c", 3);

    assert!(cache.contains(&"a"));
    assert!(!cache.contains(&"b"));
    assert!(cache.contains(&"c"));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_zero_capacity_raised_to_one() {
    let mut cache: LruCache<u8, u8> = LruCache::new(0);
    assert_eq!(cache.capacity(), 1);
    cache.insert(1, 1);
    cache.insert(2, 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&2));
}

#[test]
fn test_reinsert_does_not_evict() {
    let mut cache: LruCache<&str, u32> = LruCache::new(2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("a", 10);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&"a"), Some(10));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_hit_and_miss_counters() {
    let mut cache: LruCache<&str, u32> = LruCache::new(4);
    assert_eq!(cache.get(&"x"), None);
    cache.insert("x", 7);
    assert_eq!(cache.get(&"x"), Some(7));
    assert_eq!(cache.get(&"x"), Some(7));
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 2,
            misses: 1,
            evictions: 0
        }
    );
}

#[test]
fn test_get_or_try_insert_with() -> Result<()> {
    let mut cache: LruCache<String, u32> = LruCache::new(4);
    let mut builds = 0;
    for _ in 0..3 {
        let value = cache.get_or_try_insert_with("k".to_string(), || {
            builds += 1;
            Ok(5)
        })?;
        assert_eq!(value, 5);
    }
    assert_eq!(builds, 1);

    let failed = cache.get_or_try_insert_with("bad".to_string(), || Err(Error::from("nope")));
    assert!(failed.is_err());
    assert!(!cache.contains(&"bad".to_string()));
    Ok(())
}

#[test]
fn test_invalidate() {
    let mut cache: LruCache<&str, u32> = LruCache::new(2);
    cache.insert("a", 1);
    assert_eq!(cache.invalidate(&"a"), Some(1));
    assert!(cache.is_empty());
    assert_eq!(cache.invalidate(&"a"), None);
}
