use super::*;

#[test]
fn content_key_is_stable() {
    let a = EmbeddingCache::content_key("fn main() {}");
    let b = EmbeddingCache::content_key("fn main() {}");
    let c = EmbeddingCache::content_key("fn main() { }");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn miss_then_hit() {
    let cache = EmbeddingCache::new(16);
    let key = EmbeddingCache::content_key("some code");

    assert!(cache.get(&key).is_none());

    cache.insert(key.clone(), vec![0.25, 0.5]);
    assert_eq!(cache.get(&key), Some(vec![0.25, 0.5]));
}

#[test]
fn oldest_entry_is_evicted_at_capacity() {
    let cache = EmbeddingCache::new(2);

    cache.insert("first".to_string(), vec![1.0]);
    cache.insert("second".to_string(), vec![2.0]);
    cache.insert("third".to_string(), vec![3.0]);

    assert_eq!(cache.len(), 2);
    assert!(cache.get("first").is_none());
    assert_eq!(cache.get("second"), Some(vec![2.0]));
    assert_eq!(cache.get("third"), Some(vec![3.0]));
}

#[test]
fn reinserting_a_key_does_not_grow_the_cache() {
    let cache = EmbeddingCache::new(4);

    cache.insert("key".to_string(), vec![1.0]);
    cache.insert("key".to_string(), vec![9.0]);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("key"), Some(vec![9.0]));
}

#[test]
fn clones_share_storage() {
    let cache = EmbeddingCache::new(8);
    let handle = cache.clone();

    cache.insert("shared".to_string(), vec![0.1]);

    assert_eq!(handle.get("shared"), Some(vec![0.1]));
    assert_eq!(handle.len(), 1);
}
