use crate::client::ResolutionResult;
use std::{
  sync::Arc,
  time::{Duration, Instant},
};

/// DashMap type alias, uses ahash::RandomState as hashbuilder
type DashMap<K, V> = dashmap::DashMap<K, V, ahash::RandomState>;

/// Cached resolution with its expiry deadline.
/// Entries are replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone)]
struct CacheEntry {
  result: ResolutionResult,
  expires_at: Instant,
}

/// Time-bounded memoization of resolution results keyed by the request domain (case-sensitive).
///
/// Built without a TTL the cache is inert: every `get` misses and `put` is a no-op,
/// so every request reaches the resolution service. Expired entries are dropped
/// lazily on access; concurrent misses for the same domain settle last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
  inner: Arc<DashMap<String, CacheEntry>>,
  ttl: Option<Duration>,
}

impl ResultCache {
  /// Create a new instance; `None` disables caching entirely
  pub fn new(ttl: Option<Duration>) -> Self {
    Self {
      inner: Arc::new(DashMap::default()),
      ttl,
    }
  }

  /// Get the cached result for the domain if it has not expired yet
  pub fn get(&self, domain: &str) -> Option<ResolutionResult> {
    self.ttl?;
    let now = Instant::now();
    let entry = self.inner.get(domain)?;
    if now < entry.expires_at {
      return Some(entry.result.clone());
    }
    // The shard lock is still held through `entry`; release it before removing
    drop(entry);
    self.inner.remove_if(domain, |_, e| now >= e.expires_at);
    None
  }

  /// Store the result for the domain, replacing any previous entry wholesale
  pub fn put(&self, domain: &str, result: ResolutionResult) {
    let Some(ttl) = self.ttl else {
      return;
    };
    let entry = CacheEntry {
      result,
      expires_at: Instant::now() + ttl,
    };
    self.inner.insert(domain.to_string(), entry);
  }

  /// Drop the entry for the domain, forcing the next request to resolve again
  pub fn invalidate(&self, domain: &str) {
    self.inner.remove(domain);
  }
}

/* ---------------------------------------------------------- */
#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_disabled_without_ttl() {
    let cache = ResultCache::new(None);
    cache.put("menu.live", ResolutionResult::new("upstream.internal"));
    assert!(cache.get("menu.live").is_none());
  }

  #[test]
  fn test_hit_within_ttl() {
    let cache = ResultCache::new(Some(Duration::from_secs(60)));
    cache.put("menu.live", ResolutionResult::new("upstream.internal"));

    let hit = cache.get("menu.live").unwrap();
    assert_eq!(hit.resolved_host, "upstream.internal");
    // key is exact and case-sensitive
    assert!(cache.get("Menu.Live").is_none());
  }

  #[test]
  fn test_expired_entry_is_absent() {
    let cache = ResultCache::new(Some(Duration::from_millis(30)));
    cache.put("menu.live", ResolutionResult::new("upstream.internal"));

    std::thread::sleep(Duration::from_millis(50));
    assert!(cache.get("menu.live").is_none());
  }

  #[test]
  fn test_replace_wholesale() {
    let cache = ResultCache::new(Some(Duration::from_secs(60)));
    cache.put("menu.live", ResolutionResult::new("first.internal"));
    cache.put("menu.live", ResolutionResult::new("second.internal"));

    assert_eq!(cache.get("menu.live").unwrap().resolved_host, "second.internal");
  }

  #[test]
  fn test_invalidate() {
    let cache = ResultCache::new(Some(Duration::from_secs(60)));
    cache.put("menu.live", ResolutionResult::new("upstream.internal"));

    cache.invalidate("menu.live");
    assert!(cache.get("menu.live").is_none());
  }

  #[test]
  fn test_concurrent_access() {
    let cache = ResultCache::new(Some(Duration::from_secs(60)));
    let handles: Vec<_> = (0..8)
      .map(|i| {
        let cache = cache.clone();
        std::thread::spawn(move || {
          let domain = format!("d{}.example", i % 2);
          cache.put(&domain, ResolutionResult::new("upstream.internal"));
          cache.get(&domain)
        })
      })
      .collect();

    for handle in handles {
      assert!(handle.join().unwrap().is_some());
    }
  }
}
