pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// TTL used by [`CredentialCache::store`] unless configured otherwise.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(3000);

const CACHE_KEY_SEPARATOR: char = ':';

/// Identifies a credential request context: (user id, id token, role session name).
///
/// Built by plain concatenation with `:`. Components containing the separator can collide; callers
/// pass identifiers and tokens that don't.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

pub fn build_cache_key(user_id: &str, id_token: &str, session_name: &str) -> CacheKey {
    CacheKey(format!(
        "{user_id}{CACHE_KEY_SEPARATOR}{id_token}{CACHE_KEY_SEPARATOR}{session_name}"
    ))
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short digest safe to put in logs; the key itself embeds an id token.
    pub fn fingerprint(&self) -> String {
        use base64::Engine;
        use sha2::Digest;
        let hash = sha2::Sha256::new().chain_update(&self.0).finalize();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&hash[..12])
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CacheKey").field(&self.fingerprint()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct CachedCredential {
    pub credential: std::sync::Arc<crate::credential::StsCredential>,
    pub stored_at: std::time::Instant,
    pub ttl: std::time::Duration,
}

impl CachedCredential {
    /// Valid iff `now < stored_at + ttl`; a zero TTL is never valid.
    pub fn is_valid_at(&self, now: std::time::Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

struct Inner {
    items: lru::LruCache<CacheKey, CachedCredential>,
    max_size: usize,
}

impl Inner {
    fn evict_overflow(&mut self) {
        while self.items.len() > self.max_size {
            match self.items.pop_lru() {
                Some((key, _)) => {
                    tracing::debug!(key = ?key, max_size = self.max_size, "Evicted least recently used credential");
                }
                None => break,
            }
        }
    }
}

/// Bounded STS credential cache with per-entry TTL and LRU eviction.
///
/// Cloning yields another handle to the same cache. Expired entries are only removed when read.
#[derive(Clone)]
pub struct CredentialCache {
    inner: std::sync::Arc<parking_lot::Mutex<Inner>>,
    default_ttl: std::time::Duration,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache").finish()
    }
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_CACHE_SIZE, DEFAULT_TTL)
    }

    pub fn with_limits(max_size: usize, default_ttl: std::time::Duration) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(Inner {
                items: lru::LruCache::unbounded(),
                max_size,
            })),
            default_ttl,
        }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::with_limits(settings.sts_cache_size, settings.sts_cache_ttl())
    }

    /// Changes the capacity, evicting the least recently used entries until it holds. Zero empties
    /// the cache and makes every later store a no-op.
    pub fn configure_max_size(&self, max_size: usize) {
        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        inner.evict_overflow();
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
    }

    pub fn store(&self, key: CacheKey, credential: crate::credential::StsCredential) {
        self.store_with_ttl(key, credential, self.default_ttl)
    }

    /// Inserts or replaces the entry for `key`. Replacing restarts both its TTL and its recency.
    pub fn store_with_ttl(
        &self,
        key: CacheKey,
        credential: crate::credential::StsCredential,
        ttl: std::time::Duration,
    ) {
        let item = CachedCredential {
            credential: std::sync::Arc::new(credential),
            stored_at: std::time::Instant::now(),
            ttl,
        };
        let mut inner = self.inner.lock();
        tracing::trace!(key = ?key, ttl = ?ttl, "Storing credential");
        inner.items.put(key, item);
        inner.evict_overflow();
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedCredential> {
        let now = std::time::Instant::now();
        let mut inner = self.inner.lock();
        let expired = match inner.items.peek(key) {
            None => return None,
            Some(item) => !item.is_valid_at(now),
        };
        if expired {
            tracing::debug!(key = ?key, "cached entry hit, but discarding as it has expired");
            inner.items.pop(key);
            return None;
        }
        inner.items.get(key).cloned()
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new()
    }
}
