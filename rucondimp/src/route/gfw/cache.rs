/*!
 * 域名 -> 是否被墙 的缓存.
 *
 * Unbounded: RwLock<HashMap>, 命中时只拿读锁; 未命中时拿写锁, 再查一遍, 然后计算并存入. 不淘汰.
 *
 * Bounded (feature bounded_cache): TinyUfo, 有容量上限, 无锁. 同一个 key 计算结果相同,
 * 所以并发重复 put 无影响
 */
use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

#[cfg(feature = "bounded_cache")]
use tinyufo::TinyUfo;

pub enum DomainCache {
    Unbounded(RwLock<HashMap<String, bool>>),

    #[cfg(feature = "bounded_cache")]
    Bounded(TinyUfo<String, bool>),
}

impl std::fmt::Debug for DomainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainCache::Unbounded(m) => f
                .debug_struct("DomainCache::Unbounded")
                .field("len", &m.read().len())
                .finish(),

            #[cfg(feature = "bounded_cache")]
            DomainCache::Bounded(_) => f.write_str("DomainCache::Bounded"),
        }
    }
}

impl Default for DomainCache {
    fn default() -> Self {
        DomainCache::Unbounded(RwLock::new(HashMap::new()))
    }
}

impl DomainCache {
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[cfg(feature = "bounded_cache")]
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DomainCache::Bounded(TinyUfo::new(capacity, capacity))
    }

    pub fn get(&self, domain: &str) -> Option<bool> {
        match self {
            DomainCache::Unbounded(m) => m.read().get(domain).copied(),

            #[cfg(feature = "bounded_cache")]
            DomainCache::Bounded(c) => c.get(&domain.to_string()),
        }
    }

    /// 有缓存时直接返回, 否则调用 f 计算并存入.
    ///
    /// Unbounded 时 对同一个 domain, f 最多被调用一次
    pub fn get_or_insert_with<F>(&self, domain: &str, f: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        match self {
            DomainCache::Unbounded(m) => {
                if let Some(r) = m.read().get(domain) {
                    return *r;
                }
                let mut w = m.write();
                if let Some(r) = w.get(domain) {
                    return *r;
                }
                let r = f();
                trace!(domain, blocked = r, "gfw cache insert");
                w.insert(domain.to_string(), r);
                r
            }

            #[cfg(feature = "bounded_cache")]
            DomainCache::Bounded(c) => {
                let key = domain.to_string();
                if let Some(r) = c.get(&key) {
                    return r;
                }
                let r = f();
                trace!(domain, blocked = r, "gfw bounded cache insert");
                c.put(key, r, 1);
                r
            }
        }
    }

    /// 仅对 Unbounded 有意义; Bounded 返回 None
    pub fn len(&self) -> Option<usize> {
        match self {
            DomainCache::Unbounded(m) => Some(m.read().len()),

            #[cfg(feature = "bounded_cache")]
            DomainCache::Bounded(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn computes_once() {
        let c = DomainCache::unbounded();
        let calls = AtomicUsize::new(0);
        let f = || {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        };
        assert!(c.get_or_insert_with("a.com", f));
        assert!(c.get_or_insert_with("a.com", f));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.get("a.com"), Some(true));
        assert_eq!(c.get("b.com"), None);
        assert_eq!(c.len(), Some(1));
    }

    #[test]
    fn concurrent() {
        let c = DomainCache::unbounded();
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..100 {
                        let d = format!("d{}.com", i % 10);
                        let r = c.get_or_insert_with(&d, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            i % 2 == 0
                        });
                        assert_eq!(r, (i % 10) % 2 == 0);
                    }
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(c.len(), Some(10));
    }

    #[cfg(feature = "bounded_cache")]
    #[test]
    fn bounded() {
        let c = DomainCache::bounded(16);
        assert!(!c.get_or_insert_with("x.com", || false));
        assert!(!c.get_or_insert_with("x.com", || true));
        assert_eq!(c.get("x.com"), Some(false));
        assert_eq!(c.len(), None);
    }
}
