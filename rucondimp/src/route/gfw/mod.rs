/*!
 * 按 gfwlist 判断 target 域名是否被墙.
 *
 * 一个 GfwList 可被多个 GfwMatcher 共享 (Arc); 每个 GfwMatcher 有自己的缓存.
 */
pub mod cache;
pub mod list;

use std::sync::Arc;

pub use cache::DomainCache;
pub use list::{decode_source, root_domain, strip_port, DomainJudge, GfwList, Rule};
use rucond::{
    route::{Condition, RoutingContext},
    Name,
};

#[derive(Debug)]
pub struct GfwMatcher<L: DomainJudge = GfwList> {
    list: Arc<L>,
    cache: DomainCache,
}

impl<L: DomainJudge> GfwMatcher<L> {
    pub fn new(list: Arc<L>) -> Self {
        GfwMatcher {
            list,
            cache: DomainCache::unbounded(),
        }
    }

    /// 缓存最多存 capacity 个域名
    #[cfg(feature = "bounded_cache")]
    pub fn with_capacity(list: Arc<L>, capacity: usize) -> Self {
        GfwMatcher {
            list,
            cache: DomainCache::bounded(capacity),
        }
    }

    pub fn cache(&self) -> &DomainCache {
        &self.cache
    }

    /// 不经过 RoutingContext 直接判断一个域名, 结果同样进入缓存
    pub fn is_blocked(&self, domain: &str) -> bool {
        self.cache.get_or_insert_with(domain, || self.list.is_blocked(domain))
    }
}

impl<L: DomainJudge> Name for GfwMatcher<L> {
    fn name(&self) -> &str {
        "gfw_domain"
    }
}

impl<L: DomainJudge + std::fmt::Debug> Condition for GfwMatcher<L> {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match ctx.target_domain() {
            Some(domain) => self.is_blocked(domain),
            None => false,
        }
    }
}
