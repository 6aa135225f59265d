use std::net::IpAddr;

use smallvec::SmallVec;
use typed_builder::TypedBuilder;

use crate::{
    net::{AddressFamily, Destination},
    user::User,
};

/// 一条连接在路由时可用的全部信息. 每一项都可以没有.
///
/// 建立后不再修改; 需要补充信息时用 with_xxx 得到一个新的 RoutingContext
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct RoutingContext {
    #[builder(default, setter(strip_option))]
    pub target: Option<Destination>,

    #[builder(default, setter(strip_option))]
    pub source: Option<Destination>,

    /// target 域名 经 dns 解析得到的 ip. None 表示没有解析 或 还没解析
    #[builder(default, setter(strip_option))]
    pub resolved_ips: Option<Vec<IpAddr>>,

    #[builder(default, setter(into, strip_option))]
    pub inbound_tag: Option<String>,

    #[builder(default, setter(strip_option))]
    pub user: Option<Box<dyn User>>,
}

/// 从 resolved_ips 和 target/source 中收集出的 ip, 一般不超过 4 个
pub type CandidateIps = SmallVec<[IpAddr; 4]>;

impl RoutingContext {
    pub fn with_target(self, target: Destination) -> Self {
        RoutingContext {
            target: Some(target),
            ..self
        }
    }

    pub fn with_source(self, source: Destination) -> Self {
        RoutingContext {
            source: Some(source),
            ..self
        }
    }

    pub fn with_resolved_ips(self, ips: Vec<IpAddr>) -> Self {
        RoutingContext {
            resolved_ips: Some(ips),
            ..self
        }
    }

    pub fn with_inbound_tag(self, tag: impl Into<String>) -> Self {
        RoutingContext {
            inbound_tag: Some(tag.into()),
            ..self
        }
    }

    pub fn with_user(self, user: Box<dyn User>) -> Self {
        RoutingContext {
            user: Some(user),
            ..self
        }
    }

    /// target 为域名时返回之
    pub fn target_domain(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.address.domain())
    }

    /// 属于 family 的 resolved_ips, 再加上 target (或 on_source 时的 source) 的 ip,
    /// 如果它也属于 family
    pub fn candidate_ips(&self, on_source: bool, family: AddressFamily) -> CandidateIps {
        let mut ips = CandidateIps::new();

        if let Some(resolved) = &self.resolved_ips {
            ips.extend(
                resolved
                    .iter()
                    .filter(|ip| AddressFamily::of_ip(ip) == family)
                    .copied(),
            );
        }

        let dest = if on_source {
            self.source.as_ref()
        } else {
            self.target.as_ref()
        };
        if let Some(ip) = dest.and_then(|d| d.address.ip()) {
            if AddressFamily::of_ip(&ip) == family {
                ips.push(ip);
            }
        }
        ips
    }
}
