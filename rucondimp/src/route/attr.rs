//! port, network, user 和 inbound tag 的匹配器

use rucond::{
    net::{NetworkSet, PortRange},
    route::{Condition, RoutingContext},
    utils::non_empty_strings,
    Name,
};

#[derive(Debug, Clone, Copy)]
pub struct PortMatcher {
    port: PortRange,
}

impl PortMatcher {
    pub fn new(port: PortRange) -> Self {
        PortMatcher { port }
    }
}

impl Name for PortMatcher {
    fn name(&self) -> &str {
        "port"
    }
}

impl Condition for PortMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match &ctx.target {
            Some(t) => self.port.contains(t.port),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkMatcher {
    network: NetworkSet,
}

impl NetworkMatcher {
    pub fn new(network: NetworkSet) -> Self {
        NetworkMatcher { network }
    }
}

impl Name for NetworkMatcher {
    fn name(&self) -> &str {
        "network"
    }
}

impl Condition for NetworkMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match &ctx.target {
            Some(t) => self.network.has(t.network),
            None => false,
        }
    }
}

/// 按 email 匹配已鉴权的用户, 空的 email 在建立时去掉
#[derive(Debug, Clone)]
pub struct UserMatcher {
    users: Vec<String>,
}

impl UserMatcher {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UserMatcher {
            users: non_empty_strings(users),
        }
    }
}

impl Name for UserMatcher {
    fn name(&self) -> &str {
        "user"
    }
}

impl Condition for UserMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match &ctx.user {
            Some(u) => self.users.iter().any(|x| x == u.email()),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboundTagMatcher {
    tags: Vec<String>,
}

impl InboundTagMatcher {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InboundTagMatcher {
            tags: non_empty_strings(tags),
        }
    }
}

impl Name for InboundTagMatcher {
    fn name(&self) -> &str {
        "inbound_tag"
    }
}

impl Condition for InboundTagMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match &ctx.inbound_tag {
            Some(tag) => self.tags.iter().any(|t| t == tag),
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use rucond::{
        net::{Address, Destination, Network},
        user::MemoryUser,
    };

    use super::*;

    fn target(port: u16, network: Network) -> RoutingContext {
        RoutingContext::default().with_target(Destination::new(
            Address::Domain("a.com".into()),
            port,
            network,
        ))
    }

    #[test]
    fn port() {
        let m = PortMatcher::new(PortRange::single(443));
        assert!(m.apply(&target(443, Network::TCP)));
        assert!(!m.apply(&target(444, Network::TCP)));
        assert!(!m.apply(&RoutingContext::default()));

        let m = PortMatcher::new("1000-2000".parse().unwrap());
        assert!(m.apply(&target(1500, Network::UDP)));
        assert!(!m.apply(&target(999, Network::UDP)));
    }

    #[test]
    fn network() {
        let m = NetworkMatcher::new(NetworkSet::TCP);
        assert!(m.apply(&target(1, Network::TCP)));
        assert!(!m.apply(&target(1, Network::UDP)));
        assert!(!m.apply(&RoutingContext::default()));
    }

    #[test]
    fn user() {
        let m = UserMatcher::new(["", "love@v2ray.com", ""]);
        assert_eq!(m.users.len(), 1);

        let ctx = RoutingContext::default().with_user(Box::new(MemoryUser::new("love@v2ray.com")));
        assert!(m.apply(&ctx));

        let ctx = RoutingContext::default().with_user(Box::new(MemoryUser::new("")));
        assert!(!m.apply(&ctx));
        assert!(!m.apply(&RoutingContext::default()));
    }

    #[test]
    fn inbound_tag() {
        let m = InboundTagMatcher::new(vec!["socks-in".to_string(), String::new()]);
        assert!(m.apply(&RoutingContext::default().with_inbound_tag("socks-in")));
        assert!(!m.apply(&RoutingContext::default().with_inbound_tag("")));
        assert!(!m.apply(&RoutingContext::default().with_inbound_tag("http-in")));
        assert!(!m.apply(&RoutingContext::default()));
    }
}
