/*!
 * ip 匹配器.
 *
 * 候选 ip 有两个来源: resolved_ips 中同一族的 ip, 以及 target (on_source 时为 source)
 * 本身的 ip. 任意一个候选 ip 落在 cidr 内即为 true.
 *
 * 这样当连接以域名发起时, 按 ip 写的规则 在 dns 解析后仍然有效
 */
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use ipnet::{IpNet, Ipv4Net};
use iprange::IpRange;
use rucond::{
    net::AddressFamily,
    route::{Condition, RoutingContext},
    Name, RouteError,
};

/// 由 ip 的字节 和 前缀长度 得到 IpNet. 字节长度只能为 4 或 16
pub fn ip_net_from_bytes(ip: &[u8], prefix: u32) -> Result<IpNet, RouteError> {
    let invalid = || RouteError::InvalidCidr(format!("{:?}/{}", ip, prefix));

    let prefix = u8::try_from(prefix).map_err(|_| invalid())?;
    let addr = match ip.len() {
        4 => {
            let b: [u8; 4] = ip.try_into().map_err(|_| invalid())?;
            IpAddr::V4(Ipv4Addr::from(b))
        }
        16 => {
            let b: [u8; 16] = ip.try_into().map_err(|_| invalid())?;
            IpAddr::V6(Ipv6Addr::from(b))
        }
        _ => return Err(invalid()),
    };
    IpNet::new(addr, prefix).map_err(|_| invalid())
}

/// 只读的 ipv4 cidr 集合, 适合国别ip段这种上千条的情况.
///
/// 内部是 iprange 的前缀树, 重叠的条目会被合并, 查询与条目数无关
#[derive(Clone, Debug)]
pub struct IpNetTable {
    range: IpRange<Ipv4Net>,
    count: usize,
}

impl IpNetTable {
    pub fn from_nets<I: IntoIterator<Item = Ipv4Net>>(nets: I) -> Self {
        let mut range = IpRange::new();
        let mut count = 0;
        for n in nets {
            range.add(n.trunc());
            count += 1;
        }
        range.simplify();
        IpNetTable { range, count }
    }

    /// (ip bytes, prefix) 的列表, 如 ([1, 0, 1, 0], 24). 只接受 ipv4
    pub fn from_tuples<'a, I>(tuples: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (&'a [u8], u32)>,
    {
        let nets = tuples
            .into_iter()
            .map(|(ip, prefix)| match ip_net_from_bytes(ip, prefix)? {
                IpNet::V4(n) => Ok(n),
                IpNet::V6(n) => Err(RouteError::InvalidCidr(format!(
                    "ipv6 {n} in an ipv4 table"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IpNetTable::from_nets(nets))
    }

    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        self.range.contains(ip)
    }

    /// 加入时的条目数 (合并之前)
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// 单个 cidr, ipv4 或 ipv6 均可
#[derive(Clone, Debug)]
pub struct CidrMatcher {
    cidr: IpNet,
    on_source: bool,
}

impl CidrMatcher {
    pub fn new(ip: &[u8], prefix: u32, on_source: bool) -> Result<Self, RouteError> {
        Ok(CidrMatcher {
            cidr: ip_net_from_bytes(ip, prefix)?,
            on_source,
        })
    }

    pub fn from_net(cidr: IpNet, on_source: bool) -> Self {
        CidrMatcher { cidr, on_source }
    }

    fn family(&self) -> AddressFamily {
        AddressFamily::of_ip(&self.cidr.addr())
    }
}

impl Name for CidrMatcher {
    fn name(&self) -> &str {
        "cidr"
    }
}

impl Condition for CidrMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        ctx.candidate_ips(self.on_source, self.family())
            .iter()
            .any(|ip| self.cidr.contains(ip))
    }
}

/// 由 IpNetTable 支持的 ipv4 集合匹配. table 可在多条规则间共享
#[derive(Clone, Debug)]
pub struct Ipv4SetMatcher {
    table: Arc<IpNetTable>,
    on_source: bool,
}

impl Ipv4SetMatcher {
    pub fn new(table: Arc<IpNetTable>, on_source: bool) -> Self {
        Ipv4SetMatcher { table, on_source }
    }
}

impl Name for Ipv4SetMatcher {
    fn name(&self) -> &str {
        "ipv4_set"
    }
}

impl Condition for Ipv4SetMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        ctx.candidate_ips(self.on_source, AddressFamily::IPv4)
            .iter()
            .any(|ip| match ip {
                IpAddr::V4(v4) => self.table.contains(v4),
                IpAddr::V6(_) => false,
            })
    }
}

#[cfg(test)]
mod test {
    use rucond::net::{Address, Destination};

    use super::*;

    fn ip_ctx(ip: [u8; 4]) -> RoutingContext {
        RoutingContext::default()
            .with_target(Destination::tcp(IpAddr::V4(Ipv4Addr::from(ip)).into(), 80))
    }

    #[test]
    fn bad_cidr() {
        assert!(matches!(
            CidrMatcher::new(&[10, 0, 0, 0], 33, false),
            Err(RouteError::InvalidCidr(_))
        ));
        assert!(CidrMatcher::new(&[0; 16], 129, false).is_err());
        assert!(CidrMatcher::new(&[1, 2, 3], 8, false).is_err());
        assert!(CidrMatcher::new(&[0; 16], 128, false).is_ok());
    }

    #[test]
    fn cidr_bounds() {
        let all = CidrMatcher::new(&[0, 0, 0, 0], 0, false).unwrap();
        assert!(all.apply(&ip_ctx([1, 2, 3, 4])));
        assert!(all.apply(&ip_ctx([255, 255, 255, 255])));

        let one = CidrMatcher::new(&[1, 2, 3, 4], 32, false).unwrap();
        assert!(one.apply(&ip_ctx([1, 2, 3, 4])));
        assert!(!one.apply(&ip_ctx([1, 2, 3, 5])));

        // /0 只匹配同一族
        let v6 = RoutingContext::default()
            .with_target(Destination::tcp(Address::from_host_str("::1"), 80));
        assert!(!all.apply(&v6));
        let all6 = CidrMatcher::new(&[0; 16], 0, false).unwrap();
        assert!(all6.apply(&v6));
        assert!(!all6.apply(&ip_ctx([1, 2, 3, 4])));
    }

    #[test]
    fn cidr_on_source() {
        let m = CidrMatcher::new(&[192, 168, 0, 0], 16, true).unwrap();
        let ctx = ip_ctx([8, 8, 8, 8])
            .with_source(Destination::tcp(Address::from_host_str("192.168.1.7"), 4000));
        assert!(m.apply(&ctx));

        let m = CidrMatcher::new(&[192, 168, 0, 0], 16, false).unwrap();
        assert!(!m.apply(&ctx));
    }

    #[test]
    fn resolved_ips_monotonic() {
        let m = CidrMatcher::new(&[10, 0, 0, 0], 8, false).unwrap();
        let ctx = RoutingContext::default()
            .with_target(Destination::tcp(Address::Domain("x".into()), 443));
        assert!(!m.apply(&ctx));

        let out = IpAddr::V4(Ipv4Addr::new(11, 1, 2, 3));
        let ctx = ctx.with_resolved_ips(vec![out]);
        assert!(!m.apply(&ctx));

        let inside = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
        let ctx = ctx.with_resolved_ips(vec![out, inside]);
        assert!(m.apply(&ctx));
    }

    #[test]
    fn table() {
        let t = IpNetTable::from_tuples([
            (&[91, 108, 4, 0][..], 22),
            (&[91, 108, 8, 0][..], 22),
            (&[10, 0, 0, 0][..], 8),
            (&[10, 1, 0, 0][..], 16),
        ])
        .unwrap();
        assert_eq!(t.len(), 4);
        assert!(t.contains(&Ipv4Addr::new(91, 108, 4, 1)));
        assert!(t.contains(&Ipv4Addr::new(91, 108, 11, 255)));
        assert!(!t.contains(&Ipv4Addr::new(91, 108, 12, 0)));
        assert!(t.contains(&Ipv4Addr::new(10, 1, 2, 3)));
        assert!(t.contains(&Ipv4Addr::new(10, 200, 2, 3)));
        assert!(!t.contains(&Ipv4Addr::new(11, 0, 0, 0)));

        assert!(IpNetTable::from_tuples([(&[0u8; 16][..], 8)]).is_err());
        assert!(IpNetTable::from_nets(Vec::new()).is_empty());

        let m = Ipv4SetMatcher::new(Arc::new(t), false);
        assert!(m.apply(&ip_ctx([91, 108, 5, 5])));
        assert!(!m.apply(&ip_ctx([1, 1, 1, 1])));
        assert!(!m.apply(&RoutingContext::default()));
    }
}
