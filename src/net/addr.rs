use super::*;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    IPv4,
    IPv6,
    Domain,
}

impl AddressFamily {
    pub fn is_ipv4(&self) -> bool {
        matches!(self, AddressFamily::IPv4)
    }
    pub fn is_ipv6(&self) -> bool {
        matches!(self, AddressFamily::IPv6)
    }
    pub fn is_ip(&self) -> bool {
        self.is_ipv4() || self.is_ipv6()
    }
    pub fn is_domain(&self) -> bool {
        matches!(self, AddressFamily::Domain)
    }

    pub fn of_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }
}

/// ipv4, ipv6 或 域名.
///
/// 域名在进入 RoutingContext 之前应为小写; [`Address::from_host_str`] 会做这件事,
/// 直接构造 Domain 变体则保持原样
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Domain(String),
}

impl Default for Address {
    /// 0.0.0.0
    fn default() -> Self {
        Address::V4(Ipv4Addr::UNSPECIFIED)
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Address::V4(v4),
            IpAddr::V6(v6) => Address::V6(v6),
        }
    }
}

impl Address {
    /// ip literal 得到 ip 变体, 其它的都视为域名并转为小写.
    ///
    /// 支持 [::1] 这种带方括号的 ipv6
    pub fn from_host_str(host: &str) -> Self {
        let host = host.trim();
        let bare = if host.starts_with('[') && host.ends_with(']') {
            &host[1..host.len() - 1]
        } else {
            host
        };
        match bare.parse::<IpAddr>() {
            Ok(ip) => ip.into(),
            Err(_) => Address::Domain(host.to_lowercase()),
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            Address::V4(_) => AddressFamily::IPv4,
            Address::V6(_) => AddressFamily::IPv6,
            Address::Domain(_) => AddressFamily::Domain,
        }
    }

    /// None if it's a domain
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::V4(v4) => Some(IpAddr::V4(*v4)),
            Address::V6(v6) => Some(IpAddr::V6(*v6)),
            Address::Domain(_) => None,
        }
    }

    /// None if it's an ip
    pub fn domain(&self) -> Option<&str> {
        match self {
            Address::Domain(d) => Some(d.as_str()),
            _ => None,
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::V4(v4) => write!(f, "{v4}"),
            Address::V6(v6) => write!(f, "[{v6}]"),
            Address::Domain(d) => write!(f, "{d}"),
        }
    }
}

/// Destination 由 Address, port 和 Network 组成, 用于描述 连接的 目标 或 来源
///
/// default is  tcp://0.0.0.0:0
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Destination {
    pub address: Address,
    pub port: u16,
    pub network: Network,
}

impl Destination {
    pub fn new(address: Address, port: u16, network: Network) -> Self {
        Destination {
            address,
            port,
            network,
        }
    }

    pub fn tcp(address: Address, port: u16) -> Self {
        Destination::new(address, port, Network::TCP)
    }

    /// tcp://127.0.0.1:80 or tcp://www.b.com:80.  or tcp://[::1]:80
    ///
    /// if :// is not present, use tcp as network, like 1.1.1.1:1 will act like
    /// tcp://1.1.1.1:1
    pub fn from_network_addr_url(s: &str) -> Result<Self> {
        let ns: Vec<_> = s.splitn(2, "://").collect();
        match ns.len() {
            1 => Destination::from_addr_str("tcp", s),
            2 => Destination::from_addr_str(ns[0], ns[1]),
            _ => Err(anyhow!(
                "Destination::from_network_addr_url, split :// got len!=2 && len!=1",
            )),
        }
    }

    /// "tcp",127.0.0.1:80 or "tcp",www.b.com:80. or "tcp", [::1]:80
    ///
    /// network must be a valid network str. 没有端口时 port 为 0
    pub fn from_addr_str(network: &str, s: &str) -> Result<Self> {
        let network = Network::from_string(network)?;

        let ns: Vec<_> = if s.starts_with('[') && s.contains("]:") {
            crate::utils::rem_first(s).split("]:").collect()
        } else if s.matches(':').count() > 1 {
            // bare ipv6 without port
            vec![s]
        } else {
            s.split(':').collect()
        };
        let port = if ns.len() != 2 {
            0
        } else {
            ns[1].parse::<u16>().map_err(|e| anyhow!("{}", e))?
        };

        Ok(Destination {
            address: Address::from_host_str(ns[0]),
            port,
            network,
        })
    }
}

/// 以 url 的格式 描述 Destination
impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}",
            self.network.to_static_str(),
            self.address,
            self.port
        )
    }
}
