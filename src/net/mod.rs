/*!
 * module net defines the address parts that routing conditions look at.
 *
 * enums: Network, Address, AddressFamily
 *
 * structs: NetworkSet, PortRange, Destination

*/
pub mod addr;


pub use addr::*;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Network {
    IP,

    #[default]
    TCP,
    UDP,
}

impl Network {
    pub fn from_string(s: &str) -> Result<Self, RouteError> {
        let s = s.trim().to_lowercase();

        match s.as_str() {
            "ip" => Ok(Network::IP),
            "tcp" => Ok(Network::TCP),
            "udp" => Ok(Network::UDP),
            _ => Err(RouteError::UnknownNetwork(s)),
        }
    }

    pub fn to_static_str(&self) -> &'static str {
        match self {
            Network::IP => "ip",
            Network::TCP => "tcp",
            Network::UDP => "udp",
        }
    }

    fn flag(&self) -> NetworkSet {
        match self {
            Network::IP => NetworkSet::IP,
            Network::TCP => NetworkSet::TCP,
            Network::UDP => NetworkSet::UDP,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_static_str())
    }
}

bitflags! {
    /// 一组 Network, has 为 O(1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NetworkSet: u8 {
        const IP = 0b001;
        const TCP = 0b010;
        const UDP = 0b100;
    }
}

impl NetworkSet {
    pub fn has(&self, n: Network) -> bool {
        self.contains(n.flag())
    }

    /// like "tcp,udp". empty items are ignored
    pub fn from_list_str(s: &str) -> Result<Self, RouteError> {
        s.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(Network::from_string)
            .collect()
    }
}

impl FromIterator<Network> for NetworkSet {
    fn from_iter<I: IntoIterator<Item = Network>>(iter: I) -> Self {
        iter.into_iter().fold(NetworkSet::empty(), |acc, n| acc | n.flag())
    }
}

/// [from, to], 两端都包含
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    pub fn new(from: u16, to: u16) -> Result<Self, RouteError> {
        if from > to {
            return Err(RouteError::InvalidPortRange(format!("{from}-{to}")));
        }
        Ok(PortRange { from, to })
    }

    pub fn single(port: u16) -> Self {
        PortRange { from: port, to: port }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }

    /// like "53,443,1000-2000"
    pub fn list_from_str(s: &str) -> Result<Vec<Self>, RouteError> {
        s.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(str::parse)
            .collect()
    }
}

/// "443" or "1000-2000"
impl FromStr for PortRange {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|e| RouteError::InvalidPortRange(format!("{s}: {e}")))
        };
        match s.split_once('-') {
            Some((from, to)) => PortRange::new(parse_port(from)?, parse_port(to)?),
            None => Ok(PortRange::single(parse_port(s)?)),
        }
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}
