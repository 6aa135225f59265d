/*!
 * 路由规则的 toml 配置, 以及把一条规则编译为 Condition 树.
 *
 * 一条规则中出现的每一项 依 domain, ip, port, network, source, user, inbound_tag 的顺序
 * 成为 AllCondition 的一个子项; 列表型的项 成为 AnyCondition.
 *
 * domain 的写法:
 *
 * - 无前缀 或 keyword:xxx  子串
 * - domain:xxx  子域名
 * - regexp:xxx  正则
 * - full:xxx  完全相同
 * - gfw  按 gfwlist 判断
 *
 * ip / source 的写法: cidr (如 10.0.0.0/8, fc00::/7), 单个 ip, 或 geoip:cn
 */
use std::sync::Arc;

use anyhow::Context;
use ipnet::{IpNet, Ipv4Net};
use itertools::Itertools;
use rucond::{
    net::{NetworkSet, PortRange},
    route::{AllCondition, AnyCondition, ConditionBox},
    RouteError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    attr::{InboundTagMatcher, NetworkMatcher, PortMatcher, UserMatcher},
    country::CountryIps,
    domain::{PlainDomainMatcher, RegexpDomainMatcher, SubDomainMatcher},
    gfw::{GfwList, GfwMatcher},
    ip::{CidrMatcher, IpNetTable, Ipv4SetMatcher},
};
use crate::utils::try_get_file_content;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub out_tag: String,

    pub domain: Option<Vec<String>>,
    pub ip: Option<Vec<String>>,

    /// like "53,443,1000-2000"
    pub port: Option<String>,

    /// like "tcp,udp"
    pub network: Option<String>,
    pub source: Option<Vec<String>>,
    pub user: Option<Vec<String>>,
    pub inbound_tag: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// gfwlist 文件, 明文或 base64
    pub gfwlist_file: Option<String>,

    /// delegated 统计文件, 用于 geoip:xx
    pub country_ip_file: Option<String>,

    /// 设置时 每个 gfw 匹配器的缓存 最多存这么多个域名; 不设置时不限
    pub gfw_cache_capacity: Option<usize>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RouterConfig {
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("parse router config")
    }

    /// 在 COMMON_DIRS 中查找 file_name
    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let (s, path) = try_get_file_content(file_name)?;
        debug!("router config found at {:?}", path);
        Self::from_toml(&s).with_context(|| format!("config file {:?}", path))
    }

    /// 读取配置中引用的 gfwlist 和 country ip 文件
    pub fn load_env(&self) -> anyhow::Result<CompileEnv> {
        let mut env = CompileEnv {
            gfw_cache_capacity: self.gfw_cache_capacity,
            ..Default::default()
        };
        if let Some(f) = &self.gfwlist_file {
            let (s, path) =
                try_get_file_content(f).with_context(|| format!("read gfwlist file {f}"))?;
            debug!("gfwlist file found at {:?}", path);
            env.gfw = Some(Arc::new(GfwList::parse_source(&s)));
        }
        if let Some(f) = &self.country_ip_file {
            env.countries = CountryIps::from_file(f)?;
            debug!(countries = env.countries.len(), "country ip file loaded");
        }
        Ok(env)
    }
}

/// 编译规则时 多条规则共享的数据
#[derive(Clone, Debug, Default)]
pub struct CompileEnv {
    pub gfw: Option<Arc<GfwList>>,
    pub countries: CountryIps,
    pub gfw_cache_capacity: Option<usize>,
}

fn config_err(field: &str, msg: impl std::fmt::Display) -> RouteError {
    RouteError::Config(format!("{field}: {msg}"))
}

/// 只有一项时不再包一层
fn any_of(mut v: Vec<ConditionBox>) -> ConditionBox {
    if v.len() == 1 {
        if let Some(c) = v.pop() {
            return c;
        }
    }
    Box::new(AnyCondition::from(v))
}

fn non_empty_entries<'a>(field: &str, list: &'a [String]) -> Result<Vec<&'a str>, RouteError> {
    let v: Vec<&str> = list
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unique()
        .collect();
    if v.is_empty() {
        return Err(config_err(field, "empty list"));
    }
    Ok(v)
}

pub fn compile_domain(entry: &str, env: &CompileEnv) -> Result<ConditionBox, RouteError> {
    if entry == "gfw" {
        let list = env
            .gfw
            .clone()
            .ok_or_else(|| config_err("domain", "gfw used but no gfwlist loaded"))?;
        let m = match env.gfw_cache_capacity {
            #[cfg(feature = "bounded_cache")]
            Some(capacity) => GfwMatcher::with_capacity(list, capacity),

            #[cfg(not(feature = "bounded_cache"))]
            Some(_) => {
                return Err(config_err(
                    "gfw_cache_capacity",
                    "needs feature bounded_cache",
                ))
            }
            None => GfwMatcher::new(list),
        };
        return Ok(Box::new(m));
    }

    let (kind, pattern) = entry.split_once(':').unwrap_or(("keyword", entry));
    if pattern.is_empty() {
        return Err(config_err("domain", format!("empty pattern in {entry}")));
    }

    let c: ConditionBox = match kind {
        "keyword" => Box::new(PlainDomainMatcher::new(pattern.to_lowercase())),
        "domain" => Box::new(SubDomainMatcher::new(pattern.to_lowercase())),
        "regexp" => Box::new(RegexpDomainMatcher::new(pattern)?),
        "full" => {
            let p = regex::escape(&pattern.to_lowercase());
            Box::new(RegexpDomainMatcher::new(&format!("^{p}$"))?)
        }
        _ => return Err(config_err("domain", format!("unknown prefix {kind}:"))),
    };
    Ok(c)
}

/// 把 ipv4 合为一个 Ipv4SetMatcher, ipv6 各自成为 CidrMatcher
pub fn compile_ips(
    field: &str,
    entries: &[&str],
    on_source: bool,
    env: &CompileEnv,
) -> Result<ConditionBox, RouteError> {
    let mut v4: Vec<Ipv4Net> = Vec::new();
    let mut children: Vec<ConditionBox> = Vec::new();

    for e in entries {
        if let Some(cc) = e.strip_prefix("geoip:") {
            let table = env
                .countries
                .get(cc)
                .ok_or_else(|| config_err(field, format!("no ip ranges for country {cc}")))?;
            children.push(Box::new(Ipv4SetMatcher::new(table, on_source)));
            continue;
        }

        let net: IpNet = match e.parse() {
            Ok(n) => n,
            Err(_) => match e.parse::<std::net::IpAddr>() {
                Ok(ip) => IpNet::from(ip),
                Err(_) => return Err(RouteError::InvalidCidr(e.to_string())),
            },
        };
        match net {
            IpNet::V4(n) => v4.push(n),
            IpNet::V6(_) => children.push(Box::new(CidrMatcher::from_net(net.trunc(), on_source))),
        }
    }

    if !v4.is_empty() {
        let table = IpNetTable::from_nets(v4);
        children.insert(0, Box::new(Ipv4SetMatcher::new(Arc::new(table), on_source)));
    }
    Ok(any_of(children))
}

/// 把一条 RuleConfig 编译为 Condition 树. 没有任何一项的规则 返回 Config 错误
pub fn compile_rule(rule: &RuleConfig, env: &CompileEnv) -> Result<ConditionBox, RouteError> {
    let mut all = AllCondition::new();

    if let Some(list) = &rule.domain {
        let children = non_empty_entries("domain", list)?
            .into_iter()
            .map(|e| compile_domain(e, env))
            .collect::<Result<Vec<_>, _>>()?;
        all.add(any_of(children));
    }

    if let Some(list) = &rule.ip {
        let entries = non_empty_entries("ip", list)?;
        all.add(compile_ips("ip", &entries, false, env)?);
    }

    if let Some(s) = &rule.port {
        let children: Vec<ConditionBox> = PortRange::list_from_str(s)?
            .into_iter()
            .unique()
            .map(|p| Box::new(PortMatcher::new(p)) as ConditionBox)
            .collect();
        if children.is_empty() {
            return Err(config_err("port", "empty"));
        }
        all.add(any_of(children));
    }

    if let Some(s) = &rule.network {
        let set = NetworkSet::from_list_str(s)?;
        if set.is_empty() {
            return Err(config_err("network", "empty"));
        }
        all.add(Box::new(NetworkMatcher::new(set)));
    }

    if let Some(list) = &rule.source {
        let entries = non_empty_entries("source", list)?;
        all.add(compile_ips("source", &entries, true, env)?);
    }

    if let Some(list) = &rule.user {
        let users = non_empty_entries("user", list)?;
        all.add(Box::new(UserMatcher::new(users)));
    }

    if let Some(list) = &rule.inbound_tag {
        let tags = non_empty_entries("inbound_tag", list)?;
        all.add(Box::new(InboundTagMatcher::new(tags)));
    }

    if all.is_empty() {
        return Err(RouteError::Config(format!(
            "rule for {:?} has no condition",
            rule.out_tag
        )));
    }
    debug!(out_tag = %rule.out_tag, parts = all.len(), "compiled rule");
    Ok(Box::new(all))
}
