/*!
 * 国别 ip 段.
 *
 * 读取 rir 的 delegated 统计文件, 如 delegated-apnic-latest, 每行形如
 *
 * apnic|CN|ipv4|1.0.1.0|256|20110414|allocated
 *
 * 第5项为地址个数, 换算成前缀: prefix = 32 - round(log2(count)).
 * 只取 ipv4 行, 其它行 (注释, 汇总, ipv6, asn) 跳过.
 */
use std::{collections::HashMap, net::Ipv4Addr, sync::Arc};

use anyhow::Context;
use ipnet::Ipv4Net;
use tracing::{debug, trace};

use super::ip::IpNetTable;
use crate::utils::try_get_file_content;

/// 解析一行. 不是有效的 ipv4 行时返回 None
pub fn parse_delegated_line(line: &str) -> Option<(String, Ipv4Net)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 5 || !parts[2].eq_ignore_ascii_case("ipv4") {
        return None;
    }

    let ip: Ipv4Addr = parts[3].parse().ok()?;
    let count: u64 = parts[4].parse().ok()?;
    if count == 0 {
        return None;
    }
    let mask = (count as f64).log2().round() as u8;
    let prefix = 32u8.checked_sub(mask)?;
    let net = Ipv4Net::new(ip, prefix).ok()?;

    Some((parts[1].to_lowercase(), net.trunc()))
}

/// 国家代码 (小写) -> 该国的 ipv4 段
pub fn parse_delegated(text: &str) -> HashMap<String, Vec<Ipv4Net>> {
    let mut m: HashMap<String, Vec<Ipv4Net>> = HashMap::new();
    for line in text.lines() {
        match parse_delegated_line(line) {
            Some((cc, net)) => m.entry(cc).or_default().push(net),
            None => trace!("skip delegated line {:?}", line),
        }
    }
    m
}

/// 每个国家一个 IpNetTable, 可共享给多条规则
#[derive(Debug, Clone, Default)]
pub struct CountryIps {
    tables: HashMap<String, Arc<IpNetTable>>,
}

impl CountryIps {
    pub fn from_delegated(text: &str) -> Self {
        let tables: HashMap<_, _> = parse_delegated(text)
            .into_iter()
            .map(|(cc, nets)| (cc, Arc::new(IpNetTable::from_nets(nets))))
            .collect();
        debug!(countries = tables.len(), "loaded country ip ranges");
        CountryIps { tables }
    }

    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let (text, path) = try_get_file_content(file_name)
            .with_context(|| format!("read country ip file {file_name}"))?;
        debug!("country ip file found at {:?}", path);
        Ok(Self::from_delegated(&text))
    }

    /// cc 不区分大小写
    pub fn get(&self, cc: &str) -> Option<Arc<IpNetTable>> {
        self.tables.get(&cc.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
