/*!
 * gfwlist 规则的解析与判断.
 *
 * 规则分两部分存放: 可以按 host 直接查的 放在 fast_map, 其它的 按出现顺序 放在 slow_list.
 * 判断时先查 fast_map (先查域名本身, 再查 root domain), 查到了就以它为准, 不再看 slow_list.
 *
 * 规则格式见 <https://github.com/gfwlist/gfwlist>, 类似 adblock
 */
use std::collections::HashMap;

use base64::Engine;
use regex::Regex;
use tracing::{debug, trace, warn};

/// is_blocked 的抽象, 让 GfwMatcher 可以换用别的 (如测试中计数的) 实现
pub trait DomainJudge: Send + Sync {
    fn is_blocked(&self, domain: &str) -> bool;
}

#[derive(Debug, Clone)]
pub enum Rule {
    /// host 子串匹配
    HostWildcard(String),

    /// prefix_only 时为前缀匹配, 否则为子串匹配
    UrlWildcard { pattern: String, prefix_only: bool },

    Regex(Regex),

    /// @@ 开头的规则, 匹配到表示 不被墙
    Whitelist(Box<Rule>),
}

impl Rule {
    pub fn matches(&self, domain: &str) -> bool {
        match self {
            Rule::HostWildcard(p) => domain.contains(p.as_str()),
            Rule::UrlWildcard {
                pattern,
                prefix_only: true,
            } => domain.starts_with(pattern.as_str()),
            Rule::UrlWildcard {
                pattern,
                prefix_only: false,
            } => domain.contains(pattern.as_str()),
            Rule::Regex(r) => r.is_match(domain),
            Rule::Whitelist(inner) => inner.matches(domain),
        }
    }

    pub fn is_whitelist(&self) -> bool {
        matches!(self, Rule::Whitelist(_))
    }
}

/// 去掉末尾的 :port
pub fn strip_port(domain: &str) -> &str {
    match domain.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => domain,
    }
}

/// 近似的 可注册域名:
///
/// 至少三段时取最后两段; 若倒数第二段短于 4 (如 com.cn 中的 com), 再多取一段.
/// 其它情况为域名本身
pub fn root_domain(domain: &str) -> &str {
    let domain = strip_port(domain);
    let labels: Vec<&str> = domain.split('.').collect();
    let n = labels.len();
    if n < 3 {
        return domain;
    }
    let keep = if labels[n - 2].len() < 4 { 3 } else { 2 };
    let start: usize = labels[..n - keep].iter().map(|l| l.len() + 1).sum();
    &domain[start..]
}

/// 上游的 gfwlist.txt 是 base64 编码的; 能解码为 utf8 就用解码后的内容, 否则视为明文规则
pub fn decode_source(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return String::new();
    }
    match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(s) => {
                debug!("gfwlist source is base64, decoded {} bytes", s.len());
                s
            }
            Err(_) => text.to_string(),
        },
        Err(_) => text.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct GfwList {
    fast_map: HashMap<String, Rule>,
    slow_list: Vec<Rule>,
}

impl GfwList {
    /// 逐行解析. 无法识别的行直接跳过, 不会报错
    pub fn parse(rules: &str) -> Self {
        let mut gfw = GfwList::default();

        for line in rules.lines() {
            let mut s = line.trim();
            if s.is_empty() || s.starts_with('!') || s.starts_with('[') {
                continue;
            }

            let mut is_whitelist = false;
            if let Some(rest) = s.strip_prefix("@@") {
                s = rest;
                is_whitelist = true;
            }

            let (key, rule) = if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') {
                let p = &s[1..s.len() - 1];
                match Regex::new(p) {
                    Ok(r) => (None, Rule::Regex(r)),
                    Err(e) => {
                        warn!("skip invalid gfwlist regex {}: {}", p, e);
                        continue;
                    }
                }
            } else if let Some(rest) = s.strip_prefix("||") {
                (Some(rest), Rule::HostWildcard(rest.to_string()))
            } else if let Some(rest) = s.strip_prefix('|') {
                (
                    None,
                    Rule::UrlWildcard {
                        pattern: rest.to_string(),
                        prefix_only: true,
                    },
                )
            } else if s.contains('/') {
                (
                    None,
                    Rule::UrlWildcard {
                        pattern: s.to_string(),
                        prefix_only: false,
                    },
                )
            } else {
                let host = s.strip_prefix('.').unwrap_or(s);
                (Some(host), Rule::HostWildcard(host.to_string()))
            };

            if key.map_or(false, str::is_empty) || is_empty_pattern(&rule) {
                trace!("skip malformed gfwlist line {:?}", line);
                continue;
            }

            let rule = if is_whitelist {
                Rule::Whitelist(Box::new(rule))
            } else {
                rule
            };

            match key {
                Some(k) => {
                    gfw.fast_map.insert(k.to_string(), rule);
                }
                None => gfw.slow_list.push(rule),
            }
        }
        debug!(
            fast = gfw.fast_map.len(),
            slow = gfw.slow_list.len(),
            "parsed gfwlist"
        );
        gfw
    }

    /// 调用 decode_source 后 parse
    pub fn parse_source(text: &str) -> Self {
        GfwList::parse(&decode_source(text))
    }

    /// 只查 fast_map. 返回 None 表示 fast_map 中没有这个域名 及其 root domain
    pub fn fast_match(&self, domain: &str) -> Option<bool> {
        let domain = strip_port(domain);

        let rule = self.fast_map.get(domain).or_else(|| {
            let root = root_domain(domain);
            if root != domain {
                self.fast_map.get(root)
            } else {
                None
            }
        })?;

        let matched = rule.matches(domain);
        if rule.is_whitelist() {
            Some(!matched)
        } else {
            Some(matched)
        }
    }

    pub fn fast_len(&self) -> usize {
        self.fast_map.len()
    }

    pub fn slow_len(&self) -> usize {
        self.slow_list.len()
    }
}

impl DomainJudge for GfwList {
    fn is_blocked(&self, domain: &str) -> bool {
        if let Some(r) = self.fast_match(domain) {
            return r;
        }

        // slow_list 按原样匹配, 不去掉端口
        for rule in self.slow_list.iter() {
            if rule.matches(domain) {
                return !rule.is_whitelist();
            }
        }
        false
    }
}

fn is_empty_pattern(rule: &Rule) -> bool {
    match rule {
        Rule::HostWildcard(p) => p.is_empty(),
        Rule::UrlWildcard { pattern, .. } => pattern.is_empty(),
        Rule::Regex(r) => r.as_str().is_empty(),
        Rule::Whitelist(inner) => is_empty_pattern(inner),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RULES: &str = r#"
[AutoProxy 0.2.9]
! Checksum: xxx
! comment line
||google.com
@@||maps.google.com
.heroku.com
||telegram.me
|http://85.17.73.31/
example.org/path
/^ad[0-9]+\.tracker\.net$/
@@|http://www.qq.com
/[unclosed/
@@
||
"#;

    #[test]
    fn buckets() {
        let l = GfwList::parse(RULES);
        assert_eq!(l.fast_len(), 4);
        assert_eq!(l.slow_len(), 4);
        assert!(l.fast_map.get("maps.google.com").unwrap().is_whitelist());
        assert!(l.fast_map.contains_key("heroku.com"));
    }

    #[test]
    fn fast_path() {
        let l = GfwList::parse(RULES);
        assert_eq!(l.fast_match("google.com"), Some(true));
        assert_eq!(l.fast_match("maps.google.com"), Some(false));
        assert_eq!(l.fast_match("www.google.com"), Some(true));
        assert_eq!(l.fast_match("www.google.com:443"), Some(true));
        assert_eq!(l.fast_match("www.qq.com"), None);

        assert!(l.is_blocked("google.com"));
        assert!(!l.is_blocked("maps.google.com"));
        assert!(l.is_blocked("api.telegram.me"));
        assert!(l.is_blocked("id.heroku.com"));
        assert!(!l.is_blocked("www.qq.com"));
    }

    #[test]
    fn slow_path() {
        let l = GfwList::parse(RULES);
        assert!(l.is_blocked("ad12.tracker.net"));
        assert!(!l.is_blocked("adx.tracker.net"));
        assert!(l.is_blocked("http://85.17.73.31/index"));
        assert!(l.is_blocked("www.example.org/path/a"));
        assert!(!l.is_blocked("http://www.qq.com/"));
    }

    #[test]
    fn fast_whitelist_wins_over_slow() {
        // slow_list 中的规则能匹配, 但 fast_map 中的白名单先生效
        let l = GfwList::parse("@@||safe.com\n/safe/\n");
        assert!(!l.is_blocked("safe.com"));

        // 反过来, 只在 slow_list 中的白名单 挡不住 fast_map 的结果
        let l = GfwList::parse("||blocked.com\n@@/blocked/\n");
        assert!(l.is_blocked("blocked.com"));
    }

    #[test]
    fn slow_path_keeps_port() {
        let l = GfwList::parse("|a.com:8080");
        assert!(l.is_blocked("a.com:8080"));

        // 白名单在前, 先匹配到
        let l = GfwList::parse("@@|a.com:8080\nb.com/x\n|a.com");
        assert!(!l.is_blocked("a.com:8080"));
        assert!(l.is_blocked("a.com"));

        // fast_map 仍然去掉端口
        let l = GfwList::parse("||a.com\n|a.com:8080");
        assert_eq!(l.fast_match("a.com:8080"), Some(true));
    }

    #[test]
    fn last_write_wins() {
        let l = GfwList::parse("||a.com\n@@||a.com\n");
        assert_eq!(l.fast_len(), 1);
        assert!(!l.is_blocked("a.com"));
    }

    #[test]
    fn roots() {
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(root_domain("www.google.com"), "google.com");
        assert_eq!(root_domain("id.heroku.com"), "heroku.com");
        assert_eq!(root_domain("www.sina.com.cn"), "sina.com.cn");
        assert_eq!(root_domain("a.b.c.bbc.co.uk"), "bbc.co.uk");
        assert_eq!(root_domain("google.com:443"), "google.com");
        assert_eq!(root_domain("com"), "com");
        assert_eq!(root_domain(""), "");

        for d in [
            "www.google.com",
            "x.y.sina.com.cn",
            "a.bc.de",
            "a.b.c.d.e",
            "abcd.efgh.ijkl.mn",
            "..",
        ] {
            let r = root_domain(d);
            assert_eq!(root_domain(r), r, "{d}");
        }
    }

    #[test]
    fn ports() {
        assert_eq!(strip_port("a.com:80"), "a.com");
        assert_eq!(strip_port("a.com"), "a.com");
        assert_eq!(strip_port("a.com:"), "a.com:");
        assert_eq!(strip_port("http://a.com"), "http://a.com");
    }

    #[test]
    fn base64_source() {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode("||google.com\n@@||maps.google.com\n");
        // 上游文件是折行的
        let wrapped: String = encoded
            .as_bytes()
            .chunks(16)
            .map(|c| std::str::from_utf8(c).unwrap().to_string() + "\n")
            .collect();

        let l = GfwList::parse_source(&wrapped);
        assert!(l.is_blocked("google.com"));
        assert!(!l.is_blocked("maps.google.com"));

        let plain = GfwList::parse_source("||google.com");
        assert!(plain.is_blocked("www.google.com"));
        assert_eq!(decode_source("  \n"), "");
    }
}
