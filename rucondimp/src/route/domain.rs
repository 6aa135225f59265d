//! 域名匹配器. target 不存在或不是域名时一律为 false

use regex::Regex;
use rucond::{
    route::{Condition, RoutingContext},
    Name, RouteError,
};

/// 子串匹配, 区分大小写
#[derive(Debug, Clone)]
pub struct PlainDomainMatcher(String);

impl PlainDomainMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        PlainDomainMatcher(pattern.into())
    }
}

impl Name for PlainDomainMatcher {
    fn name(&self) -> &str {
        "plain_domain"
    }
}

impl Condition for PlainDomainMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match ctx.target_domain() {
            Some(domain) => domain.contains(self.0.as_str()),
            None => false,
        }
    }
}

/// 正则在建立时编译, 匹配前先将域名转为小写
#[derive(Debug, Clone)]
pub struct RegexpDomainMatcher {
    pattern: Regex,
}

impl RegexpDomainMatcher {
    pub fn new(pattern: &str) -> Result<Self, RouteError> {
        let pattern = Regex::new(pattern).map_err(|e| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(RegexpDomainMatcher { pattern })
    }
}

impl Name for RegexpDomainMatcher {
    fn name(&self) -> &str {
        "regexp_domain"
    }
}

impl Condition for RegexpDomainMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match ctx.target_domain() {
            Some(domain) => self.pattern.is_match(&domain.to_lowercase()),
            None => false,
        }
    }
}

/// 按 label 对齐的后缀匹配: example.com 匹配 foo.example.com 和 example.com,
/// 不匹配 fooexample.com
#[derive(Debug, Clone)]
pub struct SubDomainMatcher(String);

impl SubDomainMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        SubDomainMatcher(pattern.into())
    }

    pub fn matches(&self, domain: &str) -> bool {
        let pattern = self.0.as_str();
        if !domain.ends_with(pattern) {
            return false;
        }
        domain.len() == pattern.len()
            || domain.as_bytes()[domain.len() - pattern.len() - 1] == b'.'
    }
}

impl Name for SubDomainMatcher {
    fn name(&self) -> &str {
        "sub_domain"
    }
}

impl Condition for SubDomainMatcher {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        match ctx.target_domain() {
            Some(domain) => self.matches(domain),
            None => false,
        }
    }
}
