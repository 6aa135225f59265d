/*!
 * 各种 Condition 的实现, 及按规则选出 out_tag 的 RuleRouter.
 *
 * RuleRouter 依次检查每条规则, 第一条满足的规则决定 out_tag; 都不满足时返回 None,
 * 由调用者使用默认出口.
 */
pub mod attr;
pub mod config;
pub mod country;
pub mod domain;
pub mod gfw;
pub mod ip;

use anyhow::Context;
use rucond::route::{ConditionBox, RoutingContext};
use rucond::RouteError;
use tracing::debug;

pub use attr::*;
pub use config::{compile_rule, CompileEnv, RuleConfig, RouterConfig};
pub use domain::*;
pub use gfw::{GfwList, GfwMatcher};
pub use ip::*;

/// rule -> out_tag, 按加入顺序
#[derive(Debug, Default)]
pub struct RuleRouter {
    rules: Vec<(String, ConditionBox)>,
}

impl RuleRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, out_tag: impl Into<String>, cond: ConditionBox) {
        self.rules.push((out_tag.into(), cond));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 第一条满足的规则的 out_tag
    pub fn pick(&self, ctx: &RoutingContext) -> Option<&str> {
        for (tag, cond) in self.rules.iter() {
            if cond.apply(ctx) {
                debug!(out_tag = %tag, "rule matched");
                return Some(tag.as_str());
            }
        }
        None
    }

    /// 任意一条规则编译失败 整个 router 都失败
    pub fn from_config(cfg: &RouterConfig, env: &CompileEnv) -> Result<Self, RouteError> {
        let mut r = RuleRouter::new();
        for rule in cfg.rules.iter() {
            r.push(rule.out_tag.clone(), compile_rule(rule, env)?);
        }
        debug!(rules = r.len(), "router built");
        Ok(r)
    }

    /// 读取配置文件, 及其引用的 gfwlist 和 country ip 文件
    pub fn load(file_name: &str) -> anyhow::Result<Self> {
        let cfg = RouterConfig::from_file(file_name)?;
        let env = cfg.load_env()?;
        Self::from_config(&cfg, &env).with_context(|| format!("compile rules in {file_name}"))
    }
}

#[cfg(test)]
mod test {
    use rucond::net::{Address, Destination};

    use super::*;

    #[test]
    fn first_match_wins() {
        let cfg = RouterConfig::from_toml(
            r#"
[[rules]]
out_tag = "block"
domain = ["domain:ads.com"]

[[rules]]
out_tag = "proxy"
domain = ["keyword:ads", "domain:google.com"]
"#,
        )
        .unwrap();
        let r = RuleRouter::from_config(&cfg, &CompileEnv::default()).unwrap();
        assert_eq!(r.len(), 2);

        let ctx = |d: &str| {
            RoutingContext::default().with_target(Destination::tcp(Address::Domain(d.into()), 80))
        };
        assert_eq!(r.pick(&ctx("x.ads.com")), Some("block"));
        assert_eq!(r.pick(&ctx("myads.net")), Some("proxy"));
        assert_eq!(r.pick(&ctx("www.google.com")), Some("proxy"));
        assert_eq!(r.pick(&ctx("bing.com")), None);
        assert_eq!(r.pick(&RoutingContext::default()), None);
    }

    #[test]
    fn bad_rule_fails_router() {
        let cfg = RouterConfig::from_toml(
            r#"
[[rules]]
out_tag = "ok"
port = "80"

[[rules]]
out_tag = "bad"
"#,
        )
        .unwrap();
        assert!(RuleRouter::from_config(&cfg, &CompileEnv::default()).is_err());
        assert!(RuleRouter::load("no_such_router_config.toml").is_err());
    }
}
