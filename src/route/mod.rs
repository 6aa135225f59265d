/*!
 * route 模块定义了 如何由一条连接的 RoutingContext 判断它是否满足一条路由规则.
 *
 * 每个匹配器都实现 [`Condition`], 再由 [`AllCondition`] (与) 和 [`AnyCondition`] (或)
 * 组合成一棵树. 树在规则编译时建好, 之后只读, 可在多个线程中同时 apply.
 */
pub mod context;

pub use context::*;

use std::fmt::Debug;

use crate::Name;

/// Send + Sync to share one compiled rule among connections.
///
/// apply 不能失败, 所需的字段不存在时返回 false
pub trait Condition: Name + Debug + Send + Sync {
    fn apply(&self, ctx: &RoutingContext) -> bool;
}

pub type ConditionBox = Box<dyn Condition>;

/// 与. 按加入顺序判断, 遇到第一个 false 即返回. 空时为 true
#[derive(Debug, Default)]
pub struct AllCondition(Vec<ConditionBox>);

impl AllCondition {
    pub fn new() -> Self {
        AllCondition(Vec::with_capacity(8))
    }

    pub fn add(&mut self, cond: ConditionBox) -> &mut Self {
        self.0.push(cond);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ConditionBox>> for AllCondition {
    fn from(v: Vec<ConditionBox>) -> Self {
        AllCondition(v)
    }
}

impl Name for AllCondition {
    fn name(&self) -> &str {
        "all"
    }
}

impl Condition for AllCondition {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        self.0.iter().all(|c| c.apply(ctx))
    }
}

/// 或. 按加入顺序判断, 遇到第一个 true 即返回. 空时为 false
#[derive(Debug, Default)]
pub struct AnyCondition(Vec<ConditionBox>);

impl AnyCondition {
    pub fn new() -> Self {
        AnyCondition(Vec::with_capacity(8))
    }

    pub fn add(&mut self, cond: ConditionBox) -> &mut Self {
        self.0.push(cond);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ConditionBox>> for AnyCondition {
    fn from(v: Vec<ConditionBox>) -> Self {
        AnyCondition(v)
    }
}

impl Name for AnyCondition {
    fn name(&self) -> &str {
        "any"
    }
}

impl Condition for AnyCondition {
    fn apply(&self, ctx: &RoutingContext) -> bool {
        self.0.iter().any(|c| c.apply(ctx))
    }
}
