/*
mod user defines the authenticated user that a RoutingContext may carry.
 */

use std::fmt::Debug;

use dyn_clone::DynClone;

/// 已经通过鉴权的用户.
pub trait UserTrait: Debug + Send + Sync {
    /// 每个user唯一, 路由按 email 判断用户
    fn email(&self) -> &str;
}

/// 如果User的supertrait 是 Clone, 则 Box<dyn User> 会报错, says
/// can't make into object; 但是用 DynClone 就可以
pub trait User: UserTrait + DynClone {}
impl<T: UserTrait + DynClone> User for T {}
dyn_clone::clone_trait_object!(User);

/// 只有 email 的用户
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct MemoryUser {
    pub email: String,
}

impl MemoryUser {
    pub fn new(email: impl Into<String>) -> Self {
        MemoryUser {
            email: email.into(),
        }
    }
}

impl UserTrait for MemoryUser {
    fn email(&self) -> &str {
        &self.email
    }
}
