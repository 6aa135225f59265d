/*!
 * rucond 定义了路由判断所需的基础部分:
 *
 * net 中的地址, 端口范围, 网络类型;
 * user 中的已鉴权用户;
 * route 中的 RoutingContext, Condition trait 以及 与/或 组合.
 *
 * 具体的匹配器 (域名, ip, gfwlist 等) 在 rucondimp 中实现
*/

pub mod error;
pub mod net;
pub mod route;
pub mod user;
pub mod utils;

pub use error::RouteError;

pub const VERSION: &str = "0.0.5";

/// many types in rucond have a name.
/// 约定：使用小写字母+下划线的形式
pub trait Name {
    fn name(&self) -> &str;
}

impl<T: Name + ?Sized> Name for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}
