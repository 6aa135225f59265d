/*!
rucondimp 实现了 rucond 中 Condition 的各种匹配器, 以及 gfwlist 规则引擎

route 子模块中有 域名, ip, 端口, 网络, 用户, inbound tag 的匹配器,
gfwlist 的解析与缓存, 国别ip段的解析, 以及由 toml 配置 编译出 Condition 树的方法
*/
pub mod route;
pub mod utils;

pub const VERSION: &str = "0.0.5";

/// 查找配置文件和资源文件时依次尝试的目录
pub const COMMON_DIRS: [&str; 4] = ["", "rucond_config/", "resource/", "../resource/"];
