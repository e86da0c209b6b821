//! DSDV 路由表
//!
//! - [`RtEntry`]：一行路由
//! - [`RouteTable`]：按序号选路、过期定时器、旧路由保留、路由通告
//! - [`RouteLogger`]：插入/度量更新/全表快照的日志接口

/// 路由表内部不变式检查，失败即 panic
macro_rules! rt_assert {
    ($cond:expr) => {
        if !$cond {
            panic!("route table invariant violated: {}", stringify!($cond));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!(
                "route table invariant violated: {}: {}",
                stringify!($cond),
                format_args!($($arg)+)
            );
        }
    };
}

mod entry;
mod logger;
mod table;

pub use entry::{Reason, RtEntry};
pub use logger::{JsonRouteLogger, RouteLogEvent, RouteLogRecord, RouteLogger, RouteRecord};
pub use table::{ExpireBinding, RouteTable};
