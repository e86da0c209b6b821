//! 世界 trait
//!
//! 定义仿真世界接口。事件通过 `as_any_mut` 向下转型拿到具体的世界（例如 `NetWorld`）。

use super::simulator::Simulator;
use std::any::Any;

/// 仿真世界：由业务层实现（例如无线网络拓扑/统计等）。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// 每执行完一个事件后回调
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}
