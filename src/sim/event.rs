//! 事件
//!
//! 定时器到期、帧到达都是事件。事件只携带标识（节点、目的地等），
//! 执行时再从世界中取出对应的状态。

use super::simulator::Simulator;
use super::world::World;

/// 可调度的事件，执行时按值消费自身
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}

/// 已调度事件的编号，按调度顺序递增；用于取消和同刻排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);
