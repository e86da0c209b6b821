//! 网络世界实现
//!
//! 定义网络仿真的世界（World）实现，持有网络拓扑，并提供按节点访问的辅助函数。

use super::id::NodeId;
use super::network::Network;
use crate::node::MeshNode;
use crate::sim::World;
use std::any::Any;

/// 一个默认的网络世界实现：持有 Network。
#[derive(Default)]
pub struct NetWorld {
    pub net: Network,
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 从仿真世界中取出某个节点并执行 `f`（定时器事件使用）。
pub(crate) fn with_node<F, R>(world: &mut dyn World, id: NodeId, f: F) -> Option<R>
where
    F: FnOnce(&mut MeshNode, &mut Network) -> R,
{
    let w = world
        .as_any_mut()
        .downcast_mut::<NetWorld>()
        .expect("world must be NetWorld");
    w.net.with_node(id, f)
}
