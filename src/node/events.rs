//! 节点定时器事件
//!
//! 每个事件只携带节点标识；触发时从世界中取出节点，交给对应组件处理。

use std::net::Ipv4Addr;

use tracing::trace;

use crate::net::{NodeId, with_node};
use crate::sim::{Event, Simulator, World};

/// LinkStat 周期广播
#[derive(Debug)]
pub struct LinkStatTick {
    pub node: NodeId,
}

impl Event for LinkStatTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, net| n.linkstat.on_timer(sim, net));
    }
}

/// ETT 探测轮次
#[derive(Debug)]
pub struct EttRoundTick {
    pub node: NodeId,
}

impl Event for EttRoundTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, net| n.ett.on_round_timer(sim, net));
    }
}

/// ETT 错开发送的下一对探测
#[derive(Debug)]
pub struct EttProbeTick {
    pub node: NodeId,
}

impl Event for EttProbeTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, net| n.ett.on_probe_timer(sim, net));
    }
}

/// 周期性全量路由通告
#[derive(Debug)]
pub struct RouteAdvertTick {
    pub node: NodeId,
}

impl Event for RouteAdvertTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, net| n.routes.on_advert_timer(sim, net));
    }
}

/// 触发式路由通告
#[derive(Debug)]
pub struct RouteTriggerTick {
    pub node: NodeId,
}

impl Event for RouteTriggerTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, net| n.routes.on_trigger_timer(sim, net));
    }
}

/// 某目的地的路由过期
#[derive(Debug)]
pub struct RouteExpire {
    pub node: NodeId,
    pub dest: Ipv4Addr,
}

impl Event for RouteExpire {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let RouteExpire { node, dest } = *self;
        trace!(node = ?node, dest = %dest, "RouteExpire 触发");
        with_node(world, node, |n, _| n.routes.expire_hook(dest, sim));
    }
}

/// 路由表快照写入日志
#[derive(Debug)]
pub struct RouteLogDump {
    pub node: NodeId,
}

impl Event for RouteLogDump {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        with_node(world, self.node, |n, _| n.routes.on_log_dump(sim));
    }
}
