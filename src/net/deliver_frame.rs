//! 帧交付事件
//!
//! 定义网络模拟中的帧到达事件。

use super::frame::Frame;
use super::id::NodeId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};
use tracing::{debug, trace};

/// 事件：把一个帧交给某个节点处理。
#[derive(Debug)]
pub struct DeliverFrame {
    pub to: NodeId,
    pub frame: Frame,
}

impl Event for DeliverFrame {
    #[tracing::instrument(skip(self, sim, world), fields(frame_id = self.frame.id, to = ?self.to))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverFrame { to, frame } = *self;

        debug!(
            src = %frame.src,
            dst = %frame.dst,
            ethertype = frame.ethertype,
            len = frame.len(),
            now = ?sim.now(),
            "📨 帧到达节点"
        );

        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.deliver(to, frame, sim);

        trace!("DeliverFrame::execute 完成");
    }
}
