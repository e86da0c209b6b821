mod mesh;
mod metric;
mod route_table;

use crate::net::{EtherAddress, Frame, NetApi, NetWorld, NodeId};
use crate::sim::{SimTime, Simulator};

/// 只记录发送动作的网络桩
#[derive(Debug, Default)]
pub(crate) struct RecordingNet {
    pub sent: Vec<Frame>,
    pub broadcast: Vec<Frame>,
    pub invalid: usize,
    next_id: u64,
}

impl NetApi for RecordingNet {
    fn make_frame(
        &mut self,
        dst: EtherAddress,
        src: EtherAddress,
        ethertype: u16,
        payload_len: usize,
    ) -> Frame {
        self.next_id += 1;
        Frame {
            id: self.next_id,
            dst,
            src,
            ethertype,
            payload: vec![0u8; payload_len],
        }
    }

    fn send(&mut self, _from: NodeId, frame: Frame, _sim: &mut Simulator) {
        self.sent.push(frame);
    }

    fn broadcast(&mut self, _from: NodeId, frame: Frame, _sim: &mut Simulator) {
        self.broadcast.push(frame);
    }

    fn drop_invalid(&mut self, _at: NodeId, _frame: &Frame) {
        self.invalid += 1;
    }
}

pub(crate) fn eth(idx: usize) -> EtherAddress {
    EtherAddress::for_index(idx)
}

/// 把时钟推进到 `to`；途中触发的定时器找不到节点，不产生效果
pub(crate) fn advance(sim: &mut Simulator, to: SimTime) {
    sim.run_until(to, &mut NetWorld::default());
}
