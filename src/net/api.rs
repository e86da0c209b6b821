//! Network-facing API used by the per-node protocol components.

use crate::sim::Simulator;

use super::{EtherAddress, Frame, NodeId};

/// Minimal frame I/O for per-node components: allocation plus unicast/broadcast send.
pub trait NetApi {
    /// Allocate a frame with a zero-filled payload of `payload_len` bytes.
    fn make_frame(
        &mut self,
        dst: EtherAddress,
        src: EtherAddress,
        ethertype: u16,
        payload_len: usize,
    ) -> Frame;

    /// Send a unicast frame from `from` toward `frame.dst`.
    fn send(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator);

    /// Send one copy of `frame` on every outgoing link of `from`.
    fn broadcast(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator);

    /// Account for a frame the receiver rejected (too short, unknown type).
    fn drop_invalid(&mut self, at: NodeId, frame: &Frame);
}

impl NetApi for super::Network {
    fn make_frame(
        &mut self,
        dst: EtherAddress,
        src: EtherAddress,
        ethertype: u16,
        payload_len: usize,
    ) -> Frame {
        super::Network::make_frame(self, dst, src, ethertype, payload_len)
    }

    fn send(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator) {
        super::Network::send(self, from, frame, sim)
    }

    fn broadcast(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator) {
        super::Network::broadcast(self, from, frame, sim)
    }

    fn drop_invalid(&mut self, at: NodeId, frame: &Frame) {
        super::Network::drop_invalid(self, at, frame)
    }
}
