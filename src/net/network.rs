//! 网络拓扑管理
//!
//! 定义无线网络拓扑结构，包含节点、链路、帧的发送/广播和统计信息。

use std::collections::HashMap;

use super::deliver_frame::DeliverFrame;
use super::frame::Frame;
use super::id::{EtherAddress, LinkId, NodeId};
use super::link::Link;
use super::stats::Stats;
use crate::config::ConfigError;
use crate::node::MeshNode;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 网络拓扑
#[derive(Default)]
pub struct Network {
    nodes: Vec<Option<MeshNode>>,
    links: Vec<Link>,
    edges: HashMap<(NodeId, NodeId), LinkId>,
    adj: Vec<Vec<NodeId>>,
    by_eth: HashMap<EtherAddress, NodeId>,
    next_frame_id: u64,
    pub stats: Stats,
}

impl Network {
    /// 添加节点；`build` 拿到新节点的标识后构造节点
    pub fn add_node<F>(&mut self, build: F) -> Result<NodeId, ConfigError>
    where
        F: FnOnce(NodeId) -> Result<MeshNode, ConfigError>,
    {
        let id = NodeId(self.nodes.len());
        let node = build(id)?;
        self.by_eth.insert(node.eth(), id);
        self.nodes.push(Some(node));
        self.adj.push(Vec::new());
        Ok(id)
    }

    /// 连接两个节点（创建单向链路）
    pub fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
        loss_pct: u8,
    ) -> LinkId {
        let id = LinkId(self.links.len());
        let mut link = Link::new(from, to, latency, bandwidth_bps);
        link.loss_pct = loss_pct.min(100);
        self.links.push(link);
        self.edges.insert((from, to), id);
        self.adj[from.0].push(to);
        id
    }

    /// 连接两个节点（双向，两条对称单向链路）
    pub fn connect_pair(
        &mut self,
        a: NodeId,
        b: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
        loss_pct: u8,
    ) {
        self.connect(a, b, latency, bandwidth_bps, loss_pct);
        self.connect(b, a, latency, bandwidth_bps, loss_pct);
    }

    pub fn link_mut(&mut self, from: NodeId, to: NodeId) -> Option<&mut Link> {
        let id = *self.edges.get(&(from, to))?;
        self.links.get_mut(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// 获取节点（若节点正在处理回调则返回 None）
    pub fn node(&self, id: NodeId) -> Option<&MeshNode> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut MeshNode> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    pub fn node_by_eth(&self, eth: EtherAddress) -> Option<NodeId> {
        self.by_eth.get(&eth).copied()
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adj.get(id.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// 暂时取出节点调用 `f`，避免 &mut self 与 &mut node 的重叠借用。
    pub fn with_node<F, R>(&mut self, id: NodeId, f: F) -> Option<R>
    where
        F: FnOnce(&mut MeshNode, &mut Network) -> R,
    {
        let mut node = self.nodes.get_mut(id.0)?.take()?;
        let r = f(&mut node, self);
        self.nodes[id.0] = Some(node);
        Some(r)
    }

    /// 创建帧（载荷清零）
    pub fn make_frame(
        &mut self,
        dst: EtherAddress,
        src: EtherAddress,
        ethertype: u16,
        payload_len: usize,
    ) -> Frame {
        Frame {
            id: self.alloc_frame_id(),
            dst,
            src,
            ethertype,
            payload: vec![0u8; payload_len],
        }
    }

    fn alloc_frame_id(&mut self) -> u64 {
        let id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        id
    }

    /// 将帧交付给节点处理
    #[tracing::instrument(skip(self, frame, sim), fields(frame_id = frame.id, to = ?to, ethertype = frame.ethertype))]
    pub fn deliver(&mut self, to: NodeId, frame: Frame, sim: &mut Simulator) {
        debug!("📬 将帧交付给节点处理");
        self.stats.delivered_frames += 1;
        self.stats.delivered_bytes += frame.len() as u64;

        let handled = self.with_node(to, |node, net| node.on_frame(frame, sim, net));
        if handled.is_none() {
            debug!("目标节点不存在，丢弃");
        }
    }

    /// 单播发送
    #[tracing::instrument(skip(self, frame, sim), fields(frame_id = frame.id, from = ?from, dst = %frame.dst))]
    pub fn send(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator) {
        if frame.dst.is_broadcast() {
            self.broadcast(from, frame, sim);
            return;
        }
        self.stats.sent_frames += 1;
        let Some(link_id) = self
            .by_eth
            .get(&frame.dst)
            .and_then(|to| self.edges.get(&(from, *to)))
            .copied()
        else {
            debug!("目的地址不是邻居，丢弃");
            self.stats.dropped_no_link += 1;
            return;
        };
        self.transmit(link_id, frame, sim);
    }

    /// 广播：每条出链路一份拷贝（各自独立判定丢包）
    #[tracing::instrument(skip(self, frame, sim), fields(frame_id = frame.id, from = ?from))]
    pub fn broadcast(&mut self, from: NodeId, frame: Frame, sim: &mut Simulator) {
        let nbrs = self.adj.get(from.0).cloned().unwrap_or_default();
        trace!(neighbors = nbrs.len(), "广播");
        for to in nbrs {
            let Some(link_id) = self.edges.get(&(from, to)).copied() else {
                continue;
            };
            let mut copy = frame.clone();
            copy.id = self.alloc_frame_id();
            self.stats.sent_frames += 1;
            self.transmit(link_id, copy, sim);
        }
    }

    /// 在链路上串行化发送，调度到达事件
    fn transmit(&mut self, link_id: LinkId, frame: Frame, sim: &mut Simulator) {
        let link = &mut self.links[link_id.0];
        let now = sim.now();
        let start = now.max(link.busy_until);
        let tx_time = link.tx_time(frame.len() as u32);
        let depart = start.saturating_add(tx_time);
        link.busy_until = depart;
        let arrive = depart.saturating_add(link.latency);
        let to = link.to;

        trace!(
            now = ?now,
            start = ?start,
            tx_time = ?tx_time,
            depart = ?depart,
            arrive = ?arrive,
            "计算传输时间"
        );

        if link.drops(frame.id) {
            debug!(frame_id = frame.id, "📉 链路丢包");
            self.stats.dropped_loss += 1;
            return;
        }

        sim.schedule(arrive, DeliverFrame { to, frame });
    }

    /// 接收端拒收（过短/类型不对）
    pub(crate) fn drop_invalid(&mut self, at: NodeId, frame: &Frame) {
        debug!(at = ?at, frame_id = frame.id, len = frame.len(), "🗑️ 丢弃无效帧");
        self.stats.dropped_invalid += 1;
    }
}
