//! 邻居表：记录通过发现广播听到的邻居，以及本轮是否已经探测过。

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::net::EtherAddress;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub last_seen: SimTime,
    /// 本轮已发送过包对
    pub probe_sent: bool,
}

/// 按地址升序遍历的邻居表
#[derive(Debug, Clone, Default)]
pub struct NeighborTable {
    entries: BTreeMap<EtherAddress, NodeEntry>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收到发现广播：刷新 `last_seen`，新邻居的 `probe_sent` 为假
    pub fn on_discovery(&mut self, peer: EtherAddress, now: SimTime) {
        self.entries
            .entry(peer)
            .and_modify(|e| e.last_seen = now)
            .or_insert_with(|| {
                debug!(peer = %peer, "发现新邻居");
                NodeEntry {
                    last_seen: now,
                    probe_sent: false,
                }
            });
    }

    /// 删除 `last_seen <= cutoff` 的邻居，再返回第一个本轮尚未探测的邻居。
    ///
    /// 先收集再删除，遍历期间不修改表。
    pub fn sweep_and_select(&mut self, cutoff: SimTime) -> Option<EtherAddress> {
        let stale: Vec<EtherAddress> = self
            .entries
            .iter()
            .filter(|(_, e)| e.last_seen <= cutoff)
            .map(|(peer, _)| *peer)
            .collect();
        for peer in &stale {
            trace!(peer = %peer, "邻居过期");
            self.entries.remove(peer);
        }
        self.entries
            .iter()
            .find(|(_, e)| !e.probe_sent)
            .map(|(peer, _)| *peer)
    }

    /// 只删除过期邻居，返回剩余邻居（批量发送时使用）
    pub fn sweep(&mut self, cutoff: SimTime) -> Vec<EtherAddress> {
        self.entries.retain(|_, e| e.last_seen > cutoff);
        self.peers()
    }

    /// 新一轮开始：所有邻居重新可被探测
    pub fn clear_probe_flags(&mut self) {
        for e in self.entries.values_mut() {
            e.probe_sent = false;
        }
    }

    pub fn mark_probed(&mut self, peer: EtherAddress) {
        if let Some(e) = self.entries.get_mut(&peer) {
            e.probe_sent = true;
        }
    }

    pub fn get(&self, peer: EtherAddress) -> Option<&NodeEntry> {
        self.entries.get(&peer)
    }

    pub fn peers(&self) -> Vec<EtherAddress> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
