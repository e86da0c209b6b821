//! ETX 邻居发现与投递率统计
//!
//! 每个周期（±10% 抖动）广播一个发现帧，帧中携带“我在 tau 内听到了你多少”。
//! - 反向投递率：tau 内收到某邻居的发现帧数 ÷ 期望数（tau / 对方周期）
//! - 正向投递率：对方在最近一次发现帧里报告的、关于我们的反向投递率

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info, trace};

use crate::config::{ConfigError, LinkStatConfig};
use crate::metric::DeliveryRatioSource;
use crate::net::{EtherAddress, Frame, NetApi, NodeId};
use crate::node::LinkStatTick;
use crate::sim::{RandomSource, SimTime, Simulator, TimerHandle, disarm, rearm};
use crate::wire::{DiscoveryProbe, EtherHeader, RateEntry};

/// 从某个邻居听到的发现帧
#[derive(Debug, Clone, Default)]
struct PeerProbes {
    /// 到达时间，最新的在后
    arrivals: VecDeque<SimTime>,
    /// 对方宣告的发送周期
    period_ms: u32,
    /// 对方报告的、它收到我们的比例，以及报告时间
    reported_rate: Option<(u32, SimTime)>,
}

#[derive(Debug)]
pub struct LinkStat {
    node: NodeId,
    eth: EtherAddress,
    cfg: LinkStatConfig,
    seq_no: u32,
    peers: BTreeMap<EtherAddress, PeerProbes>,
    rng: Box<dyn RandomSource>,
    timer: Option<TimerHandle>,
}

impl LinkStat {
    pub fn new(
        node: NodeId,
        eth: EtherAddress,
        cfg: LinkStatConfig,
        rng: Box<dyn RandomSource>,
    ) -> Result<LinkStat, ConfigError> {
        cfg.validate()?;
        Ok(LinkStat {
            node,
            eth,
            cfg,
            seq_no: 0,
            peers: BTreeMap::new(),
            rng,
            timer: None,
        })
    }

    pub fn config(&self) -> &LinkStatConfig {
        &self.cfg
    }

    /// 第一次广播在一个周期内的随机时刻
    pub fn start(&mut self, sim: &mut Simulator) {
        let offset = SimTime::from_millis(self.rng.next_below(self.cfg.period_ms));
        info!(node = ?self.node, offset = ?offset, "LinkStat 启动");
        rearm(&mut self.timer, sim, offset, LinkStatTick { node: self.node });
    }

    pub fn stop(&mut self, sim: &mut Simulator) {
        disarm(&mut self.timer, sim);
    }

    pub fn is_armed(&self, sim: &Simulator) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_armed(sim))
    }

    /// 周期定时器：广播发现帧并重新装填
    #[tracing::instrument(skip(self, sim, net), fields(node = ?self.node))]
    pub fn on_timer(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        let now = sim.now();
        self.send_probe(now, sim, net);

        let max_jitter = self.cfg.period_ms / 10;
        let next = if max_jitter == 0 {
            self.cfg.period_ms
        } else {
            self.cfg.period_ms + self.rng.next_below(max_jitter * 2) - max_jitter
        };
        rearm(
            &mut self.timer,
            sim,
            SimTime::from_millis(next),
            LinkStatTick { node: self.node },
        );
    }

    fn send_probe(&mut self, now: SimTime, sim: &mut Simulator, net: &mut dyn NetApi) {
        let payload_len = (self.cfg.probe_size as usize).saturating_sub(EtherHeader::LEN);
        let room = payload_len.saturating_sub(DiscoveryProbe::HEADER) / RateEntry::SIZE;
        let entries: Vec<RateEntry> = self
            .peers
            .keys()
            .filter_map(|peer| {
                let rate = self.reverse_rate(*peer, now)?;
                Some(RateEntry {
                    peer: *peer,
                    rate_pct: rate as u16,
                })
            })
            .take(room)
            .collect();

        self.seq_no = self.seq_no.wrapping_add(1);
        let probe = DiscoveryProbe {
            seq_no: self.seq_no,
            period_ms: self.cfg.period_ms as u32,
            entries,
        };
        let mut frame = net.make_frame(
            EtherAddress::BROADCAST,
            self.eth,
            crate::wire::ETHERTYPE_DISCOVERY,
            payload_len,
        );
        probe.write(&mut frame.payload);
        debug!(seq_no = self.seq_no, entries = probe.entries.len(), "📡 广播发现帧");
        net.broadcast(self.node, frame, sim);
    }

    /// 收到发现帧
    pub fn on_frame(&mut self, frame: &Frame, now: SimTime) {
        let probe = match DiscoveryProbe::decode(&frame.payload) {
            Ok(p) => p,
            Err(e) => {
                debug!(src = %frame.src, error = %e, "发现帧解析失败");
                return;
            }
        };
        let tau = self.cfg.tau();
        let me = self.eth;
        let peer = self.peers.entry(frame.src).or_default();
        peer.arrivals.push_back(now);
        peer.period_ms = probe.period_ms;
        let cutoff = now.saturating_sub(tau);
        while peer.arrivals.front().is_some_and(|t| *t < cutoff) {
            peer.arrivals.pop_front();
        }
        if let Some(e) = probe.entries.iter().find(|e| e.peer == me) {
            peer.reported_rate = Some((e.rate_pct as u32, now));
        }
        trace!(src = %frame.src, seq_no = probe.seq_no, heard = peer.arrivals.len(), "收到发现帧");
    }

    /// tau 内听到过的邻居
    pub fn neighbors(&self, now: SimTime) -> Vec<EtherAddress> {
        let cutoff = now.saturating_sub(self.cfg.tau());
        self.peers
            .iter()
            .filter(|(_, p)| p.arrivals.back().is_some_and(|t| *t >= cutoff))
            .map(|(peer, _)| *peer)
            .collect()
    }
}

impl DeliveryRatioSource for LinkStat {
    fn forward_rate(&self, peer: EtherAddress, now: SimTime) -> Option<u32> {
        let (rate, at) = self.peers.get(&peer)?.reported_rate?;
        if now.saturating_sub(at) > self.cfg.tau() {
            return None;
        }
        Some(rate)
    }

    fn reverse_rate(&self, peer: EtherAddress, now: SimTime) -> Option<u32> {
        let p = self.peers.get(&peer)?;
        if p.period_ms == 0 {
            return None;
        }
        let cutoff = now.saturating_sub(self.cfg.tau());
        let heard = p.arrivals.iter().filter(|t| **t >= cutoff).count() as u64;
        let expected = (self.cfg.tau_ms / p.period_ms as u64).max(1);
        Some(((heard * 100) / expected).min(100) as u32)
    }
}
